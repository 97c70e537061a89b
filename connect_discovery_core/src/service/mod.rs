//! Service property builders.
//!
//! A builder reads the configuration a service runs with on one of its hosts and translates it
//! into inventory properties. The translation is driven by a table of rules per service version,
//! see [`registry`].

pub mod configuration;
pub mod kafka_connect;
pub mod registry;
pub mod rules;

use crate::collaborators::CollaboratorError;
use crate::config::ConfigError;
use enum_iterator::IntoEnumIterator;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The services this crate knows how to translate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, IntoEnumIterator)]
pub enum ServiceKind {
    KafkaConnect,
}

impl ServiceKind {
    /// Human readable name, used in diagnostics
    pub fn name(&self) -> &'static str {
        match self {
            Self::KafkaConnect => "kafka_connect",
        }
    }

    /// The inventory group hosting the service-specific variables
    pub fn group(&self) -> &'static str {
        match self {
            Self::KafkaConnect => "kafka_connect",
        }
    }

    /// The variable under which unmapped properties are passed through
    pub fn custom_properties_group(&self) -> &'static str {
        match self {
            Self::KafkaConnect => "kafka_connect_custom_properties",
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Platform versions with a registered rule set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, IntoEnumIterator)]
pub enum ServiceVersion {
    V60,
    V61,
    V62,
    V70,
    V71,
    V72,
}

impl ServiceVersion {
    pub fn major_minor(&self) -> (u32, u32) {
        match self {
            Self::V60 => (6, 0),
            Self::V61 => (6, 1),
            Self::V62 => (6, 2),
            Self::V70 => (7, 0),
            Self::V71 => (7, 1),
            Self::V72 => (7, 2),
        }
    }
}

impl fmt::Display for ServiceVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (major, minor) = self.major_minor();
        write!(f, "{}.{}", major, minor)
    }
}

impl FromStr for ServiceVersion {
    type Err = DiscoveryError;

    /// Accepts `major.minor` optionally followed by further components, i.e. `7.2.1`
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let mut parts = input.trim().split('.');
        let mut next_number = || -> Result<u32, DiscoveryError> {
            parts
                .next()
                .and_then(|part| part.parse::<u32>().ok())
                .ok_or_else(|| DiscoveryError::UnknownVersion(input.to_string()))
        };
        let major_minor = (next_number()?, next_number()?);
        Self::into_enum_iter()
            .find(|version| version.major_minor() == major_minor)
            .ok_or_else(|| DiscoveryError::UnknownVersion(input.to_string()))
    }
}

/// Errors aborting the translation of a service
#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("Malformed value for {key}: '{value}' ({reason})")]
    MalformedValue { key: String, value: String, reason: String },
    #[error("Collaborator error: {0}")]
    Collaborator(#[from] CollaboratorError),
    #[error("Missing configuration: {0}")]
    MissingConfiguration(String),
    #[error("Unknown version: {0}")]
    UnknownVersion(String),
    #[error("Unknown rule: {0}")]
    UnknownRule(String),
    #[error("Rule {rule} failed for {service} (rule set {version}): {source}")]
    Rule {
        service: ServiceKind,
        version: String,
        rule: &'static str,
        #[source]
        source: Box<DiscoveryError>,
    },
    #[error("{operation} failed for {service} (rule set {version}): {source}")]
    Step {
        service: ServiceKind,
        version: String,
        operation: &'static str,
        #[source]
        source: Box<DiscoveryError>,
    },
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl DiscoveryError {
    pub fn malformed(key: &str, value: &str, reason: impl fmt::Display) -> Self {
        Self::MalformedValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }

    /// The innermost error, skipping the rule and step wrappers
    pub fn root(&self) -> &Self {
        match self {
            Self::Rule { source, .. } | Self::Step { source, .. } => source.root(),
            other => other,
        }
    }
}

/// This implementation is only for testing, collaborator errors are compared by variant only
impl PartialEq for DiscoveryError {
    fn eq(&self, rhs: &Self) -> bool {
        match self {
            Self::MalformedValue { key, value, reason } => matches!(
                rhs,
                Self::MalformedValue { key: rkey, value: rvalue, reason: rreason }
                    if key == rkey && value == rvalue && reason == rreason
            ),
            Self::Collaborator(_) => matches!(rhs, Self::Collaborator(_)),
            Self::MissingConfiguration(lhs) => {
                matches!(rhs, Self::MissingConfiguration(rhs) if lhs == rhs)
            },
            Self::UnknownVersion(lhs) => matches!(rhs, Self::UnknownVersion(rhs) if lhs == rhs),
            Self::UnknownRule(lhs) => matches!(rhs, Self::UnknownRule(rhs) if lhs == rhs),
            Self::Rule { service, version, rule, source } => matches!(
                rhs,
                Self::Rule { service: rservice, version: rversion, rule: rrule, source: rsource }
                    if service == rservice && version == rversion && rule == rrule
                        && source == rsource
            ),
            Self::Step { service, version, operation, source } => matches!(
                rhs,
                Self::Step {
                    service: rservice,
                    version: rversion,
                    operation: roperation,
                    source: rsource,
                } if service == rservice && version == rversion && operation == roperation
                    && source == rsource
            ),
            Self::Config(lhs) => matches!(rhs, Self::Config(rhs) if lhs == rhs),
        }
    }
}
