//! Rule sets per platform version.
//!
//! Every known version starts from the base rule table, a version that translates a property
//! differently overrides that single rule and keeps the others.

use super::configuration::ServiceConfiguration;
use super::rules::{self, RuleContext, RuleEvaluator, RuleOutput, TranslationRule};
use super::{DiscoveryError, ServiceKind, ServiceVersion};
use crate::collaborators::CredentialStore;
use enum_iterator::IntoEnumIterator;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, error, warn};

const BASE_LABEL: &str = "base";

/// The outcome of running a rule set over a configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Translation {
    /// Rule name and output, in evaluation order
    pub outputs: Vec<(&'static str, RuleOutput)>,
    /// Union of the keys consumed by every rule
    pub mapped: BTreeSet<String>,
}

/// An ordered table of translation rules
#[derive(Debug, Clone)]
pub struct RuleSet {
    service: ServiceKind,
    label: String,
    rules: Vec<TranslationRule>,
}

impl RuleSet {
    /// The Kafka Connect rules every version starts from
    pub fn base() -> Self {
        Self {
            service: ServiceKind::KafkaConnect,
            label: String::from(BASE_LABEL),
            rules: rules::BASE_RULES.to_vec(),
        }
    }

    fn for_version(version: ServiceVersion) -> Self {
        Self { label: version.to_string(), ..Self::base() }
    }

    /// `base` or the version the rule set was registered for
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn rules(&self) -> &[TranslationRule] {
        &self.rules
    }

    /// Replaces the evaluator of the rule called `name`, the rule keeps its position.
    pub fn override_rule(
        &mut self,
        name: &str,
        evaluate: RuleEvaluator,
    ) -> Result<(), DiscoveryError> {
        match self.rules.iter_mut().find(|rule| rule.name == name) {
            Some(rule) => {
                rule.evaluate = evaluate;
                Ok(())
            },
            None => Err(DiscoveryError::UnknownRule(name.to_string())),
        }
    }

    /// Runs every rule once, in order. The first failing rule aborts the translation.
    pub fn translate(
        &self,
        config: &ServiceConfiguration,
        hosts: &[String],
        credentials: &dyn CredentialStore,
    ) -> Result<Translation, DiscoveryError> {
        let ctx = RuleContext { config, hosts, credentials };
        let mut outputs = Vec::with_capacity(self.rules.len());
        let mut mapped = BTreeSet::new();
        for rule in &self.rules {
            debug!("Calling {} property builder.. {}", self.service, rule.name);
            let output = (rule.evaluate)(&ctx).map_err(|err| {
                error!(
                    "{} property builder {} failed with rule set {}: {}",
                    self.service, rule.name, self.label, err
                );
                DiscoveryError::Rule {
                    service: self.service,
                    version: self.label.clone(),
                    rule: rule.name,
                    source: Box::new(err),
                }
            })?;
            mapped.extend(output.consumed.iter().cloned());
            outputs.push((rule.name, output));
        }
        Ok(Translation { outputs, mapped })
    }
}

/// Version -> rule set, falling back to the base rules for unknown versions
#[derive(Debug)]
pub struct RuleSetRegistry {
    base: RuleSet,
    variants: BTreeMap<ServiceVersion, RuleSet>,
}

impl Default for RuleSetRegistry {
    fn default() -> Self {
        let variants = ServiceVersion::into_enum_iter()
            .map(|version| (version, RuleSet::for_version(version)))
            .collect();
        Self { base: RuleSet::base(), variants }
    }
}

impl RuleSetRegistry {
    pub fn base(&self) -> &RuleSet {
        &self.base
    }

    pub fn get(&self, version: ServiceVersion) -> &RuleSet {
        self.variants.get(&version).unwrap_or(&self.base)
    }

    /// Selects the rule set of a version tag such as `7.2` or `7.2.1`. A missing, unparsable or
    /// unregistered tag selects the base rules.
    pub fn select(&self, version_tag: Option<&str>) -> &RuleSet {
        match version_tag.map(str::trim).filter(|tag| !tag.is_empty()) {
            Some(tag) => match tag.parse::<ServiceVersion>() {
                Ok(version) => self.get(version),
                Err(err) => {
                    warn!("Using {} rules: {}", BASE_LABEL, err);
                    &self.base
                },
            },
            None => &self.base,
        }
    }

    /// Overrides a single rule of `version`
    pub fn override_rule(
        &mut self,
        version: ServiceVersion,
        name: &str,
        evaluate: RuleEvaluator,
    ) -> Result<(), DiscoveryError> {
        self.variants
            .entry(version)
            .or_insert_with(|| RuleSet::for_version(version))
            .override_rule(name, evaluate)
    }
}
