//! Discovery run settings
//!
//! The settings are read from a java `.properties` file, each known key is backed by a
//! `ConfigDef` holding its documentation, default and validator. `build()` resolves them into a
//! `DiscoveryConfig`.

pub mod config_def;

use self::config_def::{ConfigDef, ConfigDefImportance, ConfigDefValidator};
use crate::service::rules;
use crate::utils::core_utils;
use const_format::concatcp;
use enum_iterator::IntoEnumIterator;
use fs_err::File;
use std::collections::HashMap;
use std::fmt;
use std::io::{self, BufReader};
use std::num;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, trace};

// Config Keys
pub const SERVICE_VERSION_PROP: &str = "discovery.service.version";
pub const HOSTS_PROP: &str = "discovery.hosts";
pub const CONFIG_DIR_PROP: &str = "discovery.config.dir";
pub const SKIP_PROPERTIES_FILE_PROP: &str = "discovery.skip.properties.file";
pub const SERVICE_USER_PROP: &str = "discovery.service.user";
pub const SERVICE_GROUP_PROP: &str = "discovery.service.group";
pub const KEYSTORE_ALIASES_PROP: &str = "discovery.keystore.aliases";

// Documentation
pub const SERVICE_VERSION_DOC: &str =
    "The platform version the service runs, i.e. 7.2 or 7.2.1. Selects the translation rules of \
     that version. Unknown or empty versions use the base rules.";
pub const HOSTS_DOC: &str = "Comma separated list of the hosts running Kafka Connect. The \
                             configuration of the first host is the one that is translated.";
pub const CONFIG_DIR_DOC: &str = concatcp!(
    "Directory holding one `<host>.properties` worker configuration per host listed in `",
    HOSTS_PROP,
    "`"
);
pub const SKIP_PROPERTIES_FILE_DOC: &str =
    "Optional properties file mapping a category to the comma separated list of worker \
     properties that are never copied as custom properties, i.e. \
     skip_properties=plugin.path,key.converter";
pub const SERVICE_USER_DOC: &str = "The OS user the Kafka Connect daemon runs as";
pub const SERVICE_GROUP_DOC: &str = "The OS group the Kafka Connect daemon runs as";
pub const KEYSTORE_ALIASES_DOC: &str = concatcp!(
    "Comma separated list of the certificate aliases of the keystore referenced by the worker \
     https listener, in keystore order. Only used when the worker `",
    rules::REST_ADVERTISED_LISTENER_PROP,
    "` is https"
);

#[derive(Debug, IntoEnumIterator)]
pub enum DiscoveryConfigKey {
    ServiceVersion,
    Hosts,
    ConfigDir,
    SkipPropertiesFile,
    ServiceUser,
    ServiceGroup,
    KeystoreAliases,
}

impl fmt::Display for DiscoveryConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ServiceVersion => write!(f, "{}", SERVICE_VERSION_PROP),
            Self::Hosts => write!(f, "{}", HOSTS_PROP),
            Self::ConfigDir => write!(f, "{}", CONFIG_DIR_PROP),
            Self::SkipPropertiesFile => write!(f, "{}", SKIP_PROPERTIES_FILE_PROP),
            Self::ServiceUser => write!(f, "{}", SERVICE_USER_PROP),
            Self::ServiceGroup => write!(f, "{}", SERVICE_GROUP_PROP),
            Self::KeystoreAliases => write!(f, "{}", KEYSTORE_ALIASES_PROP),
        }
    }
}

impl FromStr for DiscoveryConfigKey {
    type Err = ConfigError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input {
            SERVICE_VERSION_PROP => Ok(Self::ServiceVersion),
            HOSTS_PROP => Ok(Self::Hosts),
            CONFIG_DIR_PROP => Ok(Self::ConfigDir),
            SKIP_PROPERTIES_FILE_PROP => Ok(Self::SkipPropertiesFile),
            SERVICE_USER_PROP => Ok(Self::ServiceUser),
            SERVICE_GROUP_PROP => Ok(Self::ServiceGroup),
            KEYSTORE_ALIASES_PROP => Ok(Self::KeystoreAliases),
            _ => Err(ConfigError::UnknownKey(input.to_string())),
        }
    }
}

/// `ConfigError` is returned when settings are invalid, unknown, missing or the settings file is
/// not readable.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Property error: {0}")]
    Property(#[from] java_properties::PropertiesError),
    #[error("ParseInt error: {0}")]
    ParseInt(#[from] num::ParseIntError),
    // String and PathBuf settings are parsed through FromStr as well.
    #[error("Infallible String Error {0:?}")]
    Infallible(#[from] std::convert::Infallible),
    #[error("Missing Key error: {0:?}")]
    MissingKey(String),
    #[error("Invalid Value: {0}")]
    InvalidValue(String),
    #[error("Unknown Key: {0}")]
    UnknownKey(String),
}

/// This implementation is only for testing, for example any I/O error is considered equal
impl PartialEq for ConfigError {
    fn eq(&self, rhs: &Self) -> bool {
        match self {
            Self::Io(_) => matches!(rhs, Self::Io(_)),
            Self::Property(lhs) => {
                matches!(rhs, Self::Property(rhs) if lhs.line_number() == rhs.line_number())
            },
            Self::ParseInt(lhs) => matches!(rhs, Self::ParseInt(rhs) if lhs == rhs),
            Self::Infallible(lhs) => matches!(rhs, Self::Infallible(rhs) if lhs == rhs),
            Self::MissingKey(lhs) => matches!(rhs, Self::MissingKey(rhs) if lhs == rhs),
            Self::InvalidValue(lhs) => matches!(rhs, Self::InvalidValue(rhs) if lhs == rhs),
            Self::UnknownKey(lhs) => matches!(rhs, Self::UnknownKey(rhs) if lhs == rhs),
        }
    }
}

fn not_empty(key: &'static str) -> ConfigDefValidator<String> {
    Box::new(move |value: Option<&String>| match value {
        Some(val) if core_utils::parse_csv_list(val).is_empty() => {
            Err(ConfigError::InvalidValue(format!("{}: must not be empty", key)))
        },
        _ => Ok(()),
    })
}

#[derive(Debug)]
pub struct DiscoveryConfigProperties {
    service_version: ConfigDef<String>,
    hosts: ConfigDef<String>,
    config_dir: ConfigDef<PathBuf>,
    skip_properties_file: ConfigDef<String>,
    service_user: ConfigDef<String>,
    service_group: ConfigDef<String>,
    keystore_aliases: ConfigDef<String>,
}

impl Default for DiscoveryConfigProperties {
    fn default() -> Self {
        Self {
            service_version: ConfigDef::default()
                .with_key(SERVICE_VERSION_PROP)
                .with_importance(ConfigDefImportance::High)
                .with_doc(SERVICE_VERSION_DOC)
                .with_default(String::new()),
            hosts: ConfigDef::default()
                .with_key(HOSTS_PROP)
                .with_importance(ConfigDefImportance::High)
                .with_doc(HOSTS_DOC)
                .with_validator(not_empty(HOSTS_PROP)),
            config_dir: ConfigDef::default()
                .with_key(CONFIG_DIR_PROP)
                .with_importance(ConfigDefImportance::High)
                .with_doc(CONFIG_DIR_DOC),
            skip_properties_file: ConfigDef::default()
                .with_key(SKIP_PROPERTIES_FILE_PROP)
                .with_importance(ConfigDefImportance::Medium)
                .with_doc(SKIP_PROPERTIES_FILE_DOC)
                .with_default(String::new()),
            service_user: ConfigDef::default()
                .with_key(SERVICE_USER_PROP)
                .with_importance(ConfigDefImportance::Medium)
                .with_doc(SERVICE_USER_DOC)
                .with_default(String::from("cp-kafka-connect"))
                .with_validator(not_empty(SERVICE_USER_PROP)),
            service_group: ConfigDef::default()
                .with_key(SERVICE_GROUP_PROP)
                .with_importance(ConfigDefImportance::Medium)
                .with_doc(SERVICE_GROUP_DOC)
                .with_default(String::from("confluent"))
                .with_validator(not_empty(SERVICE_GROUP_PROP)),
            keystore_aliases: ConfigDef::default()
                .with_key(KEYSTORE_ALIASES_PROP)
                .with_importance(ConfigDefImportance::Low)
                .with_doc(KEYSTORE_ALIASES_DOC)
                .with_default(String::new()),
        }
    }
}

impl DiscoveryConfigProperties {
    /// `try_set_property` transforms a string value from the settings file into its actual type
    pub fn try_set_property(
        &mut self,
        property_name: &str,
        property_value: &str,
    ) -> Result<(), ConfigError> {
        match DiscoveryConfigKey::from_str(property_name)? {
            DiscoveryConfigKey::ServiceVersion => {
                self.service_version.try_set_parsed_value(property_value)?
            },
            DiscoveryConfigKey::Hosts => self.hosts.try_set_parsed_value(property_value)?,
            DiscoveryConfigKey::ConfigDir => self.config_dir.try_set_parsed_value(property_value)?,
            DiscoveryConfigKey::SkipPropertiesFile => {
                self.skip_properties_file.try_set_parsed_value(property_value)?
            },
            DiscoveryConfigKey::ServiceUser => {
                self.service_user.try_set_parsed_value(property_value)?
            },
            DiscoveryConfigKey::ServiceGroup => {
                self.service_group.try_set_parsed_value(property_value)?
            },
            DiscoveryConfigKey::KeystoreAliases => {
                self.keystore_aliases.try_set_parsed_value(property_value)?
            },
        };
        Ok(())
    }

    /// `config_names` returns the list of known setting keys
    pub fn config_names() -> Vec<String> {
        DiscoveryConfigKey::into_enum_iter().map(|val| val.to_string()).collect()
    }

    /// Key, importance and documentation of every setting, for `--help` like output
    pub fn describe(&self) -> Vec<(String, ConfigDefImportance, &'static str)> {
        fn entry<T>(def: &ConfigDef<T>) -> (String, ConfigDefImportance, &'static str)
        where
            T: FromStr + fmt::Debug,
            ConfigError: From<<T as FromStr>::Err>,
            <T as FromStr>::Err: fmt::Display,
        {
            (def.key.clone(), def.importance(), def.doc())
        }
        vec![
            entry(&self.service_version),
            entry(&self.hosts),
            entry(&self.config_dir),
            entry(&self.skip_properties_file),
            entry(&self.service_user),
            entry(&self.service_group),
            entry(&self.keystore_aliases),
        ]
    }

    /// `build` validates every setting and resolves them into a `DiscoveryConfig`
    pub fn build(&self) -> Result<DiscoveryConfig, ConfigError> {
        trace!("DiscoveryConfigProperties::build()");
        let service_version = self.service_version.build()?;
        let hosts = core_utils::parse_csv_list(&self.hosts.build()?);
        let config_dir = self.config_dir.build()?;
        let skip_properties_file = self.skip_properties_file.build()?;
        let keystore_aliases = core_utils::parse_csv_list(&self.keystore_aliases.build()?);
        Ok(DiscoveryConfig {
            service_version: Some(service_version).filter(|version| !version.is_empty()),
            hosts,
            config_dir,
            skip_properties_file: Some(skip_properties_file)
                .filter(|path| !path.is_empty())
                .map(PathBuf::from),
            service_user: self.service_user.build()?,
            service_group: self.service_group.build()?,
            keystore_aliases,
        })
    }

    /// Transforms from a HashMap of settings into a DiscoveryConfigProperties object
    /// This may return ConfigError::UnknownKey errors
    pub fn from_properties_hashmap(
        input_config: HashMap<String, String>,
    ) -> Result<Self, ConfigError> {
        let mut config_builder = Self::default();
        for (property, property_value) in &input_config {
            debug!("from_properties_hashmap: {} = {}", property, property_value);
            config_builder.try_set_property(property, property_value)?;
        }
        Ok(config_builder)
    }

    /// `read_config_file` Reads the discovery settings.
    pub fn read_config_file(filename: &str) -> Result<Self, ConfigError> {
        debug!("read_config_file: Reading {}", filename);
        let config_file_content = File::open(filename)?;
        let input_config = java_properties::read(BufReader::new(config_file_content))?;
        Self::from_properties_hashmap(input_config)
    }
}

/// The resolved discovery settings
#[derive(Debug, PartialEq, Clone)]
pub struct DiscoveryConfig {
    pub service_version: Option<String>,
    pub hosts: Vec<String>,
    pub config_dir: PathBuf,
    pub skip_properties_file: Option<PathBuf>,
    pub service_user: String,
    pub service_group: String,
    pub keystore_aliases: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(entries: &[(&str, &str)]) -> HashMap<String, String> {
        entries.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test_log::test]
    fn it_builds_from_hashmap() {
        let config = DiscoveryConfigProperties::from_properties_hashmap(settings(&[
            (HOSTS_PROP, "connect-1, connect-2"),
            (CONFIG_DIR_PROP, "/tmp/discovery"),
            (SERVICE_VERSION_PROP, "7.2.1"),
        ]))
        .unwrap()
        .build()
        .unwrap();
        assert_eq!(config.hosts, vec!["connect-1", "connect-2"]);
        assert_eq!(config.config_dir, PathBuf::from("/tmp/discovery"));
        assert_eq!(config.service_version.as_deref(), Some("7.2.1"));
        assert_eq!(config.skip_properties_file, None);
        assert_eq!(config.service_user, "cp-kafka-connect");
        assert_eq!(config.service_group, "confluent");
        assert!(config.keystore_aliases.is_empty());
    }

    #[test]
    fn it_reports_missing_and_unknown_keys() {
        let err = DiscoveryConfigProperties::from_properties_hashmap(settings(&[(
            HOSTS_PROP,
            "connect-1",
        )]))
        .unwrap()
        .build()
        .unwrap_err();
        assert_eq!(err, ConfigError::MissingKey(CONFIG_DIR_PROP.to_string()));

        let err =
            DiscoveryConfigProperties::from_properties_hashmap(settings(&[("not.a.key", "x")]))
                .unwrap_err();
        assert_eq!(err, ConfigError::UnknownKey(String::from("not.a.key")));
    }

    #[test]
    fn it_rejects_empty_host_lists() {
        let mut props = DiscoveryConfigProperties::default();
        props.try_set_property(CONFIG_DIR_PROP, "/tmp").unwrap();
        props.try_set_property(HOSTS_PROP, " , ").unwrap();
        assert_eq!(
            props.build().unwrap_err(),
            ConfigError::InvalidValue(format!("{}: must not be empty", HOSTS_PROP))
        );
    }

    #[test]
    fn it_documents_the_keystore_aliases_condition() {
        assert!(KEYSTORE_ALIASES_DOC.contains(rules::REST_ADVERTISED_LISTENER_PROP));
        assert!(!KEYSTORE_ALIASES_DOC.contains(HOSTS_PROP));
    }

    #[test]
    fn it_lists_every_key() {
        let names = DiscoveryConfigProperties::config_names();
        assert_eq!(names.len(), 7);
        for name in &names {
            assert!(DiscoveryConfigKey::from_str(name).is_ok());
        }
        assert_eq!(DiscoveryConfigProperties::default().describe().len(), names.len());
    }
}
