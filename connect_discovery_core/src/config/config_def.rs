//! Definition of a single discovery setting: its key, documentation, default and validator.
use super::ConfigError;
use std::fmt;
use std::str::FromStr;
use tracing::{error, trace};

/// `ConfigDefImportance` provides the levels of importance of the settings, used when printing
/// the available settings.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum ConfigDefImportance {
    High,
    Medium,
    Low,
}

impl fmt::Display for ConfigDefImportance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::High => write!(f, "high"),
            Self::Medium => write!(f, "medium"),
            Self::Low => write!(f, "low"),
        }
    }
}

pub type ConfigDefValidator<T> = Box<dyn Fn(Option<&T>) -> Result<(), ConfigError>>;

/// `ConfigDef` holds the value of a setting, either its default or the value read from the
/// discovery properties file.
pub struct ConfigDef<T> {
    /// The configuration key that is used to apply this value
    pub key: String,
    importance: ConfigDefImportance,
    default: Option<T>,
    /// The documentation of the field, used for showing errors
    doc: &'static str,
    /// Whether or not this variable was provided by the configuration file.
    provided: bool,
    /// The current value, be it the default or overwritten by config
    value: Option<T>,
    validator: Option<ConfigDefValidator<T>>,
}

impl<T> fmt::Debug for ConfigDef<T>
where
    T: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigDef")
            .field("key", &self.key)
            .field("importance", &self.importance)
            .field("default", &self.default)
            .field("doc", &self.doc)
            .field("provided", &self.provided)
            .field("value", &self.value)
            .field("validator_exists", &self.validator.is_some())
            .finish()
    }
}

impl<T> Default for ConfigDef<T> {
    fn default() -> Self {
        Self {
            importance: ConfigDefImportance::Low,
            doc: "",
            key: String::from("unset.key"),
            default: None,
            provided: false,
            value: None,
            validator: None,
        }
    }
}

impl<T> ConfigDef<T>
where
    T: FromStr,
    ConfigError: From<<T as FromStr>::Err>,
    <T as FromStr>::Err: fmt::Display,
    T: fmt::Debug,
{
    /// Sets the `key` value, this comes from const &str values in the calling modules
    pub fn with_key(mut self, key: &str) -> Self {
        self.key = key.to_string();
        self
    }

    pub fn with_doc(mut self, doc: &'static str) -> Self {
        self.doc = doc;
        self
    }

    pub fn with_importance(mut self, importance: ConfigDefImportance) -> Self {
        self.importance = importance;
        self
    }

    pub fn with_default(mut self, default: T) -> Self
    where
        T: Clone,
    {
        self.value = Some(default.clone());
        self.default = Some(default);
        self
    }

    pub fn with_validator(mut self, validator: ConfigDefValidator<T>) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn set_value(&mut self, value: T) {
        self.value = Some(value);
        self.provided = true;
    }

    pub fn try_set_parsed_value(&mut self, value: &str) -> Result<(), ConfigError> {
        match value.trim().parse::<_>() {
            Ok(val) => {
                trace!("{} = {:?}", self.key, val);
                self.set_value(val);
                Ok(())
            },
            Err(err) => {
                error!("Unable to parse property {:?} : {}. Doc: {}", value, err, self.doc);
                Err(ConfigError::from(err))
            },
        }
    }

    pub fn get_value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn doc(&self) -> &'static str {
        self.doc
    }

    pub fn importance(&self) -> ConfigDefImportance {
        self.importance
    }

    pub fn is_provided(&self) -> bool {
        self.provided
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match &self.validator {
            Some(validator) => (validator)(self.value.as_ref()),
            None => Ok(()),
        }
    }

    /// Validates and returns the current value, a setting without value nor default is a
    /// `MissingKey`.
    pub fn build(&self) -> Result<T, ConfigError>
    where
        T: Clone,
    {
        self.validate()?;
        match &self.value {
            Some(value) => Ok(value.clone()),
            None => Err(ConfigError::MissingKey(self.key.to_string())),
        }
    }
}
