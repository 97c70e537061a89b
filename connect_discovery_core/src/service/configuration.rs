//! The raw configuration of a service as fetched from one of its hosts.

use super::DiscoveryError;
use std::collections::{BTreeMap, HashMap};

/// Raw key -> value configuration, immutable for the duration of a translation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServiceConfiguration {
    props: BTreeMap<String, String>,
}

impl ServiceConfiguration {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.props.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.props.contains_key(key)
    }

    /// Keys in lexicographic order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.props.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.props.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Reads `key` as an integer, surrounding whitespace is ignored.
    /// A value that is present but not an integer is a `MalformedValue`.
    pub fn get_i32(&self, key: &str) -> Result<Option<i32>, DiscoveryError> {
        match self.get(key) {
            Some(value) => value
                .trim()
                .parse::<i32>()
                .map(Some)
                .map_err(|err| DiscoveryError::malformed(key, value, err)),
            None => Ok(None),
        }
    }
}

impl From<HashMap<String, String>> for ServiceConfiguration {
    fn from(props: HashMap<String, String>) -> Self {
        Self { props: props.into_iter().collect() }
    }
}

impl From<BTreeMap<String, String>> for ServiceConfiguration {
    fn from(props: BTreeMap<String, String>) -> Self {
        Self { props }
    }
}

impl<K, V> FromIterator<(K, V)> for ServiceConfiguration
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self { props: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect() }
    }
}
