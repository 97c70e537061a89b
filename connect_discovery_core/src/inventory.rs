//! Inventory properties produced by the property builders.
//!
//! The inventory is shared by every service builder of a discovery pass, so it is only ever
//! merged into: a merge overwrites the keys it carries and leaves every other key in place.

use crate::service::ServiceKind;
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_derive::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::trace;

/// Derived property name -> value
pub type PropertyMap = BTreeMap<String, PropertyValue>;

/// Scope -> derived properties
pub type InventoryProperties = BTreeMap<Scope, PropertyMap>;

/// The inventory grouping a property belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Scope {
    /// Variables shared by every host of the inventory
    All,
    /// Variables of the hosts running a specific service
    Service(ServiceKind),
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "all"),
            Self::Service(service) => write!(f, "{}", service.group()),
        }
    }
}

impl Serialize for Scope {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    Str(String),
    /// Only used for namespaced groups such as the custom properties passthrough
    Map(BTreeMap<String, String>),
}

impl PropertyValue {
    pub fn as_map(&self) -> Option<&BTreeMap<String, String>> {
        match self {
            Self::Map(val) => Some(val),
            _ => None,
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(val: bool) -> Self {
        Self::Bool(val)
    }
}

impl From<i32> for PropertyValue {
    fn from(val: i32) -> Self {
        Self::Int(i64::from(val))
    }
}

impl From<u16> for PropertyValue {
    fn from(val: u16) -> Self {
        Self::Int(i64::from(val))
    }
}

impl From<&str> for PropertyValue {
    fn from(val: &str) -> Self {
        Self::Str(val.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(val: String) -> Self {
        Self::Str(val)
    }
}

impl From<BTreeMap<String, String>> for PropertyValue {
    fn from(val: BTreeMap<String, String>) -> Self {
        Self::Map(val)
    }
}

/// Receives the derived properties of a builder.
///
/// Implementations used from several threads must serialize `merge` calls, the last merge for a
/// given scope/key wins.
pub trait InventorySink {
    fn merge(&self, scope: &Scope, properties: PropertyMap);
}

/// In-memory inventory, merges are serialized through a mutex.
#[derive(Debug, Default)]
pub struct Inventory {
    groups: Mutex<InventoryProperties>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    fn groups(&self) -> MutexGuard<'_, InventoryProperties> {
        // extend() is the only mutation, a poisoned map is still consistent.
        self.groups.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// A copy of the current content
    pub fn snapshot(&self) -> InventoryProperties {
        self.groups().clone()
    }

    pub fn get(&self, scope: &Scope, key: &str) -> Option<PropertyValue> {
        self.groups().get(scope).and_then(|properties| properties.get(key)).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.groups().is_empty()
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl InventorySink for Inventory {
    fn merge(&self, scope: &Scope, properties: PropertyMap) {
        if properties.is_empty() {
            trace!("Inventory::merge nothing to merge into {}", scope);
            return;
        }
        trace!("Inventory::merge {} properties into {}", properties.len(), scope);
        self.groups().entry(*scope).or_default().extend(properties);
    }
}

impl Serialize for Inventory {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let groups = self.snapshot();
        let mut map = serializer.serialize_map(Some(groups.len()))?;
        for (scope, properties) in &groups {
            map.serialize_entry(scope, properties)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(entries: &[(&str, PropertyValue)]) -> PropertyMap {
        entries.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn it_merges_without_replacing() {
        let inventory = Inventory::new();
        let connect = Scope::Service(ServiceKind::KafkaConnect);
        inventory.merge(&Scope::All, props(&[("a", PropertyValue::Int(1)), ("b", "x".into())]));
        inventory.merge(&connect, props(&[("ssl_enabled", true.into())]));
        inventory.merge(&Scope::All, props(&[("b", "y".into())]));

        assert_eq!(inventory.get(&Scope::All, "a"), Some(PropertyValue::Int(1)));
        assert_eq!(inventory.get(&Scope::All, "b"), Some(PropertyValue::Str("y".to_string())));
        assert_eq!(inventory.get(&connect, "ssl_enabled"), Some(PropertyValue::Bool(true)));
    }

    #[test]
    fn it_ignores_empty_merges() {
        let inventory = Inventory::new();
        inventory.merge(&Scope::All, PropertyMap::new());
        assert!(inventory.is_empty());
    }

    #[test]
    fn it_serializes_scopes_as_group_names() {
        let inventory = Inventory::new();
        inventory.merge(
            &Scope::Service(ServiceKind::KafkaConnect),
            props(&[("rbac_enabled", false.into())]),
        );
        inventory
            .merge(&Scope::All, props(&[("kafka_connect_rest_port", PropertyValue::Int(8083))]));
        let json: serde_json::Value =
            serde_json::from_str(&inventory.to_json_pretty().unwrap()).unwrap();
        assert_eq!(json["all"]["kafka_connect_rest_port"], 8083);
        assert_eq!(json["kafka_connect"]["rbac_enabled"], false);
    }
}
