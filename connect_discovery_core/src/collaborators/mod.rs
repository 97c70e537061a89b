//! Contracts of the collaborators a property builder relies on.
//!
//! How hosts are reached and how configuration files are fetched is not the concern of the
//! builders, they only see these traits. [`local`] contains implementations backed by local
//! files and static settings.

pub mod local;

use crate::inventory::PropertyMap;
use crate::service::configuration::ServiceConfiguration;
use crate::service::ServiceKind;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::io;
use thiserror::Error;

/// A named group of properties in the fetched configuration of a host
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConfigGroup {
    /// Service level settings, i.e. the main `.properties` file of the service
    Default,
    Named(String),
}

impl fmt::Display for ConfigGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => write!(f, "default"),
            Self::Named(name) => write!(f, "{}", name),
        }
    }
}

/// host -> group -> configuration
pub type HostConfigurations = BTreeMap<String, BTreeMap<ConfigGroup, ServiceConfiguration>>;

/// The OS user and group a service daemon runs as
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceUserGroup {
    pub user: String,
    pub group: String,
}

impl ServiceUserGroup {
    /// `<service group>_user` and `<service group>_group` properties
    pub fn into_properties(self, service: ServiceKind) -> PropertyMap {
        let mut properties = PropertyMap::new();
        properties.insert(format!("{}_user", service.group()), self.user.into());
        properties.insert(format!("{}_group", service.group()), self.group.into());
        properties
    }
}

#[derive(Error, Debug)]
pub enum CollaboratorError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Property error: {0}")]
    Property(#[from] java_properties::PropertiesError),
    #[error("{operation} failed: {reason}")]
    Failed { operation: &'static str, reason: String },
}

impl CollaboratorError {
    pub fn failed(operation: &'static str, reason: impl fmt::Display) -> Self {
        Self::Failed { operation, reason: reason.to_string() }
    }
}

pub trait HostResolver {
    /// Hosts running `service`, in inventory order. May be empty.
    fn resolve_hosts(&self, service: ServiceKind) -> Result<Vec<String>, CollaboratorError>;
}

pub trait ConfigFetcher {
    fn fetch_configuration(
        &self,
        service: ServiceKind,
        hosts: &[String],
    ) -> Result<HostConfigurations, CollaboratorError>;
}

pub trait UserGroupResolver {
    fn resolve_daemon_user_group(
        &self,
        service: ServiceKind,
        hosts: &[String],
    ) -> Result<ServiceUserGroup, CollaboratorError>;
}

pub trait CredentialStore {
    /// Aliases of the certificates in a keystore, in keystore order
    fn resolve_certificate_aliases(
        &self,
        keystore_password: &str,
        keystore_path: &str,
        hosts: &[String],
    ) -> Result<Vec<String>, CollaboratorError>;
}

pub trait SkipListLoader {
    /// Raw keys of `category` that must never be passed through as custom properties
    fn load_skip_list(&self, category: &str) -> Result<BTreeSet<String>, CollaboratorError>;
}

/// The collaborators of one builder run
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub hosts: &'a dyn HostResolver,
    pub fetcher: &'a dyn ConfigFetcher,
    pub user_group: &'a dyn UserGroupResolver,
    pub credentials: &'a dyn CredentialStore,
    pub skip_list: &'a dyn SkipListLoader,
}

impl fmt::Debug for Collaborators<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}
