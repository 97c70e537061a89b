//! Collaborators backed by local `.properties` files and static settings.
//!
//! Worker configurations are expected as `<config dir>/<host>.properties`, one per host.

use super::{
    CollaboratorError, Collaborators, ConfigFetcher, ConfigGroup, CredentialStore,
    HostConfigurations, HostResolver, ServiceUserGroup, SkipListLoader, UserGroupResolver,
};
use crate::config::DiscoveryConfig;
use crate::service::configuration::ServiceConfiguration;
use crate::service::ServiceKind;
use crate::utils::core_utils;
use fs_err::File;
use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, trace, warn};

/// Hosts listed in the discovery settings
#[derive(Debug, Clone, Default)]
pub struct StaticHostResolver {
    hosts: Vec<String>,
}

impl StaticHostResolver {
    pub fn new(hosts: Vec<String>) -> Self {
        Self { hosts }
    }
}

impl HostResolver for StaticHostResolver {
    fn resolve_hosts(&self, service: ServiceKind) -> Result<Vec<String>, CollaboratorError> {
        trace!("resolve_hosts: {} -> {:?}", service, self.hosts);
        Ok(self.hosts.clone())
    }
}

/// Reads `<dir>/<host>.properties` into the default group of each host. Hosts without a file are
/// left out of the result.
#[derive(Debug, Clone)]
pub struct PropertiesDirFetcher {
    dir: PathBuf,
}

impl PropertiesDirFetcher {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn host_file(&self, host: &str) -> PathBuf {
        self.dir.join(format!("{}.properties", host))
    }
}

impl ConfigFetcher for PropertiesDirFetcher {
    fn fetch_configuration(
        &self,
        service: ServiceKind,
        hosts: &[String],
    ) -> Result<HostConfigurations, CollaboratorError> {
        let mut configurations = HostConfigurations::new();
        for host in hosts {
            let path = self.host_file(host);
            let file = match File::open(&path) {
                Ok(file) => file,
                Err(err) if err.kind() == io::ErrorKind::NotFound => {
                    warn!("No {} configuration for {}: {}", service, host, err);
                    continue;
                },
                Err(err) => return Err(err.into()),
            };
            let properties = java_properties::read(BufReader::new(file))?;
            debug!("fetch_configuration: {} properties from {:?}", properties.len(), path);
            let mut groups = BTreeMap::new();
            groups.insert(ConfigGroup::Default, ServiceConfiguration::from(properties));
            configurations.insert(host.clone(), groups);
        }
        Ok(configurations)
    }
}

#[derive(Debug, Clone)]
pub struct StaticUserGroupResolver {
    user_group: ServiceUserGroup,
}

impl StaticUserGroupResolver {
    pub fn new(user: impl Into<String>, group: impl Into<String>) -> Self {
        Self { user_group: ServiceUserGroup { user: user.into(), group: group.into() } }
    }
}

impl UserGroupResolver for StaticUserGroupResolver {
    fn resolve_daemon_user_group(
        &self,
        _service: ServiceKind,
        _hosts: &[String],
    ) -> Result<ServiceUserGroup, CollaboratorError> {
        Ok(self.user_group.clone())
    }
}

/// Answers every keystore query with the configured aliases
#[derive(Debug, Clone, Default)]
pub struct StaticCredentialStore {
    aliases: Vec<String>,
}

impl StaticCredentialStore {
    pub fn new(aliases: Vec<String>) -> Self {
        Self { aliases }
    }
}

impl CredentialStore for StaticCredentialStore {
    fn resolve_certificate_aliases(
        &self,
        _keystore_password: &str,
        keystore_path: &str,
        _hosts: &[String],
    ) -> Result<Vec<String>, CollaboratorError> {
        debug!("resolve_certificate_aliases: {} -> {:?}", keystore_path, self.aliases);
        Ok(self.aliases.clone())
    }
}

/// category -> comma separated raw keys, read from a properties file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertiesSkipList {
    categories: BTreeMap<String, BTreeSet<String>>,
}

impl PropertiesSkipList {
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, CollaboratorError> {
        let categories = java_properties::read(BufReader::new(reader))?
            .into_iter()
            .map(|(category, keys)| {
                (category, core_utils::parse_csv_list(&keys).into_iter().collect())
            })
            .collect();
        Ok(Self { categories })
    }

    pub fn read_file(path: &Path) -> Result<Self, CollaboratorError> {
        debug!("PropertiesSkipList::read_file: {:?}", path);
        Self::from_reader(File::open(path)?)
    }
}

impl SkipListLoader for PropertiesSkipList {
    fn load_skip_list(&self, category: &str) -> Result<BTreeSet<String>, CollaboratorError> {
        Ok(self.categories.get(category).cloned().unwrap_or_default())
    }
}

/// Every local collaborator, wired from the discovery settings
#[derive(Debug)]
pub struct LocalCollaborators {
    pub hosts: StaticHostResolver,
    pub fetcher: PropertiesDirFetcher,
    pub user_group: StaticUserGroupResolver,
    pub credentials: StaticCredentialStore,
    pub skip_list: PropertiesSkipList,
}

impl LocalCollaborators {
    pub fn from_config(config: &DiscoveryConfig) -> Result<Self, CollaboratorError> {
        let skip_list = match &config.skip_properties_file {
            Some(path) => PropertiesSkipList::read_file(path)?,
            None => PropertiesSkipList::default(),
        };
        Ok(Self {
            hosts: StaticHostResolver::new(config.hosts.clone()),
            fetcher: PropertiesDirFetcher::new(&config.config_dir),
            user_group: StaticUserGroupResolver::new(
                config.service_user.clone(),
                config.service_group.clone(),
            ),
            credentials: StaticCredentialStore::new(config.keystore_aliases.clone()),
            skip_list,
        })
    }

    pub fn collaborators(&self) -> Collaborators<'_> {
        Collaborators {
            hosts: &self.hosts,
            fetcher: &self.fetcher,
            user_group: &self.user_group,
            credentials: &self.credentials,
            skip_list: &self.skip_list,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_reads_skip_categories() {
        let input = "skip_properties=plugin.path, key.converter ,value.converter\nother=a\n";
        let skip_list = PropertiesSkipList::from_reader(input.as_bytes()).unwrap();
        let skipped = skip_list.load_skip_list("skip_properties").unwrap();
        assert_eq!(skipped.len(), 3);
        assert!(skipped.contains("key.converter"));
        assert!(skip_list.load_skip_list("missing").unwrap().is_empty());
    }

    #[test]
    fn it_names_host_files() {
        let fetcher = PropertiesDirFetcher::new("/etc/kafka");
        assert_eq!(
            fetcher.host_file("connect-1"),
            PathBuf::from("/etc/kafka/connect-1.properties")
        );
    }

    #[test_log::test]
    fn it_skips_hosts_without_files() {
        let fetcher = PropertiesDirFetcher::new("/nonexistent/discovery/dir");
        let configurations = fetcher
            .fetch_configuration(ServiceKind::KafkaConnect, &[String::from("connect-1")])
            .unwrap();
        assert!(configurations.is_empty());
    }

    #[test]
    fn it_wires_static_settings() {
        let config = DiscoveryConfig {
            service_version: None,
            hosts: vec![String::from("connect-1")],
            config_dir: PathBuf::from("/etc/kafka"),
            skip_properties_file: None,
            service_user: String::from("connect"),
            service_group: String::from("kafka"),
            keystore_aliases: vec![String::from("server")],
        };
        let local = LocalCollaborators::from_config(&config).unwrap();
        let collaborators = local.collaborators();
        let service = ServiceKind::KafkaConnect;
        assert_eq!(collaborators.hosts.resolve_hosts(service).unwrap(), config.hosts);
        let user_group =
            collaborators.user_group.resolve_daemon_user_group(service, &config.hosts).unwrap();
        assert_eq!(user_group.user, "connect");
        assert_eq!(user_group.group, "kafka");
        assert_eq!(
            collaborators.credentials.resolve_certificate_aliases("pw", "/ks", &[]).unwrap(),
            vec![String::from("server")]
        );
    }
}
