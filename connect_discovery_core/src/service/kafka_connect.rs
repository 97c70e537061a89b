//! Kafka Connect property builder.
//!
//! Resolves the hosts running Kafka Connect, reads the worker configuration of the first one and
//! merges the translated properties into the inventory. The configuration is assumed to be the
//! same on every worker of the cluster.

use super::configuration::ServiceConfiguration;
use super::registry::{RuleSet, RuleSetRegistry};
use super::{DiscoveryError, ServiceKind};
use crate::collaborators::{Collaborators, ConfigGroup};
use crate::inventory::{InventorySink, PropertyMap, Scope};
use crate::service::rules;
use std::collections::BTreeSet;
use tracing::{debug, error, info, trace};
use tracing_attributes::instrument;

const SERVICE: ServiceKind = ServiceKind::KafkaConnect;

/// The skip list category of the properties never passed through
pub const SKIP_PROPERTIES_CATEGORY: &str = "skip_properties";

/// Builds the Kafka Connect properties with the rule set matching `version_tag`.
pub fn build_properties(
    collaborators: Collaborators<'_>,
    version_tag: Option<&str>,
    inventory: &dyn InventorySink,
) -> Result<(), DiscoveryError> {
    let registry = RuleSetRegistry::default();
    KafkaConnectPropertyBuilder::new(collaborators, registry.select(version_tag))
        .build_properties(inventory)
}

#[derive(Debug)]
pub struct KafkaConnectPropertyBuilder<'a> {
    collaborators: Collaborators<'a>,
    rule_set: &'a RuleSet,
}

impl<'a> KafkaConnectPropertyBuilder<'a> {
    pub fn new(collaborators: Collaborators<'a>, rule_set: &'a RuleSet) -> Self {
        Self { collaborators, rule_set }
    }

    /// Merges every Kafka Connect property into `inventory`. A service without hosts is not an
    /// error, nothing is merged in that case.
    #[instrument(skip(self, inventory))]
    pub fn build_properties(&self, inventory: &dyn InventorySink) -> Result<(), DiscoveryError> {
        let hosts = self
            .collaborators
            .hosts
            .resolve_hosts(SERVICE)
            .map_err(|err| self.step_failed("resolve_hosts", err.into()))?;
        if hosts.is_empty() {
            error!("Could not find any host with service {}", SERVICE);
            return Ok(());
        }
        info!(
            "Building {} properties from {} with rule set {}",
            SERVICE,
            hosts[0],
            self.rule_set.label()
        );

        let service_properties = self
            .fetch_service_properties(&hosts)
            .map_err(|err| self.step_failed("fetch_configuration", err))?;

        // Build service user group properties
        self.build_daemon_properties(&hosts, inventory)
            .map_err(|err| self.step_failed("resolve_daemon_user_group", err))?;

        // Build service properties, rule failures carry the failing rule already
        let mapped_properties =
            self.build_service_properties(&service_properties, &hosts, inventory)?;

        // Add custom properties of Kafka Connect
        self.build_custom_properties(&service_properties, &mapped_properties, inventory)
            .map_err(|err| self.step_failed("load_skip_list", err))?;

        // Build command line properties
        self.build_runtime_properties(&service_properties)
    }

    fn step_failed(&self, operation: &'static str, err: DiscoveryError) -> DiscoveryError {
        error!(
            "{} {} failed with rule set {}: {}",
            SERVICE,
            operation,
            self.rule_set.label(),
            err
        );
        DiscoveryError::Step {
            service: SERVICE,
            version: self.rule_set.label().to_string(),
            operation,
            source: Box::new(err),
        }
    }

    /// The default group configuration of the first host
    fn fetch_service_properties(
        &self,
        hosts: &[String],
    ) -> Result<ServiceConfiguration, DiscoveryError> {
        let mut host_service_properties =
            self.collaborators.fetcher.fetch_configuration(SERVICE, hosts)?;
        let host = &hosts[0];
        let mut groups = host_service_properties.remove(host).ok_or_else(|| {
            DiscoveryError::MissingConfiguration(format!(
                "{} has no configuration for {}",
                host, SERVICE
            ))
        })?;
        groups.remove(&ConfigGroup::Default).ok_or_else(|| {
            DiscoveryError::MissingConfiguration(format!(
                "{} has no {} configuration group for {}",
                host,
                ConfigGroup::Default,
                SERVICE
            ))
        })
    }

    fn build_daemon_properties(
        &self,
        hosts: &[String],
        inventory: &dyn InventorySink,
    ) -> Result<(), DiscoveryError> {
        // User group information
        let user_group =
            self.collaborators.user_group.resolve_daemon_user_group(SERVICE, hosts)?;
        debug!("build_daemon_properties: {:?}", user_group);
        inventory.merge(&Scope::All, user_group.into_properties(SERVICE));
        Ok(())
    }

    /// Runs the rule set and merges each rule result, returns the consumed raw keys.
    fn build_service_properties(
        &self,
        service_properties: &ServiceConfiguration,
        hosts: &[String],
        inventory: &dyn InventorySink,
    ) -> Result<BTreeSet<String>, DiscoveryError> {
        let translation =
            self.rule_set.translate(service_properties, hosts, self.collaborators.credentials)?;
        for (name, output) in translation.outputs {
            trace!(
                "build_service_properties: {} -> {} {:?}",
                name,
                output.scope,
                output.properties
            );
            inventory.merge(&output.scope, output.properties);
        }
        Ok(translation.mapped)
    }

    fn build_custom_properties(
        &self,
        service_properties: &ServiceConfiguration,
        mapped_properties: &BTreeSet<String>,
        inventory: &dyn InventorySink,
    ) -> Result<(), DiscoveryError> {
        let skip_properties =
            self.collaborators.skip_list.load_skip_list(SKIP_PROPERTIES_CATEGORY)?;
        let custom_properties =
            rules::unmapped_properties(service_properties, mapped_properties, &skip_properties);
        debug!("build_custom_properties: {} custom properties", custom_properties.len());
        let mut properties = PropertyMap::new();
        properties.insert(SERVICE.custom_properties_group().to_string(), custom_properties.into());
        inventory.merge(&Scope::All, properties);
        Ok(())
    }

    /// Properties derived from the command line of the worker process. None are derived yet.
    fn build_runtime_properties(
        &self,
        _service_properties: &ServiceConfiguration,
    ) -> Result<(), DiscoveryError> {
        trace!("build_runtime_properties: nothing to derive for {}", SERVICE);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{
        CollaboratorError, ConfigFetcher, CredentialStore, HostConfigurations, HostResolver,
        ServiceUserGroup, SkipListLoader, UserGroupResolver,
    };
    use crate::inventory::{Inventory, PropertyValue};
    use std::cell::Cell;
    use std::collections::BTreeMap;
    use std::io;

    #[derive(Default)]
    struct Fixture {
        hosts: Vec<String>,
        config: Vec<(&'static str, &'static str)>,
        skip: Vec<&'static str>,
        fetches: Cell<usize>,
    }

    impl HostResolver for Fixture {
        fn resolve_hosts(&self, _service: ServiceKind) -> Result<Vec<String>, CollaboratorError> {
            Ok(self.hosts.clone())
        }
    }

    impl ConfigFetcher for Fixture {
        fn fetch_configuration(
            &self,
            _service: ServiceKind,
            hosts: &[String],
        ) -> Result<HostConfigurations, CollaboratorError> {
            self.fetches.set(self.fetches.get() + 1);
            let config: ServiceConfiguration = self.config.iter().copied().collect();
            Ok(hosts
                .iter()
                .map(|host| {
                    let mut groups = BTreeMap::new();
                    groups.insert(ConfigGroup::Default, config.clone());
                    (host.clone(), groups)
                })
                .collect())
        }
    }

    impl UserGroupResolver for Fixture {
        fn resolve_daemon_user_group(
            &self,
            _service: ServiceKind,
            _hosts: &[String],
        ) -> Result<ServiceUserGroup, CollaboratorError> {
            Ok(ServiceUserGroup {
                user: String::from("cp-kafka-connect"),
                group: String::from("confluent"),
            })
        }
    }

    impl CredentialStore for Fixture {
        fn resolve_certificate_aliases(
            &self,
            _keystore_password: &str,
            _keystore_path: &str,
            _hosts: &[String],
        ) -> Result<Vec<String>, CollaboratorError> {
            Err(CollaboratorError::failed("keytool", "unreachable host"))
        }
    }

    impl SkipListLoader for Fixture {
        fn load_skip_list(&self, category: &str) -> Result<BTreeSet<String>, CollaboratorError> {
            assert_eq!(category, SKIP_PROPERTIES_CATEGORY);
            Ok(self.skip.iter().map(|key| key.to_string()).collect())
        }
    }

    impl Fixture {
        fn collaborators(&self) -> Collaborators<'_> {
            Collaborators {
                hosts: self,
                fetcher: self,
                user_group: self,
                credentials: self,
                skip_list: self,
            }
        }
    }

    #[test_log::test]
    fn it_does_nothing_without_hosts() {
        let fixture = Fixture::default();
        let inventory = Inventory::new();
        build_properties(fixture.collaborators(), Some("7.2"), &inventory).unwrap();
        assert!(inventory.is_empty());
        assert_eq!(fixture.fetches.get(), 0);
    }

    #[test]
    fn it_merges_daemon_rule_and_custom_properties() {
        let fixture = Fixture {
            hosts: vec![String::from("connect-1"), String::from("connect-2")],
            config: vec![
                ("group.id", "connect-cluster"),
                ("listeners", "http://0.0.0.0:8083"),
                ("plugin.path", "/usr/share/java"),
                ("key.converter", "org.apache.kafka.connect.json.JsonConverter"),
            ],
            skip: vec!["key.converter"],
            ..Default::default()
        };
        let inventory = Inventory::new();
        build_properties(fixture.collaborators(), None, &inventory).unwrap();

        assert_eq!(
            inventory.get(&Scope::All, "kafka_connect_user"),
            Some(PropertyValue::from("cp-kafka-connect"))
        );
        assert_eq!(
            inventory.get(&Scope::All, "kafka_connect_group_id"),
            Some(PropertyValue::from("connect-cluster"))
        );
        assert_eq!(
            inventory.get(&Scope::All, "kafka_connect_rest_port"),
            Some(PropertyValue::Int(8083))
        );
        assert_eq!(
            inventory.get(&Scope::All, "kafka_connect_secret_registry_enabled"),
            Some(PropertyValue::Bool(false))
        );
        assert_eq!(
            inventory.get(&Scope::Service(SERVICE), "rbac_enabled"),
            Some(PropertyValue::Bool(false))
        );
        let custom = inventory.get(&Scope::All, "kafka_connect_custom_properties").unwrap();
        let custom = custom.as_map().unwrap();
        assert_eq!(custom.len(), 1);
        assert_eq!(custom.get("plugin.path").map(String::as_str), Some("/usr/share/java"));
    }

    struct DeniedFetcher;

    impl ConfigFetcher for DeniedFetcher {
        fn fetch_configuration(
            &self,
            _service: ServiceKind,
            _hosts: &[String],
        ) -> Result<HostConfigurations, CollaboratorError> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied").into())
        }
    }

    #[test_log::test]
    fn it_names_service_version_and_operation_on_fetch_failures() {
        let fixture = Fixture { hosts: vec![String::from("connect-1")], ..Default::default() };
        let collaborators = Collaborators { fetcher: &DeniedFetcher, ..fixture.collaborators() };
        let inventory = Inventory::new();
        let err = build_properties(collaborators, Some("7.2.1"), &inventory).unwrap_err();
        match &err {
            DiscoveryError::Step { service, version, operation, .. } => {
                assert_eq!(*service, SERVICE);
                assert_eq!(version, "7.2");
                assert_eq!(*operation, "fetch_configuration");
            },
            other => panic!("unexpected error {:?}", other),
        }
        assert!(matches!(err.root(), DiscoveryError::Collaborator(CollaboratorError::Io(_))));
        assert_eq!(
            err.to_string(),
            "fetch_configuration failed for kafka_connect (rule set 7.2): Collaborator error: IO \
             error: denied"
        );
        assert!(inventory.is_empty());
    }

    #[test]
    fn it_names_the_operation_when_the_first_host_has_no_configuration() {
        let fixture = Fixture { hosts: vec![String::from("connect-1")], ..Default::default() };
        let collaborators = Collaborators { fetcher: &NoConfiguration, ..fixture.collaborators() };
        let err = build_properties(collaborators, None, &Inventory::new()).unwrap_err();
        assert_eq!(
            err,
            DiscoveryError::Step {
                service: SERVICE,
                version: String::from("base"),
                operation: "fetch_configuration",
                source: Box::new(DiscoveryError::MissingConfiguration(String::from(
                    "connect-1 has no configuration for kafka_connect"
                ))),
            }
        );
    }

    struct NoConfiguration;

    impl ConfigFetcher for NoConfiguration {
        fn fetch_configuration(
            &self,
            _service: ServiceKind,
            _hosts: &[String],
        ) -> Result<HostConfigurations, CollaboratorError> {
            Ok(HostConfigurations::new())
        }
    }

    #[test]
    fn it_propagates_collaborator_failures() {
        let fixture = Fixture {
            hosts: vec![String::from("connect-1")],
            config: vec![
                ("rest.advertised.listener", "https"),
                ("listeners.https.ssl.keystore.location", "/var/ssl/connect.keystore.jks"),
                ("listeners.https.ssl.keystore.password", "secret"),
            ],
            ..Default::default()
        };
        let inventory = Inventory::new();
        let err = build_properties(fixture.collaborators(), Some("7.0"), &inventory).unwrap_err();
        assert!(matches!(err.root(), DiscoveryError::Collaborator(_)));
        // Rule results are only merged once every rule succeeded
        assert!(inventory.get(&Scope::All, "kafka_connect_http_protocol").is_none());
    }
}
