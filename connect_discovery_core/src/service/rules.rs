//! Kafka Connect translation rules.
//!
//! Each rule reads a handful of raw keys from the worker configuration and derives inventory
//! properties. Rules return the keys they consumed alongside their properties so that the
//! remaining keys can be passed through as custom properties.

use super::configuration::ServiceConfiguration;
use super::{DiscoveryError, ServiceKind};
use crate::collaborators::CredentialStore;
use crate::inventory::{PropertyMap, PropertyValue, Scope};
use crate::utils::core_utils::{self, keyword_matches};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::{debug, warn};

const SERVICE: ServiceKind = ServiceKind::KafkaConnect;

// Config Keys
pub const CONFIG_STORAGE_REPLICATION_FACTOR_PROP: &str = "config.storage.replication.factor";
pub const CONFIG_STORAGE_TOPIC_PROP: &str = "config.storage.topic";
pub const MONITORING_INTERCEPTOR_TOPIC_PROP: &str = "confluent.monitoring.interceptor.topic";
pub const GROUP_ID_PROP: &str = "group.id";
pub const LISTENERS_PROP: &str = "listeners";
pub const REST_ADVERTISED_LISTENER_PROP: &str = "rest.advertised.listener";
pub const REST_ADVERTISED_PORT_PROP: &str = "rest.advertised.port";
pub const SSL_KEYSTORE_LOCATION_PROP: &str = "listeners.https.ssl.keystore.location";
pub const SSL_KEYSTORE_PASSWORD_PROP: &str = "listeners.https.ssl.keystore.password";
pub const SSL_KEY_PASSWORD_PROP: &str = "listeners.https.ssl.key.password";
pub const SSL_TRUSTSTORE_LOCATION_PROP: &str = "listeners.https.ssl.truststore.location";
pub const SSL_TRUSTSTORE_PASSWORD_PROP: &str = "listeners.https.ssl.truststore.password";
pub const SSL_CLIENT_AUTH_PROP: &str = "listeners.https.ssl.client.auth";
pub const REST_SERVLET_INITIALIZOR_CLASSES_PROP: &str = "rest.servlet.initializor.classes";
pub const PUBLIC_KEY_PATH_PROP: &str = "public.key.path";
pub const METADATA_BOOTSTRAP_SERVER_URLS_PROP: &str = "confluent.metadata.bootstrap.server.urls";
pub const METADATA_BASIC_AUTH_USER_INFO_PROP: &str = "confluent.metadata.basic.auth.user.info";
pub const CONFIG_PROVIDERS_PROP: &str = "config.providers";
pub const SECRET_MASTER_ENCRYPTION_KEY_PROP: &str =
    "config.providers.secret.param.master.encryption.key";
pub const SECRET_TOPIC_REPLICATION_FACTOR_PROP: &str =
    "config.providers.secret.param.kafkastore.topic.replication.factor";

/// The keystore and truststore settings of the https listener, consumed together.
pub const SSL_PROPS: [&str; 5] = [
    SSL_KEYSTORE_LOCATION_PROP,
    SSL_KEYSTORE_PASSWORD_PROP,
    SSL_KEY_PASSWORD_PROP,
    SSL_TRUSTSTORE_LOCATION_PROP,
    SSL_TRUSTSTORE_PASSWORD_PROP,
];

const CONFIG_STORAGE_TOPIC_SUFFIX: &str = "-configs";
const HTTPS_PROTOCOL: &str = "https";
const CLIENT_AUTH_REQUIRED: &str = "required";

/// What a rule sees of the run it belongs to
pub struct RuleContext<'a> {
    pub config: &'a ServiceConfiguration,
    pub hosts: &'a [String],
    pub credentials: &'a dyn CredentialStore,
}

impl fmt::Debug for RuleContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleContext")
            .field("config", &self.config)
            .field("hosts", &self.hosts)
            .finish_non_exhaustive()
    }
}

impl<'a> RuleContext<'a> {
    /// Raw value of `key`. An absent key is expected and only logged.
    pub fn value(&self, key: &str) -> Option<&'a str> {
        let value = self.config.get(key);
        if value.is_none() {
            debug!("{} is not set, nothing derived from it", key);
        }
        value
    }

    /// Like `value` but coerced to an integer
    pub fn int_value(&self, key: &str) -> Result<Option<i32>, DiscoveryError> {
        let value = self.config.get_i32(key)?;
        if value.is_none() {
            debug!("{} is not set, nothing derived from it", key);
        }
        Ok(value)
    }

    pub fn has(&self, key: &str) -> bool {
        self.value(key).is_some()
    }
}

/// The derived properties of a rule, the scope they belong to and the raw keys the rule consumed
#[derive(Debug, Clone, PartialEq)]
pub struct RuleOutput {
    pub scope: Scope,
    pub properties: PropertyMap,
    pub consumed: BTreeSet<String>,
}

impl RuleOutput {
    /// An empty output for the `all` scope
    pub fn all() -> Self {
        Self { scope: Scope::All, properties: PropertyMap::new(), consumed: BTreeSet::new() }
    }

    /// An empty output for the scope of `service`
    pub fn service(service: ServiceKind) -> Self {
        Self { scope: Scope::Service(service), ..Self::all() }
    }

    pub fn with(mut self, key: &str, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }

    /// Like `with`, skipped when there is no value
    pub fn with_opt<V: Into<PropertyValue>>(self, key: &str, value: Option<V>) -> Self {
        match value {
            Some(value) => self.with(key, value),
            None => self,
        }
    }

    pub fn consuming(mut self, keys: &[&str]) -> Self {
        self.consumed.extend(keys.iter().map(|key| key.to_string()));
        self
    }
}

pub type RuleEvaluator = fn(&RuleContext<'_>) -> Result<RuleOutput, DiscoveryError>;

/// A declared translation rule. `keys` lists every raw key the rule may consume.
#[derive(Clone, Copy)]
pub struct TranslationRule {
    pub name: &'static str,
    pub keys: &'static [&'static str],
    pub evaluate: RuleEvaluator,
}

impl fmt::Debug for TranslationRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TranslationRule")
            .field("name", &self.name)
            .field("keys", &self.keys)
            .finish_non_exhaustive()
    }
}

/// The base rules, in evaluation order. When two rules derive the same property the later one
/// wins the merge.
pub const BASE_RULES: &[TranslationRule] = &[
    TranslationRule {
        name: "replication_factor",
        keys: &[CONFIG_STORAGE_REPLICATION_FACTOR_PROP],
        evaluate: build_replication_factor,
    },
    TranslationRule {
        name: "config_storage_topic",
        keys: &[CONFIG_STORAGE_TOPIC_PROP],
        evaluate: build_config_storage_topic,
    },
    TranslationRule {
        name: "monitoring_interceptor",
        keys: &[MONITORING_INTERCEPTOR_TOPIC_PROP],
        evaluate: build_monitoring_interceptor,
    },
    TranslationRule { name: "connect_group_id", keys: &[GROUP_ID_PROP], evaluate: build_group_id },
    TranslationRule {
        name: "service_protocol_port",
        keys: &[LISTENERS_PROP],
        evaluate: build_service_protocol_port,
    },
    TranslationRule {
        name: "advertised_protocol_port",
        keys: &[REST_ADVERTISED_LISTENER_PROP, REST_ADVERTISED_PORT_PROP],
        evaluate: build_advertised_protocol_port,
    },
    TranslationRule {
        name: "ssl",
        keys: &[
            REST_ADVERTISED_LISTENER_PROP,
            SSL_KEYSTORE_LOCATION_PROP,
            SSL_KEYSTORE_PASSWORD_PROP,
            SSL_KEY_PASSWORD_PROP,
            SSL_TRUSTSTORE_LOCATION_PROP,
            SSL_TRUSTSTORE_PASSWORD_PROP,
        ],
        evaluate: build_ssl,
    },
    TranslationRule { name: "mtls", keys: &[SSL_CLIENT_AUTH_PROP], evaluate: build_mtls },
    TranslationRule {
        name: "rbac",
        keys: &[
            REST_SERVLET_INITIALIZOR_CLASSES_PROP,
            PUBLIC_KEY_PATH_PROP,
            METADATA_BOOTSTRAP_SERVER_URLS_PROP,
        ],
        evaluate: build_rbac,
    },
    TranslationRule {
        name: "ldap",
        keys: &[METADATA_BASIC_AUTH_USER_INFO_PROP],
        evaluate: build_ldap,
    },
    TranslationRule {
        name: "secret_registry",
        keys: &[
            CONFIG_PROVIDERS_PROP,
            SECRET_MASTER_ENCRYPTION_KEY_PROP,
            SECRET_TOPIC_REPLICATION_FACTOR_PROP,
        ],
        evaluate: build_secret_registry,
    },
];

pub fn build_replication_factor(ctx: &RuleContext<'_>) -> Result<RuleOutput, DiscoveryError> {
    let replication_factor = ctx.int_value(CONFIG_STORAGE_REPLICATION_FACTOR_PROP)?;
    Ok(RuleOutput::all()
        .consuming(&[CONFIG_STORAGE_REPLICATION_FACTOR_PROP])
        .with_opt("kafka_connect_default_internal_replication_factor", replication_factor))
}

/// The connect group id is the config storage topic without its `-configs` suffix
pub fn build_config_storage_topic(ctx: &RuleContext<'_>) -> Result<RuleOutput, DiscoveryError> {
    let group_id = ctx.value(CONFIG_STORAGE_TOPIC_PROP).map(|topic| {
        topic.strip_suffix(CONFIG_STORAGE_TOPIC_SUFFIX).unwrap_or(topic).to_string()
    });
    Ok(RuleOutput::all()
        .consuming(&[CONFIG_STORAGE_TOPIC_PROP])
        .with_opt("kafka_connect_group_id", group_id))
}

pub fn build_monitoring_interceptor(ctx: &RuleContext<'_>) -> Result<RuleOutput, DiscoveryError> {
    Ok(RuleOutput::all().consuming(&[MONITORING_INTERCEPTOR_TOPIC_PROP]).with(
        "kafka_connect_monitoring_interceptors_enabled",
        ctx.has(MONITORING_INTERCEPTOR_TOPIC_PROP),
    ))
}

pub fn build_group_id(ctx: &RuleContext<'_>) -> Result<RuleOutput, DiscoveryError> {
    Ok(RuleOutput::all()
        .consuming(&[GROUP_ID_PROP])
        .with_opt("kafka_connect_group_id", ctx.value(GROUP_ID_PROP)))
}

/// Protocol and port of the first entry of `listeners`, the protocol is the URI scheme
pub fn build_service_protocol_port(ctx: &RuleContext<'_>) -> Result<RuleOutput, DiscoveryError> {
    let output = RuleOutput::all().consuming(&[LISTENERS_PROP]);
    match ctx.value(LISTENERS_PROP) {
        Some(listeners) => {
            let listener = core_utils::first_listener(LISTENERS_PROP, listeners)?;
            Ok(output
                .with("kafka_connect_http_protocol", listener.scheme)
                .with_opt("kafka_connect_rest_port", listener.port))
        },
        None => Ok(output),
    }
}

/// Unlike `build_service_protocol_port` the protocol is the raw advertised listener value
pub fn build_advertised_protocol_port(
    ctx: &RuleContext<'_>,
) -> Result<RuleOutput, DiscoveryError> {
    let port = ctx.int_value(REST_ADVERTISED_PORT_PROP)?;
    Ok(RuleOutput::all()
        .consuming(&[REST_ADVERTISED_LISTENER_PROP, REST_ADVERTISED_PORT_PROP])
        .with_opt("kafka_connect_http_protocol", ctx.value(REST_ADVERTISED_LISTENER_PROP))
        .with_opt("kafka_connect_rest_port", port))
}

/// Keystore and truststore settings, only when the advertised listener is https
pub fn build_ssl(ctx: &RuleContext<'_>) -> Result<RuleOutput, DiscoveryError> {
    match ctx.value(REST_ADVERTISED_LISTENER_PROP) {
        Some(protocol) if keyword_matches(protocol, HTTPS_PROTOCOL) => {},
        _ => return Ok(RuleOutput::all()),
    }
    let keystore_path = ctx.value(SSL_KEYSTORE_LOCATION_PROP);
    let store_password = ctx.value(SSL_KEYSTORE_PASSWORD_PROP);
    let key_password = ctx.value(SSL_KEY_PASSWORD_PROP);
    let mut output = RuleOutput::service(SERVICE)
        .consuming(&SSL_PROPS)
        .with("ssl_enabled", true)
        .with("ssl_provided_keystore_and_truststore", true)
        .with("ssl_provided_keystore_and_truststore_remote_src", true)
        .with_opt("ssl_keystore_filepath", keystore_path)
        .with_opt("ssl_keystore_store_password", store_password)
        .with_opt("ssl_keystore_key_password", key_password)
        .with_opt("ssl_truststore_filepath", ctx.value(SSL_TRUSTSTORE_LOCATION_PROP))
        .with_opt("ssl_truststore_password", ctx.value(SSL_TRUSTSTORE_PASSWORD_PROP))
        .with("ssl_truststore_ca_cert_alias", "");

    match (keystore_path, key_password.or(store_password)) {
        (Some(path), Some(password)) => {
            let aliases = ctx.credentials.resolve_certificate_aliases(password, path, ctx.hosts)?;
            debug!("build_ssl: keystore {} has aliases {:?}", path, aliases);
            if let Some(alias) = aliases.into_iter().next() {
                output = output.with("ssl_keystore_alias", alias);
            }
        },
        _ => warn!(
            "build_ssl: {} or its password is not set, the keystore alias cannot be resolved",
            SSL_KEYSTORE_LOCATION_PROP
        ),
    }
    Ok(output)
}

pub fn build_mtls(ctx: &RuleContext<'_>) -> Result<RuleOutput, DiscoveryError> {
    match ctx.value(SSL_CLIENT_AUTH_PROP) {
        Some(client_auth) if keyword_matches(client_auth, CLIENT_AUTH_REQUIRED) => {
            Ok(RuleOutput::service(SERVICE)
                .consuming(&[SSL_CLIENT_AUTH_PROP])
                .with("ssl_mutual_auth_enabled", true))
        },
        _ => Ok(RuleOutput::all().consuming(&[SSL_CLIENT_AUTH_PROP])),
    }
}

pub fn build_rbac(ctx: &RuleContext<'_>) -> Result<RuleOutput, DiscoveryError> {
    if !ctx.has(REST_SERVLET_INITIALIZOR_CLASSES_PROP) {
        return Ok(RuleOutput::service(SERVICE).with("rbac_enabled", false));
    }
    Ok(RuleOutput::service(SERVICE)
        .consuming(&[
            REST_SERVLET_INITIALIZOR_CLASSES_PROP,
            PUBLIC_KEY_PATH_PROP,
            METADATA_BOOTSTRAP_SERVER_URLS_PROP,
        ])
        .with("rbac_enabled", true)
        .with_opt("rbac_enabled_public_pem_path", ctx.value(PUBLIC_KEY_PATH_PROP)))
}

/// `user:password`, split on the first colon so passwords may contain colons
pub fn build_ldap(ctx: &RuleContext<'_>) -> Result<RuleOutput, DiscoveryError> {
    let output = RuleOutput::all().consuming(&[METADATA_BASIC_AUTH_USER_INFO_PROP]);
    match ctx.value(METADATA_BASIC_AUTH_USER_INFO_PROP) {
        Some(user_info) => match user_info.split_once(':') {
            Some((user, password)) => Ok(output
                .with("kafka_connect_ldap_user", user)
                .with("kafka_connect_ldap_password", password)),
            None => Err(DiscoveryError::malformed(
                METADATA_BASIC_AUTH_USER_INFO_PROP,
                user_info,
                "expected user:password",
            )),
        },
        None => Ok(output),
    }
}

pub fn build_secret_registry(ctx: &RuleContext<'_>) -> Result<RuleOutput, DiscoveryError> {
    if !ctx.has(CONFIG_PROVIDERS_PROP) {
        return Ok(RuleOutput::all().with("kafka_connect_secret_registry_enabled", false));
    }
    let replication_factor = ctx.int_value(SECRET_TOPIC_REPLICATION_FACTOR_PROP)?;
    Ok(RuleOutput::all()
        .consuming(&[
            CONFIG_PROVIDERS_PROP,
            SECRET_MASTER_ENCRYPTION_KEY_PROP,
            SECRET_TOPIC_REPLICATION_FACTOR_PROP,
        ])
        .with("kafka_connect_secret_registry_enabled", true)
        .with_opt(
            "kafka_connect_secret_registry_key",
            ctx.value(SECRET_MASTER_ENCRYPTION_KEY_PROP),
        )
        .with_opt("kafka_connect_secret_registry_default_replication_factor", replication_factor))
}

/// The keys of `config` that no rule consumed and that are not in `skip`, with their values.
pub fn unmapped_properties(
    config: &ServiceConfiguration,
    mapped: &BTreeSet<String>,
    skip: &BTreeSet<String>,
) -> BTreeMap<String, String> {
    config
        .iter()
        .filter(|(key, _)| !mapped.contains(*key) && !skip.contains(*key))
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}
