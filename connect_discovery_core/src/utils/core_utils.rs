//! Small parsing helpers shared by the configuration layer and the translation rules.

use crate::service::DiscoveryError;
use lazy_static::lazy_static;
use regex::Regex;
use url::Url;

lazy_static! {
    static ref CSV_SEPARATOR: Regex = Regex::new(r"\s*,\s*").unwrap();
}

/// Parses comma separated string into Vec
/// The whitespaces \s around the commas are removed
pub fn parse_csv_list(csv_list: &str) -> Vec<String> {
    CSV_SEPARATOR
        .split(csv_list.trim())
        .filter(|x| !x.is_empty())
        .map(|x| x.to_string())
        .collect()
}

/// Compares a raw keyword value (protocol names, `required`, etc) ignoring surrounding whitespace
/// and ASCII case.
pub fn keyword_matches(value: &str, keyword: &str) -> bool {
    value.trim().eq_ignore_ascii_case(keyword)
}

/// A single listener entry such as `https://connect-1:8083`
#[derive(Debug, PartialEq, Clone)]
pub struct ListenerUri {
    /// Lowercased scheme, i.e. `http` or `https`
    pub scheme: String,
    /// Absent when the URI carries no port or an empty one (`http://host:`). An explicit default
    /// port such as `http://host:80` is kept.
    pub port: Option<u16>,
}

/// The `[userinfo@]host[:port]` part of `scheme://authority[/path][?query][#fragment]`
fn authority(listener: &str) -> Option<&str> {
    let (_, rest) = listener.split_once("://")?;
    let end = rest.find(|c: char| matches!(c, '/' | '?' | '#')).unwrap_or(rest.len());
    Some(&rest[..end])
}

/// The port text written in the authority, if any
fn explicit_port(authority: &str) -> Option<&str> {
    let host_port = authority.rsplit_once('@').map_or(authority, |(_, host_port)| host_port);
    let after_host = match host_port.rfind(']') {
        Some(idx) => &host_port[idx + 1..],
        None => host_port,
    };
    after_host.rsplit_once(':').map(|(_, port)| port).filter(|port| !port.is_empty())
}

impl ListenerUri {
    /// Parses a single listener URI. `key` is only used to report which property was malformed.
    pub fn parse(key: &str, listener: &str) -> Result<Self, DiscoveryError> {
        let listener = listener.trim();
        let authority = authority(listener).ok_or_else(|| {
            DiscoveryError::malformed(key, listener, "expected scheme://host[:port]")
        })?;
        let port_text = explicit_port(authority);
        match Url::parse(listener) {
            Ok(url) => Ok(Self {
                scheme: url.scheme().to_string(),
                port: port_text.and_then(|_| url.port_or_known_default()),
            }),
            // Listeners bound to every interface may leave the host out, i.e. `http://:8083`
            Err(url::ParseError::EmptyHost) => {
                let port = port_text
                    .map(|port| port.parse::<u16>())
                    .transpose()
                    .map_err(|err| {
                        DiscoveryError::malformed(key, listener, format!("invalid port: {}", err))
                    })?;
                let (scheme, _) = listener.split_once("://").unwrap_or_default();
                Ok(Self { scheme: scheme.to_ascii_lowercase(), port })
            },
            Err(err) => Err(DiscoveryError::malformed(key, listener, err)),
        }
    }
}

/// Kafka Connect accepts a comma separated list of listeners, the first one is the one that is
/// used for the REST API.
pub fn first_listener(key: &str, listeners: &str) -> Result<ListenerUri, DiscoveryError> {
    let listener_list = parse_csv_list(listeners);
    tracing::trace!("first_listener parse_csv_list() -> {:?}", listener_list);
    match listener_list.first() {
        Some(listener) => ListenerUri::parse(key, listener),
        None => Err(DiscoveryError::malformed(key, listeners, "empty listener list")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_parses_csv_list() {
        let res = parse_csv_list("http://localhost:8083 , https://localhost:8443,");
        assert_eq!(res, vec!["http://localhost:8083", "https://localhost:8443"]);
        assert!(parse_csv_list("  ").is_empty());
    }

    #[test]
    fn it_parses_listener_uri() {
        let uri = ListenerUri::parse("listeners", "https://host:8083").unwrap();
        assert_eq!(uri, ListenerUri { scheme: String::from("https"), port: Some(8083) });

        let uri = ListenerUri::parse("listeners", " HTTP://0.0.0.0:8083/ ").unwrap();
        assert_eq!(uri.scheme, "http");
        assert_eq!(uri.port, Some(8083));

        let uri = ListenerUri::parse("listeners", "https://[::1]:8443").unwrap();
        assert_eq!(uri.port, Some(8443));

        let uri = ListenerUri::parse("listeners", "http://connect:").unwrap();
        assert_eq!(uri.port, None);

        let uri = ListenerUri::parse("listeners", "http://connect").unwrap();
        assert_eq!(uri.port, None);
    }

    #[test]
    fn it_parses_listeners_with_query_fragment_and_userinfo() {
        for listener in &[
            "http://host:8083?x=1",
            "http://host:8083#f",
            "http://user:pw@host:8083",
            "http://user:pw@host:8083/path?x=1#f",
        ] {
            let uri = ListenerUri::parse("listeners", listener).unwrap();
            assert_eq!(uri.scheme, "http", "{}", listener);
            assert_eq!(uri.port, Some(8083), "{}", listener);
        }
        let uri = ListenerUri::parse("listeners", "http://user:pw@host").unwrap();
        assert_eq!(uri.port, None);
    }

    #[test]
    fn it_keeps_explicit_default_ports() {
        assert_eq!(ListenerUri::parse("listeners", "http://host:80").unwrap().port, Some(80));
        assert_eq!(ListenerUri::parse("listeners", "https://host:443").unwrap().port, Some(443));
        assert_eq!(ListenerUri::parse("listeners", "https://host").unwrap().port, None);
    }

    #[test]
    fn it_accepts_listeners_without_host() {
        let uri = ListenerUri::parse("listeners", "HTTP://:8083").unwrap();
        assert_eq!(uri, ListenerUri { scheme: String::from("http"), port: Some(8083) });
    }

    #[test]
    fn it_rejects_bad_listeners() {
        assert!(ListenerUri::parse("listeners", "connect-1:8083").is_err());
        assert!(ListenerUri::parse("listeners", "http://connect-1:port").is_err());
        assert!(ListenerUri::parse("listeners", "http://connect-1:70000").is_err());
        assert!(ListenerUri::parse("listeners", "http://:port").is_err());
        assert!(first_listener("listeners", " , ").is_err());
    }

    #[test]
    fn it_uses_the_first_listener() {
        let uri = first_listener("listeners", "https://a:8443,http://b:8083").unwrap();
        assert_eq!(uri.scheme, "https");
        assert_eq!(uri.port, Some(8443));
    }

    #[test]
    fn it_matches_keywords() {
        assert!(keyword_matches(" HTTPS ", "https"));
        assert!(keyword_matches("Required", "required"));
        assert!(!keyword_matches("requested", "required"));
    }
}
