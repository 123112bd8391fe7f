use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Default User-Agent string for HTTP requests
pub const DEFAULT_USER_AGENT: &str = concat!("requester/", env!("CARGO_PKG_VERSION"));

/// Content codings advertised on every request unless
/// [`ClientConfig::advertise_compression`] is off; all of them are undone by
/// the response shaper.
pub const DEFAULT_ACCEPT_ENCODING: &str = "gzip, deflate, br";

/// Verbosity of the client's own diagnostics.
///
/// Gates the events the client emits through `tracing`; the installed
/// subscriber still decides what is printed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
}

impl LogLevel {
    /// Whether an event at `level` should be emitted under this setting.
    #[must_use]
    pub fn allows(self, level: LogLevel) -> bool {
        level <= self
    }
}

/// Instance-level defaults of a [`Client`](crate::Client).
///
/// Every call merges these with its own [`RequestOptions`](crate::RequestOptions);
/// call-time values win and header maps merge key by key.
///
/// Deserializable so it can be embedded in application configuration:
///
/// ```ignore
/// let config: ClientConfig = serde_json::from_str(r#"{
///     "base_url": "https://api.example.com/v1/",
///     "timeout": "5s",
///     "headers": { "x-api-key": "secret" }
/// }"#)?;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// Headers sent with every request (default: none)
    pub headers: BTreeMap<String, String>,

    /// Base against which relative request URLs are resolved (default: none)
    pub base_url: Option<String>,

    /// Timeout covering connect, headers and body of one exchange (default: 60s)
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    /// Turn responses outside `[200, 400)` into errors (default: true)
    pub should_throw: bool,

    /// Diagnostic verbosity (default: info)
    pub log_level: LogLevel,

    /// User-Agent header value (default: "requester/<version>")
    pub user_agent: String,

    /// Maximum response body size in bytes, enforced on the bytes received
    /// and again on the decoded body (default: 10 MB)
    pub max_body_size: usize,

    /// Send `accept-encoding: gzip, deflate, br` unless the caller sets one
    /// (default: true)
    pub advertise_compression: bool,

    /// Buffer capacity for concurrent request handling (default: 1024)
    pub buffer_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            headers: BTreeMap::new(),
            base_url: None,
            timeout: Duration::from_secs(60),
            should_throw: true,
            log_level: LogLevel::Info,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            max_body_size: 10 * 1024 * 1024, // 10 MB
            advertise_compression: true,
            buffer_capacity: 1024,
        }
    }
}

impl ClientConfig {
    /// Built-in headers overlaid with the configured ones, keys lower-cased.
    #[must_use]
    pub fn default_headers(&self) -> BTreeMap<String, String> {
        let mut headers = BTreeMap::from([("user-agent".to_owned(), self.user_agent.clone())]);
        if self.advertise_compression {
            headers.insert(
                "accept-encoding".to_owned(),
                DEFAULT_ACCEPT_ENCODING.to_owned(),
            );
        }
        for (name, value) in &self.headers {
            headers.insert(name.to_ascii_lowercase(), value.clone());
        }
        headers
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert!(config.should_throw);
        assert_eq!(config.log_level, LogLevel::Info);
        assert_eq!(config.user_agent, DEFAULT_USER_AGENT);
        assert!(config.base_url.is_none());
        assert!(config.headers.is_empty());
    }

    #[test]
    fn test_default_user_agent_has_version() {
        assert!(DEFAULT_USER_AGENT.starts_with("requester/"));
        assert!(DEFAULT_USER_AGENT.len() > "requester/".len());
    }

    #[test]
    fn test_log_level_ordering() {
        assert!(LogLevel::Debug.allows(LogLevel::Debug));
        assert!(LogLevel::Debug.allows(LogLevel::Warn));
        assert!(LogLevel::Info.allows(LogLevel::Warn));
        assert!(!LogLevel::Info.allows(LogLevel::Debug));
        assert!(!LogLevel::Error.allows(LogLevel::Warn));
    }

    #[test]
    fn test_default_headers_lowercase_and_override() {
        let mut config = ClientConfig::default();
        config
            .headers
            .insert("User-Agent".to_owned(), "custom/1.0".to_owned());
        config
            .headers
            .insert("X-Api-Key".to_owned(), "k".to_owned());

        let headers = config.default_headers();
        assert_eq!(headers.get("user-agent").map(String::as_str), Some("custom/1.0"));
        assert_eq!(headers.get("x-api-key").map(String::as_str), Some("k"));
        assert_eq!(
            headers.get("accept-encoding").map(String::as_str),
            Some(DEFAULT_ACCEPT_ENCODING)
        );
        assert!(!headers.contains_key("User-Agent"));
    }

    #[test]
    fn test_compression_not_advertised_when_disabled() {
        let config = ClientConfig {
            advertise_compression: false,
            ..Default::default()
        };
        let headers = config.default_headers();
        assert!(!headers.contains_key("accept-encoding"));
        assert_eq!(headers.get("user-agent").map(String::as_str), Some(DEFAULT_USER_AGENT));

        let config: ClientConfig =
            serde_json::from_str(r#"{"advertise_compression": false}"#).unwrap();
        assert!(!config.advertise_compression);
        assert!(ClientConfig::default().advertise_compression);
    }

    #[test]
    fn test_deserialize_partial_config() {
        let config: ClientConfig = serde_json::from_str(
            r#"{
                "base_url": "http://localhost:8080/api/",
                "timeout": "5s",
                "should_throw": false,
                "log_level": "debug",
                "headers": { "x-test": "1" }
            }"#,
        )
        .unwrap();

        assert_eq!(config.base_url.as_deref(), Some("http://localhost:8080/api/"));
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert!(!config.should_throw);
        assert_eq!(config.log_level, LogLevel::Debug);
        assert_eq!(config.headers.get("x-test").map(String::as_str), Some("1"));
        // Unspecified fields keep their defaults
        assert_eq!(config.user_agent, DEFAULT_USER_AGENT);
        assert_eq!(config.max_body_size, 10 * 1024 * 1024);
    }

    #[test]
    fn test_deserialize_rejects_unknown_fields() {
        let result: Result<ClientConfig, _> = serde_json::from_str(r#"{"retries": 3}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_serialize_roundtrips_timeout_as_humantime() {
        let config = ClientConfig {
            timeout: Duration::from_millis(1500),
            ..Default::default()
        };
        let value = serde_json::to_value(&config).unwrap();
        assert_eq!(value["timeout"], "1s 500ms");
    }
}
