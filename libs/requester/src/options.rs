use crate::config::{ClientConfig, LogLevel};
use crate::error::Error;
use bytes::Bytes;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// Body of an outgoing request.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// Raw bytes, sent as-is
    Bytes(Bytes),
    /// Pre-encoded text, sent as-is (e.g. a form-encoded string)
    Text(String),
    /// Structured value, encoded as JSON by the request shaper
    Json(serde_json::Value),
}

impl RequestBody {
    /// Build a JSON body from any serializable value.
    ///
    /// # Errors
    ///
    /// Returns `Error::Serialization` if the value has no JSON representation
    /// (e.g. a map with non-string keys).
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, Error> {
        serde_json::to_value(value)
            .map(Self::Json)
            .map_err(Error::Serialization)
    }
}

impl From<serde_json::Value> for RequestBody {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}

impl From<String> for RequestBody {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for RequestBody {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<Bytes> for RequestBody {
    fn from(value: Bytes) -> Self {
        Self::Bytes(value)
    }
}

impl From<Vec<u8>> for RequestBody {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(value))
    }
}

/// Call-time options for a single request.
///
/// Every field is optional; unset fields fall back to the client's
/// [`ClientConfig`]. Header names are lower-cased on insertion.
///
/// # Example
///
/// ```ignore
/// let options = RequestOptions::new()
///     .header("Authorization", "Bearer token")
///     .json(&NewUser { name: "Alice" })?
///     .timeout(Duration::from_secs(5));
///
/// let resp = client.post("/users", options).await?;
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestOptions {
    pub method: Option<http::Method>,
    pub headers: BTreeMap<String, String>,
    pub body: Option<RequestBody>,
    pub base_url: Option<String>,
    pub timeout: Option<Duration>,
    pub should_throw: Option<bool>,
    pub log_level: Option<LogLevel>,
}

impl RequestOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the HTTP method
    #[must_use]
    pub fn method(mut self, method: http::Method) -> Self {
        self.method = Some(method);
        self
    }

    /// Add a header; the name is stored lower-cased so that differently
    /// cased duplicates replace each other.
    #[must_use]
    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Add multiple headers
    #[must_use]
    pub fn headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        for (name, value) in headers {
            self.headers
                .insert(name.as_ref().to_ascii_lowercase(), value.into());
        }
        self
    }

    /// Set the request body
    #[must_use]
    pub fn body(mut self, body: impl Into<RequestBody>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Set a structured body that is sent as JSON
    ///
    /// # Errors
    ///
    /// Returns `Error::Serialization` if the value cannot be represented as JSON.
    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> Result<Self, Error> {
        self.body = Some(RequestBody::json(value)?);
        Ok(self)
    }

    /// Override the base URL for this call
    #[must_use]
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Override the timeout for this call
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Override whether non-success statuses become errors
    #[must_use]
    pub fn should_throw(mut self, should_throw: bool) -> Self {
        self.should_throw = Some(should_throw);
        self
    }

    /// Override diagnostic verbosity for this call
    #[must_use]
    pub fn log_level(mut self, log_level: LogLevel) -> Self {
        self.log_level = Some(log_level);
        self
    }
}

/// Fully defaulted options of one call, the result of merging a
/// [`ClientConfig`] with [`RequestOptions`].
#[derive(Debug, Clone, PartialEq)]
pub struct MergedOptions {
    pub method: http::Method,
    pub headers: BTreeMap<String, String>,
    pub body: Option<RequestBody>,
    pub base_url: Option<String>,
    pub timeout: Duration,
    pub should_throw: bool,
    pub log_level: LogLevel,
}

impl MergedOptions {
    /// Merge field by field; call-time values win, headers merge key-wise.
    #[must_use]
    pub fn merge(config: &ClientConfig, options: RequestOptions) -> Self {
        let mut headers = config.default_headers();
        for (name, value) in options.headers {
            headers.insert(name.to_ascii_lowercase(), value);
        }

        Self {
            method: options.method.unwrap_or(http::Method::GET),
            headers,
            body: options.body,
            base_url: options.base_url.or_else(|| config.base_url.clone()),
            timeout: options.timeout.unwrap_or(config.timeout),
            should_throw: options.should_throw.unwrap_or(config.should_throw),
            log_level: options.log_level.unwrap_or(config.log_level),
        }
    }
}
