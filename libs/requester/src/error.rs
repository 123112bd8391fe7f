use crate::response::ShapedResponse;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Classification of URL resolution failures.
///
/// Provides programmatic matching for different failure modes without
/// relying on unstable error message strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum InvalidUriKind {
    /// URL could not be parsed (malformed syntax)
    ParseError,
    /// URL is relative and no base URL was configured
    RelativeWithoutBase,
    /// The configured base URL could not be parsed
    InvalidBase,
}

/// A response was received but its status is outside `[200, 400)`.
///
/// Carries the fully shaped response so callers can inspect the status,
/// headers and parsed body of the failure.
#[derive(Debug, Clone)]
pub struct HttpError {
    message: String,
    response: Box<ShapedResponse>,
}

impl HttpError {
    /// Wrap a shaped response.
    ///
    /// The message is the reason phrase the server sent, else the canonical
    /// reason for the status, else `HTTP <code>`.
    #[must_use]
    pub fn new(response: ShapedResponse) -> Self {
        let message = response
            .reason
            .clone()
            .or_else(|| response.status.canonical_reason().map(str::to_owned))
            .unwrap_or_else(|| format!("HTTP {}", response.status.as_u16()));
        Self {
            message,
            response: Box::new(response),
        }
    }

    /// Status text (or fallback) describing the failure.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The response that triggered the error.
    #[must_use]
    pub fn response(&self) -> &ShapedResponse {
        &self.response
    }

    /// Consume the error and return the response.
    #[must_use]
    pub fn into_response(self) -> ShapedResponse {
        *self.response
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.response.status.as_u16(), self.message)
    }
}

impl std::error::Error for HttpError {}

/// Client error types
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Request building failed
    #[error("Failed to build request: {0}")]
    RequestBuild(#[from] http::Error),

    /// Invalid header name
    #[error("Invalid header name: {0}")]
    InvalidHeaderName(#[from] http::header::InvalidHeaderName),

    /// Invalid header value
    #[error("Invalid header value: {0}")]
    InvalidHeaderValue(#[from] http::header::InvalidHeaderValue),

    /// Structured request body could not be encoded as JSON
    #[error("Failed to serialize request body: {0}")]
    Serialization(#[source] serde_json::Error),

    /// Response body could not be decoded into the requested type
    #[error("JSON decoding failed: {0}")]
    Json(#[source] serde_json::Error),

    /// The exchange did not complete within the configured timeout
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Transport error (DNS, connection refused, reset, protocol error)
    #[error("Transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// TLS setup error
    #[error("TLS error: {0}")]
    Tls(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Response body exceeded size limit
    #[error("Response body too large: limit {limit} bytes, got {actual} bytes")]
    BodyTooLarge { limit: usize, actual: usize },

    /// Internal service failure (buffer worker died, channel closed)
    #[error("Service unavailable: internal failure")]
    ServiceClosed,

    /// Response status outside the success range while `should_throw` is set
    #[error("HTTP error: {0}")]
    Http(#[from] HttpError),

    /// Invalid URL
    ///
    /// Use the `kind` field for programmatic matching. The `reason` field is
    /// a diagnostic message for logging only.
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUri {
        /// The URL that failed to resolve
        url: String,
        /// Structured failure classification
        kind: InvalidUriKind,
        /// Diagnostic message (unstable format)
        reason: String,
    },

    /// URL scheme other than `http` or `https`
    #[error("URL scheme '{scheme}' not allowed: {reason}")]
    InvalidScheme {
        /// The URL scheme that was rejected
        scheme: String,
        /// Reason the scheme was rejected
        reason: String,
    },
}

impl Error {
    /// True when no response was ever received: connection failures,
    /// timeouts and a dead transport worker.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Timeout(_) | Self::ServiceClosed
        )
    }

    /// True for [`Error::Timeout`].
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// The response carried by an [`Error::Http`].
    #[must_use]
    pub fn response(&self) -> Option<&ShapedResponse> {
        match self {
            Self::Http(err) => Some(err.response()),
            _ => None,
        }
    }

    /// Status code of the response carried by an [`Error::Http`].
    #[must_use]
    pub fn status(&self) -> Option<http::StatusCode> {
        self.response().map(|r| r.status)
    }
}

impl From<hyper::Error> for Error {
    fn from(err: hyper::Error) -> Self {
        Error::Transport(Box::new(err))
    }
}

impl From<hyper_util::client::legacy::Error> for Error {
    fn from(err: hyper_util::client::legacy::Error) -> Self {
        Error::Transport(Box::new(err))
    }
}
