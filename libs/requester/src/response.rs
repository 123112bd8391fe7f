use crate::config::LogLevel;
use crate::decode::{decode_body, decode_body_limited};
use crate::error::Error;
use crate::options::MergedOptions;
use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use serde::de::DeserializeOwned;
use std::collections::HashMap;

/// Status, headers and accumulated body of a completed exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub status: StatusCode,
    /// Reason phrase from the status line, when the server sent a
    /// non-standard one
    pub reason: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RawResponse {
    #[must_use]
    pub fn new(status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            status,
            reason: None,
            headers,
            body,
        }
    }

    /// Attach the status line's reason phrase
    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// Echo of the request that produced a response, kept for diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestInfo {
    /// Final absolute URL
    pub url: String,
    /// Options after merging client defaults with call-time values
    pub options: MergedOptions,
}

#[cfg(test)]
impl RequestInfo {
    pub(crate) fn for_testing(url: &str) -> Self {
        Self {
            url: url.to_owned(),
            options: MergedOptions::merge(
                &crate::config::ClientConfig::default(),
                crate::options::RequestOptions::default(),
            ),
        }
    }
}

/// Parsed response body.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    /// Text content, or JSON that failed to parse
    Text(String),
    /// Parsed `application/json`
    Json(serde_json::Value),
    /// Parsed `application/x-www-form-urlencoded`
    Form(HashMap<String, String>),
    /// Content type not recognized as text
    Binary(Bytes),
}

impl Body {
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text.as_str()),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_form(&self) -> Option<&HashMap<String, String>> {
        match self {
            Self::Form(form) => Some(form),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Self::Binary(bytes) => Some(bytes),
            _ => None,
        }
    }
}

/// A fully interpreted response.
///
/// `ok` is true iff the status lies in `[200, 400)`. `raw_body` holds the
/// bytes after content-coding removal; `body` is absent when that is empty.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapedResponse {
    pub status: StatusCode,
    /// Non-standard reason phrase sent by the server, if any
    pub reason: Option<String>,
    pub ok: bool,
    pub headers: HeaderMap,
    pub raw_body: Bytes,
    pub body: Option<Body>,
    pub request: RequestInfo,
}

/// Success classification used for `ok`.
#[must_use]
pub fn is_ok_status(status: StatusCode) -> bool {
    (200..400).contains(&status.as_u16())
}

/// How a body is interpreted, derived from `content-type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyKind {
    Json,
    Form,
    Text,
    Binary,
}

impl BodyKind {
    fn classify(content_type: Option<&str>) -> Self {
        let Some(content_type) = content_type else {
            return Self::Text;
        };
        let content_type = content_type.to_ascii_lowercase();
        if content_type.contains("application/json") {
            Self::Json
        } else if content_type.contains("application/x-www-form-urlencoded") {
            Self::Form
        } else if content_type.contains("text/") {
            Self::Text
        } else {
            Self::Binary
        }
    }
}

impl ShapedResponse {
    /// Interpret a raw response. Never fails: undecodable codings pass
    /// through and malformed JSON or form bodies stay as text.
    ///
    /// Decoding is unbounded; use [`ShapedResponse::from_raw_limited`] for
    /// bodies from untrusted peers.
    #[must_use]
    pub fn from_raw(raw: &RawResponse, request: RequestInfo) -> Self {
        let log_level = request.options.log_level;
        let content_encoding = header_str(&raw.headers, http::header::CONTENT_ENCODING);
        let raw_body = decode_body(content_encoding, raw.body.clone(), log_level);
        Self::assemble(raw, request, raw_body)
    }

    /// Like [`ShapedResponse::from_raw`], but content decoding stops once the
    /// decoded body exceeds `max_body_size`.
    ///
    /// # Errors
    ///
    /// Returns `Error::BodyTooLarge` if the decoded body exceeds the limit.
    pub fn from_raw_limited(
        raw: &RawResponse,
        request: RequestInfo,
        max_body_size: usize,
    ) -> Result<Self, Error> {
        let log_level = request.options.log_level;
        let content_encoding = header_str(&raw.headers, http::header::CONTENT_ENCODING);
        let raw_body =
            decode_body_limited(content_encoding, raw.body.clone(), max_body_size, log_level)?;
        Ok(Self::assemble(raw, request, raw_body))
    }

    fn assemble(raw: &RawResponse, request: RequestInfo, raw_body: Bytes) -> Self {
        let body = if raw_body.is_empty() {
            None
        } else {
            let content_type = header_str(&raw.headers, http::header::CONTENT_TYPE);
            Some(interpret(
                BodyKind::classify(content_type),
                &raw_body,
                request.options.log_level,
            ))
        };

        Self {
            status: raw.status,
            reason: raw.reason.clone(),
            ok: is_ok_status(raw.status),
            headers: raw.headers.clone(),
            raw_body,
            body,
            request,
        }
    }

    /// Header value as a string, if present and valid UTF-8.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// The `content-type` header, if any.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        header_str(&self.headers, http::header::CONTENT_TYPE)
    }

    /// The body as text: the parsed text body, or the lossy UTF-8 decoding
    /// of the raw bytes for every other kind.
    #[must_use]
    pub fn text(&self) -> String {
        match &self.body {
            Some(Body::Text(text)) => text.clone(),
            _ => String::from_utf8_lossy(&self.raw_body).into_owned(),
        }
    }

    /// Decode the body into a typed value.
    ///
    /// Uses the already parsed JSON value when there is one, otherwise parses
    /// the raw bytes.
    ///
    /// # Errors
    ///
    /// Returns `Error::Json` if the body does not match `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, Error> {
        match &self.body {
            Some(Body::Json(value)) => T::deserialize(value).map_err(Error::Json),
            _ => serde_json::from_slice(&self.raw_body).map_err(Error::Json),
        }
    }
}

fn header_str(headers: &HeaderMap, name: http::header::HeaderName) -> Option<&str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn interpret(kind: BodyKind, bytes: &Bytes, log_level: LogLevel) -> Body {
    if kind == BodyKind::Binary {
        return Body::Binary(bytes.clone());
    }

    let text = String::from_utf8_lossy(bytes).into_owned();
    match kind {
        BodyKind::Json => match serde_json::from_str(&text) {
            Ok(value) => Body::Json(value),
            Err(e) => {
                if log_level.allows(LogLevel::Warn) {
                    tracing::warn!(error = %e, "failed to parse JSON body; keeping it as text");
                }
                Body::Text(text)
            }
        },
        BodyKind::Form => match serde_urlencoded::from_str(&text) {
            Ok(form) => Body::Form(form),
            Err(e) => {
                if log_level.allows(LogLevel::Warn) {
                    tracing::warn!(error = %e, "failed to parse form body; keeping it as text");
                }
                Body::Text(text)
            }
        },
        BodyKind::Text | BodyKind::Binary => Body::Text(text),
    }
}
