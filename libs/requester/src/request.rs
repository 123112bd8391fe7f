use crate::error::{Error, InvalidUriKind};
use crate::options::{MergedOptions, RequestBody};
use bytes::Bytes;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use http::Request;
use http_body_util::Full;
use url::Url;

/// A request ready for the wire: absolute URL, final headers, encoded body.
///
/// Produced by [`shape_request`]; immutable once handed to the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRequest {
    pub method: http::Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl ResolvedRequest {
    /// Convert into the `http::Request` the transport consumes.
    ///
    /// # Errors
    ///
    /// Returns `Error::RequestBuild` if the URL is not a valid `http::Uri`.
    pub fn into_http_request(self) -> Result<Request<Full<Bytes>>, Error> {
        let mut request = Request::builder()
            .method(self.method)
            .uri(self.url.as_str())
            .body(Full::new(self.body.unwrap_or_default()))?;
        *request.headers_mut() = self.headers;
        Ok(request)
    }
}

/// Turn a URL and merged options into a [`ResolvedRequest`].
///
/// - Relative URLs are resolved against `base_url` using standard
///   reference resolution; without a base the URL must be absolute.
/// - Structured bodies are encoded as JSON with `content-type` and an exact
///   byte `content-length`.
/// - Text and byte bodies are passed through untouched.
///
/// # Errors
///
/// - `Error::InvalidUri` / `Error::InvalidScheme` for unusable URLs
/// - `Error::InvalidHeaderName` / `Error::InvalidHeaderValue` for bad headers
///
/// Values that cannot become JSON are rejected earlier, by
/// [`RequestBody::json`] and [`RequestOptions::json`](crate::RequestOptions::json).
pub fn shape_request(url: &str, options: &MergedOptions) -> Result<ResolvedRequest, Error> {
    let url = resolve_url(url, options.base_url.as_deref())?;

    let mut headers = HeaderMap::with_capacity(options.headers.len() + 2);
    for (name, value) in &options.headers {
        let name = HeaderName::try_from(name.as_str())?;
        let value = HeaderValue::try_from(value.as_str())?;
        headers.insert(name, value);
    }

    let body = match &options.body {
        None => None,
        Some(RequestBody::Bytes(bytes)) => Some(bytes.clone()),
        Some(RequestBody::Text(text)) => Some(Bytes::from(text.clone())),
        Some(RequestBody::Json(value)) => {
            // A `Value` always has string keys, so encoding it cannot fail
            let encoded = value.to_string().into_bytes();
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            headers.insert(CONTENT_LENGTH, HeaderValue::from(encoded.len()));
            Some(Bytes::from(encoded))
        }
    };

    Ok(ResolvedRequest {
        method: options.method.clone(),
        url,
        headers,
        body,
    })
}

/// Resolve `url` against an optional base and validate the scheme.
fn resolve_url(url: &str, base_url: Option<&str>) -> Result<Url, Error> {
    let resolved = match base_url {
        Some(base) => {
            let base = Url::parse(base).map_err(|e| Error::InvalidUri {
                url: base.to_owned(),
                kind: InvalidUriKind::InvalidBase,
                reason: e.to_string(),
            })?;
            base.join(url).map_err(|e| Error::InvalidUri {
                url: url.to_owned(),
                kind: InvalidUriKind::ParseError,
                reason: e.to_string(),
            })?
        }
        None => Url::parse(url).map_err(|e| {
            let kind = if e == url::ParseError::RelativeUrlWithoutBase {
                InvalidUriKind::RelativeWithoutBase
            } else {
                InvalidUriKind::ParseError
            };
            Error::InvalidUri {
                url: url.to_owned(),
                kind,
                reason: e.to_string(),
            }
        })?,
    };

    match resolved.scheme() {
        "http" | "https" => Ok(resolved),
        scheme => Err(Error::InvalidScheme {
            scheme: scheme.to_owned(),
            reason: "only http:// and https:// schemes are supported".to_owned(),
        }),
    }
}
