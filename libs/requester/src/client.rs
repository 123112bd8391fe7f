use crate::builder::ClientBuilder;
use crate::config::{ClientConfig, LogLevel};
use crate::error::{Error, HttpError};
use crate::options::{MergedOptions, RequestOptions};
use crate::request::shape_request;
use crate::response::{RequestInfo, ShapedResponse};
use crate::transport::{self, BufferedService};
use std::sync::Arc;
use tracing::Instrument;
use url::Url;

/// Strip query, fragment and credentials before a URL goes into a span.
fn redacted_url(url: &Url) -> String {
    let mut url = url.clone();
    url.set_query(None);
    url.set_fragment(None);
    let _ = url.set_password(None);
    let _ = url.set_username("");
    url.into()
}

/// Convenience HTTP client
///
/// Every call merges the client's defaults with call-time
/// [`RequestOptions`], shapes the request, sends it, accumulates and decodes
/// the body, and returns a [`ShapedResponse`].
///
/// With `should_throw` (the default) any status outside `[200, 400)` is
/// returned as [`Error::Http`], which still carries the full response.
///
/// # Thread Safety
///
/// `Client` is `Clone + Send + Sync`. Cloning is cheap (internal channel
/// clone plus an `Arc`). Calls never mutate the client's defaults.
///
/// # Example
///
/// ```ignore
/// let client = Client::builder()
///     .base_url("https://api.example.com/")
///     .header("authorization", "Bearer token")
///     .build()?;
///
/// let resp = client.get("users/1", RequestOptions::new()).await?;
/// let user: User = resp.json()?;
///
/// let resp = client
///     .post("users", RequestOptions::new().json(&NewUser { name: "Alice" })?)
///     .await?;
/// assert_eq!(resp.status, StatusCode::CREATED);
/// ```
#[derive(Clone)]
pub struct Client {
    pub(crate) service: BufferedService,
    pub(crate) config: Arc<ClientConfig>,
}

impl Client {
    /// Create a client with default configuration
    ///
    /// # Errors
    /// Returns an error if TLS initialization fails
    pub fn new() -> Result<Self, Error> {
        ClientBuilder::new().build()
    }

    /// Create a client from a configuration
    ///
    /// # Errors
    /// Returns an error if TLS initialization fails or the configuration is
    /// invalid (bad user agent or base URL)
    pub fn with_config(config: ClientConfig) -> Result<Self, Error> {
        ClientBuilder::with_config(config).build()
    }

    /// Create a builder for configuring the client
    #[must_use]
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Instance defaults applied to every call
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Perform a request with the method from `options` (GET if unset)
    ///
    /// Each call runs inside an `outgoing_http` span carrying the method,
    /// the resolved URL without query or credentials, the merged
    /// `log_level` and `should_throw`, and once known the status, `ok` and
    /// decoded body length.
    ///
    /// # Errors
    ///
    /// - request construction errors (`InvalidUri`, `InvalidScheme`,
    ///   `InvalidHeaderName`, `InvalidHeaderValue`)
    /// - `Timeout` if the whole exchange exceeds the merged timeout
    /// - `Transport` / `ServiceClosed` for connection-level failures
    /// - `BodyTooLarge` if the received or decoded body exceeds `max_body_size`
    /// - `Http` if `should_throw` is set and the status is not in `[200, 400)`
    pub async fn request(
        &self,
        url: &str,
        options: RequestOptions,
    ) -> Result<ShapedResponse, Error> {
        let merged = MergedOptions::merge(&self.config, options);
        let debug = merged.log_level.allows(LogLevel::Debug);

        let span = tracing::info_span!(
            "outgoing_http",
            http.method = %merged.method,
            http.url = tracing::field::Empty,
            log_level = ?merged.log_level,
            should_throw = merged.should_throw,
            http.status_code = tracing::field::Empty,
            ok = tracing::field::Empty,
            body_len = tracing::field::Empty,
            error = tracing::field::Empty,
        );

        let result = self
            .send(url, merged, &span)
            .instrument(span.clone())
            .await;

        if let Err(err) = &result {
            span.record("error", true);
            if debug {
                span.in_scope(|| tracing::debug!(error = %err, "request failed"));
            }
        }
        result
    }

    async fn send(
        &self,
        url: &str,
        merged: MergedOptions,
        span: &tracing::Span,
    ) -> Result<ShapedResponse, Error> {
        let resolved = shape_request(url, &merged)?;
        span.record(
            "http.url",
            tracing::field::display(redacted_url(&resolved.url)),
        );
        let debug = merged.log_level.allows(LogLevel::Debug);

        if debug {
            tracing::debug!(
                headers = resolved.headers.len(),
                body_len = resolved.body.as_ref().map_or(0, bytes::Bytes::len),
                "request built"
            );
        }

        let final_url = resolved.url.to_string();
        let timeout = merged.timeout;
        let raw = tokio::time::timeout(
            timeout,
            transport::exchange(&self.service, resolved, self.config.max_body_size),
        )
        .await
        .map_err(|_| Error::Timeout(timeout))??;
        span.record("http.status_code", raw.status.as_u16());

        let response = ShapedResponse::from_raw_limited(
            &raw,
            RequestInfo {
                url: final_url,
                options: merged,
            },
            self.config.max_body_size,
        )?;
        span.record("ok", response.ok);
        span.record("body_len", response.raw_body.len());

        if debug {
            tracing::debug!("response received");
        }

        if response.request.options.should_throw && !response.ok {
            return Err(HttpError::new(response).into());
        }
        Ok(response)
    }

    /// GET `url`; any method in `options` is replaced
    ///
    /// # Errors
    /// See [`Client::request`]
    pub async fn get(&self, url: &str, options: RequestOptions) -> Result<ShapedResponse, Error> {
        self.request(url, options.method(http::Method::GET)).await
    }

    /// POST `url`; any method in `options` is replaced
    ///
    /// # Errors
    /// See [`Client::request`]
    pub async fn post(&self, url: &str, options: RequestOptions) -> Result<ShapedResponse, Error> {
        self.request(url, options.method(http::Method::POST)).await
    }

    /// PUT `url`; any method in `options` is replaced
    ///
    /// # Errors
    /// See [`Client::request`]
    pub async fn put(&self, url: &str, options: RequestOptions) -> Result<ShapedResponse, Error> {
        self.request(url, options.method(http::Method::PUT)).await
    }

    /// DELETE `url`; any method in `options` is replaced
    ///
    /// # Errors
    /// See [`Client::request`]
    pub async fn delete(
        &self,
        url: &str,
        options: RequestOptions,
    ) -> Result<ShapedResponse, Error> {
        self.request(url, options.method(http::Method::DELETE)).await
    }
}
