use crate::client::Client;
use crate::config::{ClientConfig, LogLevel};
use crate::error::{Error, InvalidUriKind};
use crate::transport::{self, TransportService};
use http::header::HeaderValue;
use std::sync::Arc;
use std::time::Duration;

/// Builder for constructing a [`Client`].
pub struct ClientBuilder {
    config: ClientConfig,
    transport: Option<TransportService>,
    transport_layer: Option<Box<dyn FnOnce(TransportService) -> TransportService + Send>>,
}

impl ClientBuilder {
    /// Create a new builder with default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(ClientConfig::default())
    }

    /// Create a builder with a specific configuration
    #[must_use]
    pub fn with_config(config: ClientConfig) -> Self {
        Self {
            config,
            transport: None,
            transport_layer: None,
        }
    }

    /// Add a default header sent with every request
    ///
    /// The name is stored lower-cased; call-time headers with the same name
    /// win.
    #[must_use]
    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.config
            .headers
            .insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Resolve relative request URLs against this base
    #[must_use]
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config.base_url = Some(base_url.into());
        self
    }

    /// Set the default timeout
    ///
    /// Covers the whole exchange: connecting, waiting for headers, and
    /// reading the body.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Whether statuses outside `[200, 400)` become [`Error::Http`]
    #[must_use]
    pub fn should_throw(mut self, should_throw: bool) -> Self {
        self.config.should_throw = should_throw;
        self
    }

    /// Set the default diagnostic verbosity
    #[must_use]
    pub fn log_level(mut self, log_level: LogLevel) -> Self {
        self.config.log_level = log_level;
        self
    }

    /// Set the User-Agent header
    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Set the maximum response body size in bytes
    ///
    /// Applies to the bytes received and again to the body after content
    /// decoding, so a small compressed payload cannot inflate past it.
    #[must_use]
    pub fn max_body_size(mut self, size: usize) -> Self {
        self.config.max_body_size = size;
        self
    }

    /// Whether to send the default `accept-encoding: gzip, deflate, br`
    ///
    /// Compressed responses are still decoded when this is off.
    #[must_use]
    pub fn advertise_compression(mut self, enabled: bool) -> Self {
        self.config.advertise_compression = enabled;
        self
    }

    /// Set the buffer capacity for concurrent request handling
    ///
    /// **Note**: A capacity of 0 is invalid and will be clamped to 1.
    #[must_use]
    pub fn buffer_capacity(mut self, capacity: usize) -> Self {
        // Clamp to at least 1 - tower::Buffer panics with capacity=0
        self.config.buffer_capacity = capacity.max(1);
        self
    }

    /// Replace the hyper transport with another service
    ///
    /// Useful for test doubles and custom connection stacks. Errors returned
    /// by the service surface unchanged from the client.
    #[must_use]
    pub fn transport(mut self, transport: TransportService) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Wrap the transport with an extra layer (e.g. auth or metrics).
    ///
    /// Stack position: `Buffer → **this layer** → transport`
    ///
    /// Only one layer can be set; a second call replaces the first.
    #[must_use]
    pub fn with_transport_layer(
        mut self,
        wrap: impl FnOnce(TransportService) -> TransportService + Send + 'static,
    ) -> Self {
        self.transport_layer = Some(Box::new(wrap));
        self
    }

    /// Build the client
    ///
    /// Must be called inside a Tokio runtime: the buffer spawns its worker
    /// task here.
    ///
    /// # Errors
    /// Returns an error if TLS initialization fails, the user agent is not a
    /// valid header value, or the base URL does not parse
    pub fn build(self) -> Result<Client, Error> {
        HeaderValue::from_str(&self.config.user_agent)?;

        if let Some(base_url) = &self.config.base_url {
            url::Url::parse(base_url).map_err(|e| Error::InvalidUri {
                url: base_url.clone(),
                kind: InvalidUriKind::InvalidBase,
                reason: e.to_string(),
            })?;
        }

        let mut service = match self.transport {
            Some(custom) => custom,
            None => transport::hyper_transport()?,
        };

        if let Some(wrap) = self.transport_layer {
            service = wrap(service);
        }

        let buffered = transport::buffered(service, self.config.buffer_capacity);

        Ok(Client {
            service: buffered,
            config: Arc::new(self.config),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::config::DEFAULT_USER_AGENT;
    use crate::options::RequestOptions;
    use bytes::Bytes;
    use http::{Request, Response};
    use http_body_util::{BodyExt, Full};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;

    #[test]
    fn test_builder_default() {
        let builder = ClientBuilder::new();
        assert_eq!(builder.config.timeout, Duration::from_secs(60));
        assert_eq!(builder.config.user_agent, DEFAULT_USER_AGENT);
        assert!(builder.config.should_throw);
        assert_eq!(builder.config.buffer_capacity, 1024);
        assert!(builder.transport.is_none());
    }

    #[test]
    fn test_builder_setters() {
        let builder = ClientBuilder::new()
            .header("X-Api-Key", "k")
            .base_url("http://localhost/")
            .timeout(Duration::from_secs(5))
            .should_throw(false)
            .log_level(LogLevel::Debug)
            .user_agent("custom/1.0")
            .max_body_size(42)
            .advertise_compression(false);

        assert_eq!(
            builder.config.headers.get("x-api-key").map(String::as_str),
            Some("k")
        );
        assert_eq!(builder.config.base_url.as_deref(), Some("http://localhost/"));
        assert_eq!(builder.config.timeout, Duration::from_secs(5));
        assert!(!builder.config.should_throw);
        assert_eq!(builder.config.log_level, LogLevel::Debug);
        assert_eq!(builder.config.user_agent, "custom/1.0");
        assert_eq!(builder.config.max_body_size, 42);
        assert!(!builder.config.advertise_compression);
    }

    #[test]
    fn test_builder_buffer_capacity_zero_clamped() {
        let builder = ClientBuilder::new().buffer_capacity(0);
        assert_eq!(builder.config.buffer_capacity, 1);
    }

    #[tokio::test]
    async fn test_builder_buffer_capacity_zero_in_config_clamped() {
        let config = ClientConfig {
            buffer_capacity: 0,
            ..Default::default()
        };
        let result = ClientBuilder::with_config(config).build();
        assert!(result.is_ok(), "build() should succeed with capacity clamped to 1");
    }

    #[tokio::test]
    async fn test_builder_build() {
        let client = ClientBuilder::new().build();
        assert!(client.is_ok());
    }

    #[tokio::test]
    async fn test_builder_build_invalid_user_agent() {
        let result = ClientBuilder::new().user_agent("invalid\x00agent").build();
        assert!(matches!(result, Err(Error::InvalidHeaderValue(_))));
    }

    #[tokio::test]
    async fn test_builder_build_invalid_base_url() {
        let result = ClientBuilder::new().base_url("not a url").build();
        assert!(matches!(
            result,
            Err(Error::InvalidUri {
                kind: InvalidUriKind::InvalidBase,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_builder_with_transport_layer() {
        static CALLS: AtomicUsize = AtomicUsize::new(0);

        let transport = tower::service_fn(|req: Request<Full<Bytes>>| async move {
            assert_eq!(req.headers()["x-layer"], "applied");
            let body = Full::new(Bytes::from_static(b"ok"))
                .map_err(|never| match never {})
                .boxed();
            Ok::<_, Error>(Response::new(body))
        });

        let client = ClientBuilder::new()
            .transport(transport.boxed_clone())
            .with_transport_layer(|svc| {
                svc.map_request(|mut req: Request<Full<Bytes>>| {
                    CALLS.fetch_add(1, Ordering::SeqCst);
                    req.headers_mut()
                        .insert("x-layer", HeaderValue::from_static("applied"));
                    req
                })
                .boxed_clone()
            })
            .build()
            .unwrap();

        let resp = client
            .get("http://localhost/layered", RequestOptions::new())
            .await
            .unwrap();

        assert_eq!(resp.text(), "ok");
        assert_eq!(CALLS.load(Ordering::SeqCst), 1);
    }
}
