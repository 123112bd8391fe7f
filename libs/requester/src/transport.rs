//! Wire transport: a hyper client over rustls behind a tower buffer.
//!
//! The scheme of each request picks plaintext or TLS. The transport only
//! moves bytes; all shaping happens before and after it.

use crate::error::Error;
use crate::request::ResolvedRequest;
use crate::response::RawResponse;
use bytes::Bytes;
use http::{Request, Response};
use http_body_util::{BodyExt, Full};
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tower::buffer::Buffer;
use tower::util::BoxCloneService;
use tower::{Service, ServiceExt};

/// Type alias for the boxed response body yielded by the transport.
pub type TransportBody =
    http_body_util::combinators::BoxBody<Bytes, Box<dyn std::error::Error + Send + Sync>>;

/// Type-erased transport service, the seam for custom or test transports.
pub type TransportService =
    BoxCloneService<Request<Full<Bytes>>, Response<TransportBody>, Error>;

/// Type alias for the future type of the inner service
pub type ServiceFuture =
    Pin<Box<dyn Future<Output = Result<Response<TransportBody>, Error>> + Send>>;

/// Type alias for the buffered service shared by all clones of a client
pub type BufferedService = Buffer<Request<Full<Bytes>>, ServiceFuture>;

/// Build the default hyper transport.
///
/// # Errors
///
/// Returns `Error::Tls` if the TLS connector cannot be initialized.
pub fn hyper_transport() -> Result<TransportService, Error> {
    let https = build_https_connector()?;
    let hyper_client = Client::builder(TokioExecutor::new()).build::<_, Full<Bytes>>(https);

    let service = hyper_client
        .map_response(|response| {
            let (parts, body) = response.into_parts();
            let boxed: TransportBody = body.map_err(Into::into).boxed();
            Response::from_parts(parts, boxed)
        })
        .map_err(Error::from);

    Ok(service.boxed_clone())
}

/// Put a transport behind a buffer.
///
/// The buffer spawns its worker on the current Tokio runtime and gives the
/// client `Clone + Send + Sync` without locking.
pub fn buffered(transport: TransportService, capacity: usize) -> BufferedService {
    // Clamp to at least 1 - tower::Buffer panics with capacity=0
    Buffer::new(transport, capacity.max(1))
}

/// Send a resolved request and accumulate the full response body.
///
/// # Errors
///
/// - `Error::Transport` for connection-level failures or a broken body stream
/// - `Error::ServiceClosed` if the buffer worker is gone
/// - `Error::BodyTooLarge` if the body exceeds `max_body_size`
pub async fn exchange(
    service: &BufferedService,
    request: ResolvedRequest,
    max_body_size: usize,
) -> Result<RawResponse, Error> {
    let request = request.into_http_request()?;

    let mut service = service.clone();
    let response = service
        .ready()
        .await
        .map_err(map_buffer_error)?
        .call(request)
        .await
        .map_err(map_buffer_error)?;

    let (parts, body) = response.into_parts();
    // hyper only records the reason phrase when it differs from the canonical one
    let reason = parts
        .extensions
        .get::<hyper::ext::ReasonPhrase>()
        .and_then(|reason| std::str::from_utf8(reason.as_bytes()).ok())
        .map(str::to_owned);

    let body = read_body_limited(body, max_body_size).await?;
    let mut raw = RawResponse::new(parts.status, parts.headers, body);
    raw.reason = reason;
    Ok(raw)
}

/// Collect body chunks in arrival order, enforcing the byte limit.
///
/// Trailers are ignored.
pub async fn read_body_limited<B>(body: B, limit: usize) -> Result<Bytes, Error>
where
    B: http_body::Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let mut collected = Vec::new();
    let mut body = std::pin::pin!(body);

    while let Some(frame) = body.frame().await {
        let frame = frame.map_err(|e| Error::Transport(e.into()))?;
        if let Some(chunk) = frame.data_ref() {
            if collected.len() + chunk.len() > limit {
                return Err(Error::BodyTooLarge {
                    limit,
                    actual: collected.len() + chunk.len(),
                });
            }
            collected.extend_from_slice(chunk);
        }
    }

    Ok(Bytes::from(collected))
}

/// Map buffer errors to `Error`
///
/// Buffer wraps inner service errors in a box, or reports `Closed` if the
/// worker has shut down.
pub fn map_buffer_error(err: tower::BoxError) -> Error {
    match err.downcast::<Error>() {
        Ok(inner) => *inner,
        Err(err) => {
            tracing::error!(
                error = %err,
                "buffer worker closed unexpectedly; service unavailable"
            );
            Error::ServiceClosed
        }
    }
}

/// Get the crypto provider for TLS connections.
///
/// Uses the process-wide default provider when one is installed, otherwise
/// a fresh aws-lc-rs provider without installing it globally.
fn crypto_provider() -> Arc<rustls::crypto::CryptoProvider> {
    rustls::crypto::CryptoProvider::get_default()
        .cloned()
        .unwrap_or_else(|| Arc::new(rustls::crypto::aws_lc_rs::default_provider()))
}

/// HTTPS-or-HTTP connector with Mozilla roots and ALPN for h2 and http/1.1.
fn build_https_connector() -> Result<HttpsConnector<HttpConnector>, Error> {
    let connector = hyper_rustls::HttpsConnectorBuilder::new()
        .with_provider_and_webpki_roots(crypto_provider())
        .map_err(|e| Error::Tls(Box::new(e)))?
        .https_or_http()
        .enable_all_versions()
        .build();
    Ok(connector)
}
