#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![warn(warnings)]

//! Convenience HTTP client
//!
//! A thin layer over a hyper-based transport that shapes both ends of an
//! exchange:
//! - Per-verb shortcuts (`get`, `post`, `put`, `delete`)
//! - Structured request bodies serialized to JSON with exact `content-length`
//! - Response bodies decompressed (gzip, brotli, deflate) and parsed by
//!   `content-type` into text, JSON, form fields, or raw bytes
//! - Statuses outside `[200, 400)` returned as [`Error::Http`] unless
//!   `should_throw` is disabled
//! - Automatic TLS via rustls for `https://` URLs
//!
//! # Example
//!
//! ```ignore
//! use requester::{Body, Client, RequestOptions};
//! use serde_json::json;
//! use std::time::Duration;
//!
//! let client = Client::builder()
//!     .base_url("https://api.example.com/")
//!     .timeout(Duration::from_secs(10))
//!     .build()?;
//!
//! let resp = client
//!     .post("orders", RequestOptions::new().body(json!({"item": "coffee"})))
//!     .await?;
//!
//! if let Some(Body::Json(order)) = &resp.body {
//!     println!("created {}", order["id"]);
//! }
//!
//! // Inspect failures instead of raising them
//! let resp = client
//!     .get("orders/404", RequestOptions::new().should_throw(false))
//!     .await?;
//! assert!(!resp.ok);
//! ```

mod builder;
mod client;
mod config;
mod decode;
mod error;
mod options;
mod request;
mod response;
mod transport;

pub use builder::ClientBuilder;
pub use client::Client;
pub use config::{ClientConfig, DEFAULT_USER_AGENT, LogLevel};
pub use decode::{ContentCoding, decode_body, decode_body_limited};
pub use error::{Error, HttpError, InvalidUriKind};
pub use options::{MergedOptions, RequestBody, RequestOptions};
pub use request::{ResolvedRequest, shape_request};
pub use response::{Body, RawResponse, RequestInfo, ShapedResponse, is_ok_status};
pub use transport::{TransportBody, TransportService};
