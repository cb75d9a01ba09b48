#![forbid(unsafe_code)]
//! An async HTTP/1.1 client with per-host connection pooling, DNS caching,
//! and TLS support, built on top of tokio.
//!
//! The entry point is [`Session`]: it owns a registry of per-host [`Pool`]s
//! and exposes [`Session::request`] plus shorthand methods for the common
//! verbs. For a single one-shot call without building a `Session`, use the
//! module-level [`get`], [`post`], and friends.

pub mod auth;
pub mod codec;
pub mod config;
pub mod connection;
pub mod dns;
pub mod error;
pub mod headers;
pub mod pool;
pub mod response;
pub mod session;
pub mod tls;

pub use auth::{Auth, BasicAuth, BearerAuth};
pub use config::{load_from_path, ClientConfig};
pub use error::{HttpClientError, Result};
pub use headers::HeaderMap;
pub use pool::Pool;
pub use response::Response;
pub use session::{Body, Method, RequestOptions, Session, SessionBuilder};

/// One-shot GET against a freshly built, default-configured `Session`.
///
/// Building a new `Session` per call discards any pooled connection after
/// one request; prefer a shared `Session` for repeated calls to the same
/// host.
pub async fn get(url: &str) -> Result<Response> {
    Session::new().get(url, RequestOptions::new()).await
}

pub async fn post(url: &str, opts: RequestOptions) -> Result<Response> {
    Session::new().post(url, opts).await
}

pub async fn put(url: &str, opts: RequestOptions) -> Result<Response> {
    Session::new().put(url, opts).await
}

pub async fn delete(url: &str) -> Result<Response> {
    Session::new().delete(url, RequestOptions::new()).await
}

pub async fn patch(url: &str, opts: RequestOptions) -> Result<Response> {
    Session::new().patch(url, opts).await
}

pub async fn head(url: &str) -> Result<Response> {
    Session::new().head(url, RequestOptions::new()).await
}

pub async fn options(url: &str) -> Result<Response> {
    Session::new().options(url, RequestOptions::new()).await
}
