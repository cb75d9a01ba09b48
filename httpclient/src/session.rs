//! Session: registry of per-host pools, default policy, and the
//! `request()` operation that binds the wire codec, connection pool, and
//! response construction together.

use crate::auth::Auth;
use crate::codec;
use crate::error::{HttpClientError, Result};
use crate::headers::HeaderMap;
use crate::pool::{Pool, PoolKey};
use crate::response::Response;
use crate::tls::TlsContexts;
use futures_util::future::join_all;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug_span, warn};
use url::Url;

const REDIRECT_STATUSES: [u16; 5] = [301, 302, 303, 307, 308];
const DEFAULT_MAX_REDIRECTS: u32 = 10;
const DEFAULT_PER_HOST_LIMIT: usize = 30;
const DEFAULT_CONNECTOR_LIMIT: usize = 100;
const DEFAULT_MAX_IDLE_AGE: Duration = Duration::from_secs(90);
const DEFAULT_USER_AGENT: &str = concat!("httpclient/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Patch => "PATCH",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
        }
    }
}

#[derive(Debug, Clone)]
pub enum Body {
    Bytes(Vec<u8>),
    Text(String),
    Form(Vec<(String, String)>),
}

#[derive(Default, Clone)]
pub struct RequestOptions {
    pub headers: Option<HeaderMap>,
    pub params: Option<Vec<(String, String)>>,
    pub data: Option<Body>,
    pub json: Option<serde_json::Value>,
    pub timeout: Option<Duration>,
    pub verify: Option<bool>,
    pub allow_redirects: Option<bool>,
    pub max_redirects: Option<u32>,
    pub auth: Option<Arc<dyn Auth>>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = Some(headers);
        self
    }

    pub fn params(mut self, params: Vec<(String, String)>) -> Self {
        self.params = Some(params);
        self
    }

    pub fn data(mut self, data: Body) -> Self {
        self.data = Some(data);
        self
    }

    pub fn json(mut self, value: serde_json::Value) -> Self {
        self.json = Some(value);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn verify(mut self, verify: bool) -> Self {
        self.verify = Some(verify);
        self
    }

    pub fn allow_redirects(mut self, allow: bool) -> Self {
        self.allow_redirects = Some(allow);
        self
    }

    pub fn max_redirects(mut self, max: u32) -> Self {
        self.max_redirects = Some(max);
        self
    }

    pub fn auth(mut self, auth: impl Auth + 'static) -> Self {
        self.auth = Some(Arc::new(auth));
        self
    }
}

pub struct SessionBuilder {
    headers: HeaderMap,
    timeout: Option<Duration>,
    verify: bool,
    auth: Option<Arc<dyn Auth>>,
    connector_limit: usize,
    connector_limit_per_host: usize,
    max_idle_age: Duration,
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self {
            headers: HeaderMap::new(),
            timeout: None,
            verify: true,
            auth: None,
            connector_limit: DEFAULT_CONNECTOR_LIMIT,
            connector_limit_per_host: DEFAULT_PER_HOST_LIMIT,
            max_idle_age: DEFAULT_MAX_IDLE_AGE,
        }
    }
}

impl SessionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a builder from a loaded [`crate::config::ClientConfig`],
    /// leaving room for further overrides before `build()`.
    pub fn from_config(config: &crate::config::ClientConfig) -> Self {
        let mut headers = HeaderMap::new();
        for (name, value) in &config.default_headers {
            headers.set(name.clone(), value.clone());
        }
        Self {
            headers,
            timeout: Some(config.timeout()),
            verify: config.verify,
            auth: None,
            connector_limit: config.connector_limit,
            connector_limit_per_host: config.connector_limit_per_host,
            max_idle_age: DEFAULT_MAX_IDLE_AGE,
        }
    }

    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    pub fn auth(mut self, auth: impl Auth + 'static) -> Self {
        self.auth = Some(Arc::new(auth));
        self
    }

    /// Total connector retention, kept as an idle-retention hint only; it
    /// is not enforced as a hard dispatch limit.
    pub fn connector_limit(mut self, limit: usize) -> Self {
        self.connector_limit = limit;
        self
    }

    pub fn connector_limit_per_host(mut self, limit: usize) -> Self {
        self.connector_limit_per_host = limit;
        self
    }

    pub fn build(self) -> Session {
        Session {
            pools: Mutex::new(HashMap::new()),
            default_headers: self.headers,
            default_timeout: self.timeout,
            verify: self.verify,
            auth: self.auth,
            tls: Arc::new(TlsContexts::new()),
            per_host_limit: self.connector_limit_per_host,
            max_idle_age: self.max_idle_age,
            connector_limit: self.connector_limit,
            closed: AtomicBool::new(false),
        }
    }
}

/// Registry of per-host pools plus default request policy. Owns everything
/// reachable: `Session` owns `Pool`s, `Pool`s own `Connection`s,
/// `Connection`s own socket handles. `Response` never references `Session`.
pub struct Session {
    pools: Mutex<HashMap<PoolKey, Arc<Pool>>>,
    default_headers: HeaderMap,
    default_timeout: Option<Duration>,
    verify: bool,
    auth: Option<Arc<dyn Auth>>,
    tls: Arc<TlsContexts>,
    per_host_limit: usize,
    max_idle_age: Duration,
    connector_limit: usize,
    closed: AtomicBool,
}

impl Session {
    pub fn new() -> Self {
        SessionBuilder::default().build()
    }

    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    /// Total connector retention hint this session was built with; recorded
    /// but never enforced as a hard dispatch limit (see `connector_limit_per_host`,
    /// which `Pool::max_size` actually enforces).
    pub fn connector_limit(&self) -> usize {
        self.connector_limit
    }

    pub async fn request(&self, method: Method, url: &str, opts: RequestOptions) -> Result<Response> {
        if self.closed.load(Ordering::Acquire) {
            return Err(HttpClientError::SessionClosed);
        }
        let max_redirects = opts.max_redirects.unwrap_or(DEFAULT_MAX_REDIRECTS);
        self.dispatch(method, url.to_string(), opts, max_redirects, Vec::new()).await
    }

    pub async fn get(&self, url: &str, opts: RequestOptions) -> Result<Response> {
        self.request(Method::Get, url, opts).await
    }

    pub async fn post(&self, url: &str, opts: RequestOptions) -> Result<Response> {
        self.request(Method::Post, url, opts).await
    }

    pub async fn put(&self, url: &str, opts: RequestOptions) -> Result<Response> {
        self.request(Method::Put, url, opts).await
    }

    pub async fn delete(&self, url: &str, opts: RequestOptions) -> Result<Response> {
        self.request(Method::Delete, url, opts).await
    }

    pub async fn patch(&self, url: &str, opts: RequestOptions) -> Result<Response> {
        self.request(Method::Patch, url, opts).await
    }

    pub async fn head(&self, url: &str, opts: RequestOptions) -> Result<Response> {
        self.request(Method::Head, url, opts).await
    }

    pub async fn options(&self, url: &str, opts: RequestOptions) -> Result<Response> {
        self.request(Method::Options, url, opts).await
    }

    /// Fan-out helper: dispatches every `(method, url)` pair concurrently
    /// and returns results in the same order they were given.
    pub async fn gather(
        &self,
        requests: Vec<(Method, &str)>,
        opts: RequestOptions,
    ) -> Vec<Result<Response>> {
        let futures = requests
            .into_iter()
            .map(|(method, url)| self.request(method, url, opts.clone()));
        join_all(futures).await
    }

    /// GET fan-out over a list of URLs.
    pub async fn bulk_get(&self, urls: &[&str]) -> Vec<Result<Response>> {
        let futures = urls.iter().map(|url| self.get(url, RequestOptions::new()));
        join_all(futures).await
    }

    /// Idempotent teardown: closes every pool and marks the session closed.
    pub async fn close(&self) {
        self.closed.store(true, Ordering::Release);
        let pools: Vec<Arc<Pool>> = {
            let mut guard = self.pools.lock().expect("session pools mutex poisoned");
            guard.drain().map(|(_, pool)| pool).collect()
        };
        for pool in pools {
            pool.close().await;
        }
    }

    fn get_or_create_pool(&self, key: PoolKey) -> Arc<Pool> {
        let mut pools = self.pools.lock().expect("session pools mutex poisoned");
        pools
            .entry(key.clone())
            .or_insert_with(|| {
                Arc::new(Pool::new(key, self.per_host_limit, self.max_idle_age, self.tls.clone()))
            })
            .clone()
    }

    fn dispatch<'a>(
        &'a self,
        method: Method,
        url: String,
        opts: RequestOptions,
        hops_remaining: u32,
        mut history: Vec<Response>,
    ) -> Pin<Box<dyn Future<Output = Result<Response>> + Send + 'a>> {
        Box::pin(async move {
            let start = Instant::now();
            let parsed = Url::parse(&url)?;
            let is_tls = parsed.scheme() == "https";
            let host = parsed
                .host_str()
                .ok_or_else(|| HttpClientError::ProtocolError(format!("missing host in {url}")))?
                .to_string();
            let port = parsed.port_or_known_default().unwrap_or(if is_tls { 443 } else { 80 });

            let mut target = parsed.path().to_string();
            if let Some(query) = parsed.query() {
                target.push('?');
                target.push_str(query);
            }
            if let Some(params) = &opts.params {
                target.push(if target.contains('?') { '&' } else { '?' });
                target.push_str(
                    &url::form_urlencoded::Serializer::new(String::new())
                        .extend_pairs(params)
                        .finish(),
                );
            }

            let verify = opts.verify.unwrap_or(self.verify);
            let mut headers = self.default_headers.merged_with(
                opts.headers.as_ref().unwrap_or(&HeaderMap::new()),
            );
            let default_port = if is_tls { 443 } else { 80 };
            headers.set_if_absent(
                "Host",
                if port == default_port { host.clone() } else { format!("{host}:{port}") },
            );
            headers.set_if_absent("Connection", "keep-alive");
            headers.set_if_absent("Accept", "*/*");
            headers.set_if_absent("Accept-Encoding", "identity");
            headers.set_if_absent("User-Agent", DEFAULT_USER_AGENT);

            if let Some(auth) = opts.auth.as_ref().or(self.auth.as_ref()) {
                auth.apply(&mut headers);
            }

            let body: Option<Vec<u8>> = if let Some(json) = &opts.json {
                headers.set("Content-Type", "application/json");
                Some(serde_json::to_vec(json).map_err(|e| {
                    HttpClientError::ProtocolError(format!("failed to serialize JSON body: {e}"))
                })?)
            } else if let Some(data) = &opts.data {
                match data {
                    Body::Bytes(bytes) => Some(bytes.clone()),
                    Body::Text(text) => Some(text.as_bytes().to_vec()),
                    Body::Form(pairs) => {
                        headers.set("Content-Type", "application/x-www-form-urlencoded");
                        Some(
                            url::form_urlencoded::Serializer::new(String::new())
                                .extend_pairs(pairs)
                                .finish()
                                .into_bytes(),
                        )
                    }
                }
            } else {
                None
            };
            if let Some(body) = &body {
                headers.set("Content-Length", body.len().to_string());
            }

            let key = PoolKey::new(&host, port, is_tls);
            let pool = self.get_or_create_pool(key);
            let timeout = opts.timeout.or(self.default_timeout);

            let span = debug_span!("request", method = method.as_str(), host = %host, port);
            let _enter = span.enter();

            let mut conn = pool.acquire(timeout, verify).await?;

            let request_bytes = codec::build_request(method.as_str(), &target, &headers, body.as_deref());
            if let Err(e) = conn.write_request(&request_bytes).await {
                pool.release(conn, false).await;
                return Err(e);
            }

            let parsed_response = match conn.read_response().await {
                Ok(p) => p,
                Err(e) => {
                    pool.release(conn, false).await;
                    return Err(e);
                }
            };
            let keep_alive = parsed_response.keep_alive;
            pool.release(conn, keep_alive).await;

            let elapsed = start.elapsed();
            let allow_redirects = opts.allow_redirects.unwrap_or(true);
            let status = parsed_response.status;

            if allow_redirects && REDIRECT_STATUSES.contains(&status) && hops_remaining > 0 {
                if let Some(location) = parsed_response.headers.get("Location") {
                    let target_url = match parsed.join(location) {
                        Ok(u) => u,
                        Err(e) => {
                            warn!(%e, location, "redirect Location header is not a valid URL");
                            return Ok(Response::new(
                                status,
                                parsed_response.reason,
                                parsed_response.headers,
                                parsed_response.body,
                                url,
                                elapsed,
                                history,
                            ));
                        }
                    };
                    history.push(Response::new(
                        status,
                        parsed_response.reason,
                        parsed_response.headers,
                        parsed_response.body,
                        url.clone(),
                        elapsed,
                        Vec::new(),
                    ));
                    let next_method = if status == 303 { Method::Get } else { method };
                    let next_opts = RequestOptions {
                        headers: opts.headers.clone(),
                        params: None,
                        data: if next_method == Method::Get { None } else { opts.data.clone() },
                        json: if next_method == Method::Get { None } else { opts.json.clone() },
                        timeout: opts.timeout,
                        verify: opts.verify,
                        allow_redirects: Some(true),
                        max_redirects: Some(hops_remaining - 1),
                        auth: opts.auth.clone(),
                    };
                    return self
                        .dispatch(next_method, target_url.to_string(), next_opts, hops_remaining - 1, history)
                        .await;
                }
            }

            Ok(Response::new(
                status,
                parsed_response.reason,
                parsed_response.headers,
                parsed_response.body,
                url,
                elapsed,
                history,
            ))
        })
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
