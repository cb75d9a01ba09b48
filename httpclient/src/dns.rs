//! Per-host DNS cache with a flat TTL, one instance per connection pool.

use crate::error::{HttpClientError, Result};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Mutex;
use tokio::time::{Duration, Instant};
use tracing::{debug, trace};

/// Source port's resolver has no per-record TTL to clamp; this cache just
/// expires everything 60s after resolution, as written.
const DNS_CACHE_TTL: Duration = Duration::from_secs(60);

struct CacheEntry {
    addrs: Vec<SocketAddr>,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

#[derive(Default)]
pub struct DnsCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl DnsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves `host:port`, serving a cached, unexpired entry when one
    /// exists. On a fresh resolution failure with a stale cached entry
    /// still present, the stale entry is served rather than failing the
    /// request outright.
    pub async fn resolve(&self, host: &str, port: u16) -> Result<Vec<SocketAddr>> {
        if let Ok(addr) = host.parse::<std::net::IpAddr>() {
            return Ok(vec![SocketAddr::new(addr, port)]);
        }

        if let Some(addrs) = self.fresh(host) {
            trace!(host, "dns cache hit");
            return Ok(addrs);
        }

        match tokio::net::lookup_host((host, port)).await {
            Ok(iter) => {
                let addrs: Vec<SocketAddr> = iter.collect();
                if addrs.is_empty() {
                    return Err(HttpClientError::ConnectionFailed(format!(
                        "no addresses resolved for {host}"
                    )));
                }
                self.insert(host, addrs.clone());
                Ok(addrs)
            }
            Err(e) => {
                if let Some(addrs) = self.stale(host) {
                    debug!(host, error = %e, "dns resolution failed, serving stale cache entry");
                    return Ok(addrs);
                }
                Err(HttpClientError::ConnectionFailed(format!(
                    "dns resolution failed for {host}: {e}"
                )))
            }
        }
    }

    fn fresh(&self, host: &str) -> Option<Vec<SocketAddr>> {
        let entries = self.entries.lock().expect("dns cache mutex poisoned");
        entries
            .get(host)
            .filter(|entry| !entry.is_expired())
            .map(|entry| entry.addrs.clone())
    }

    fn stale(&self, host: &str) -> Option<Vec<SocketAddr>> {
        let entries = self.entries.lock().expect("dns cache mutex poisoned");
        entries.get(host).map(|entry| entry.addrs.clone())
    }

    fn insert(&self, host: &str, addrs: Vec<SocketAddr>) {
        let mut entries = self.entries.lock().expect("dns cache mutex poisoned");
        entries.insert(
            host.to_string(),
            CacheEntry { addrs, expires_at: Instant::now() + DNS_CACHE_TTL },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn literal_ip_skips_resolution() {
        let cache = DnsCache::new();
        let addrs = cache.resolve("127.0.0.1", 8080).await.unwrap();
        assert_eq!(addrs, vec!["127.0.0.1:8080".parse().unwrap()]);
    }

    #[tokio::test]
    async fn caches_resolved_addresses() {
        let cache = DnsCache::new();
        let first = cache.resolve("localhost", 80).await.unwrap();
        assert!(cache.fresh("localhost").is_some());
        let second = cache.resolve("localhost", 80).await.unwrap();
        assert_eq!(first, second);
    }
}
