//! Per-host connection pool: bounded idle list, in-use count, DNS cache,
//! and the acquire/release/close discipline that keeps sockets healthy
//! under concurrent load.
//!
//! The scheduling model this was ported from is single-threaded
//! cooperative; this port runs on tokio's multithreaded runtime, so every
//! mutable field below is guarded by a `std::sync::Mutex` held only across
//! the synchronous idle-list/in-use-count mutations — never across an
//! `.await`. DNS resolution, TCP connect, and the TLS handshake all happen
//! outside any held lock.

use crate::connection::Connection;
use crate::dns::DnsCache;
use crate::error::{HttpClientError, Result};
use crate::tls::TlsContexts;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::trace;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PoolKey {
    pub host: String,
    pub port: u16,
    pub is_tls: bool,
}

impl PoolKey {
    pub fn new(host: &str, port: u16, is_tls: bool) -> Self {
        Self { host: host.to_ascii_lowercase(), port, is_tls }
    }
}

struct PoolState {
    idle: VecDeque<Connection>,
    in_use: usize,
    closed: bool,
}

pub struct Pool {
    key: PoolKey,
    max_size: usize,
    max_idle_age: Duration,
    dns: DnsCache,
    tls: Arc<TlsContexts>,
    state: Mutex<PoolState>,
}

impl Pool {
    pub fn new(key: PoolKey, max_size: usize, max_idle_age: Duration, tls: Arc<TlsContexts>) -> Self {
        Self {
            key,
            max_size,
            max_idle_age,
            dns: DnsCache::new(),
            tls,
            state: Mutex::new(PoolState { idle: VecDeque::new(), in_use: 0, closed: false }),
        }
    }

    pub fn key(&self) -> &PoolKey {
        &self.key
    }

    /// Scans the idle list from the head; the first connection that is
    /// still healthy and within `max_idle_age` is handed out immediately.
    /// Entries rejected along the way are dropped, not re-queued — the scan
    /// does not continue past a reusable hit looking for something better.
    pub async fn acquire(&self, timeout: Option<Duration>, verify: bool) -> Result<Connection> {
        {
            let mut state = self.state.lock().expect("pool mutex poisoned");
            if state.closed {
                return Err(HttpClientError::PoolClosed);
            }
            while let Some(conn) = state.idle.pop_front() {
                if conn.is_healthy() && conn.age() <= self.max_idle_age {
                    state.in_use += 1;
                    trace!(host = %self.key.host, "pool hit: reusing idle connection");
                    return Ok(conn);
                }
                // Stale or unhealthy: drop it (closes the socket) and keep scanning.
            }
        }

        trace!(host = %self.key.host, "pool miss: creating new connection");
        let create = Connection::connect(&self.key, &self.dns, &self.tls, verify);
        let conn = match timeout {
            Some(t) => match tokio::time::timeout(t, create).await {
                Ok(result) => result?,
                Err(_) => return Err(HttpClientError::Timeout),
            },
            None => create.await?,
        };

        let mut state = self.state.lock().expect("pool mutex poisoned");
        if state.closed {
            return Err(HttpClientError::PoolClosed);
        }
        state.in_use += 1;
        Ok(conn)
    }

    /// Returns a connection to idle, or closes it, per the release discipline:
    /// closed pool, `keep_alive=false`, an unhealthy connection, or an idle
    /// list already at capacity all result in the connection being closed.
    pub async fn release(&self, mut conn: Connection, keep_alive: bool) {
        let reusable = {
            let mut state = self.state.lock().expect("pool mutex poisoned");
            state.in_use = state.in_use.saturating_sub(1);
            !state.closed && keep_alive && conn.is_healthy() && state.idle.len() < self.max_size
        };
        if reusable {
            let mut state = self.state.lock().expect("pool mutex poisoned");
            // Re-check under lock: another release may have filled the idle
            // list between the check above and now.
            if !state.closed && state.idle.len() < self.max_size {
                state.idle.push_front(conn);
                return;
            }
            drop(state);
        }
        conn.shutdown().await;
    }

    pub async fn close(&self) {
        let idle = {
            let mut state = self.state.lock().expect("pool mutex poisoned");
            state.closed = true;
            std::mem::take(&mut state.idle)
        };
        for mut conn in idle {
            conn.shutdown().await;
        }
    }

    pub fn idle_len(&self) -> usize {
        self.state.lock().expect("pool mutex poisoned").idle.len()
    }

    pub fn in_use(&self) -> usize {
        self.state.lock().expect("pool mutex poisoned").in_use
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tls::TlsContexts;
    use tokio::net::TcpListener;

    /// Accepts connections forever, doing nothing else with them, so a test
    /// `Connection::connect` has a real socket to dial.
    async fn spawn_accept_loop() -> (PoolKey, tokio::task::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let task = tokio::spawn(async move {
            loop {
                if listener.accept().await.is_err() {
                    break;
                }
            }
        });
        (PoolKey::new("127.0.0.1", port, false), task)
    }

    fn test_pool(key: PoolKey, max_size: usize) -> Pool {
        Pool::new(key, max_size, Duration::from_secs(90), Arc::new(TlsContexts::new()))
    }

    #[tokio::test]
    async fn released_connection_is_reused_on_next_acquire() {
        let (key, _server) = spawn_accept_loop().await;
        let pool = test_pool(key, 4);

        let conn = pool.acquire(None, true).await.unwrap();
        assert_eq!(pool.idle_len(), 0);
        assert_eq!(pool.in_use(), 1);

        pool.release(conn, true).await;
        assert_eq!(pool.idle_len(), 1);
        assert_eq!(pool.in_use(), 0);

        let _reused = pool.acquire(None, true).await.unwrap();
        // A reusable idle connection was handed back rather than a fresh dial.
        assert_eq!(pool.idle_len(), 0);
        assert_eq!(pool.in_use(), 1);
    }

    #[tokio::test]
    async fn releasing_with_keep_alive_false_closes_instead_of_idling() {
        let (key, _server) = spawn_accept_loop().await;
        let pool = test_pool(key, 4);

        let conn = pool.acquire(None, true).await.unwrap();
        pool.release(conn, false).await;

        assert_eq!(pool.idle_len(), 0, "a non-keep-alive release must not be returned to idle");
    }

    #[tokio::test]
    async fn idle_list_never_exceeds_max_size() {
        let (key, _server) = spawn_accept_loop().await;
        let pool = test_pool(key, 2);

        let mut conns = Vec::new();
        for _ in 0..4 {
            conns.push(pool.acquire(None, true).await.unwrap());
        }
        for conn in conns {
            pool.release(conn, true).await;
        }

        assert!(pool.idle_len() <= 2, "idle list exceeded max_size");
    }

    #[tokio::test]
    async fn closed_pool_rejects_further_acquires() {
        let (key, _server) = spawn_accept_loop().await;
        let pool = test_pool(key, 4);

        let conn = pool.acquire(None, true).await.unwrap();
        pool.release(conn, true).await;
        pool.close().await;

        assert_eq!(pool.idle_len(), 0);
        let err = pool.acquire(None, true).await.unwrap_err();
        assert!(matches!(err, HttpClientError::PoolClosed));
    }

    #[tokio::test]
    async fn a_released_connection_closed_by_the_peer_is_not_reused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let task = tokio::spawn(async move {
            if let Ok((stream, _)) = listener.accept().await {
                drop(stream);
            }
        });
        let key = PoolKey::new("127.0.0.1", port, false);
        let pool = test_pool(key, 4);

        let mut conn = pool.acquire(None, true).await.unwrap();
        conn.mark_unhealthy();
        pool.release(conn, true).await;

        assert_eq!(pool.idle_len(), 0, "an unhealthy connection must be closed, not idled");
        task.abort();
    }
}
