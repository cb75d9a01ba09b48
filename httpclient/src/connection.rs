//! An owned pair of half-streams bound to one (host, port, TLS?) tuple.

use crate::codec::{self, ParsedResponse};
use crate::dns::DnsCache;
use crate::error::{HttpClientError, Result};
use crate::pool::PoolKey;
use crate::tls::TlsContexts;
use socket2::SockRef;
use std::time::Duration;
use tokio::io::{split, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio::time::Instant;
use tracing::debug;

const SOCKET_BUFFER_SIZE: usize = 256 * 1024;

/// Unifies plain TCP and TLS-wrapped streams behind one boxable type.
pub trait AsyncStream: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> AsyncStream for T {}

type BoxedStream = Box<dyn AsyncStream>;

pub struct Connection {
    reader: BufReader<ReadHalf<BoxedStream>>,
    writer: WriteHalf<BoxedStream>,
    created_at: Instant,
    key: PoolKey,
    healthy: bool,
}

impl Connection {
    pub async fn connect(
        key: &PoolKey,
        dns: &DnsCache,
        tls: &TlsContexts,
        verify: bool,
    ) -> Result<Connection> {
        let candidates = dns.resolve(&key.host, key.port).await?;
        let mut last_err: Option<HttpClientError> = None;

        for addr in &candidates {
            let tcp = match TcpStream::connect(addr).await {
                Ok(tcp) => tcp,
                Err(e) => {
                    last_err = Some(HttpClientError::Io(e));
                    continue;
                }
            };
            tune_socket(&tcp);

            let stream: BoxedStream = if key.is_tls {
                let connector = tls.connector(verify)?;
                let server_name = crate::tls::server_name(&key.host)?;
                match connector.connect(server_name, tcp).await {
                    Ok(tls_stream) => Box::new(tls_stream),
                    Err(e) => {
                        last_err = Some(HttpClientError::Tls(e.to_string()));
                        continue;
                    }
                }
            } else {
                Box::new(tcp)
            };

            let (read_half, write_half) = split(stream);
            return Ok(Connection {
                reader: BufReader::new(read_half),
                writer: write_half,
                created_at: Instant::now(),
                key: key.clone(),
                healthy: true,
            });
        }

        Err(last_err.unwrap_or_else(|| {
            HttpClientError::ConnectionFailed(format!("no candidate addresses for {}", key.host))
        }))
    }

    pub fn key(&self) -> &PoolKey {
        &self.key
    }

    pub fn age(&self) -> Duration {
        Instant::now().saturating_duration_since(self.created_at)
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy
    }

    pub fn mark_unhealthy(&mut self) {
        self.healthy = false;
    }

    pub async fn write_request(&mut self, bytes: &[u8]) -> Result<()> {
        match self.writer.write_all(bytes).await.and(self.writer.flush().await) {
            Ok(()) => Ok(()),
            Err(e) => {
                self.healthy = false;
                Err(HttpClientError::Io(e))
            }
        }
    }

    pub async fn read_response(&mut self) -> Result<ParsedResponse> {
        match codec::parse_response(&mut self.reader).await {
            Ok(parsed) => {
                if !parsed.keep_alive {
                    self.healthy = false;
                }
                Ok(parsed)
            }
            Err(e) => {
                self.healthy = false;
                Err(e)
            }
        }
    }

    pub async fn shutdown(&mut self) {
        let _ = self.writer.shutdown().await;
        self.healthy = false;
    }
}

fn tune_socket(tcp: &TcpStream) {
    let sock = SockRef::from(tcp);
    if let Err(e) = sock.set_nodelay(true) {
        debug!(error = %e, "failed to disable Nagle's algorithm");
    }
    if let Err(e) = sock.set_keepalive(true) {
        debug!(error = %e, "failed to enable TCP keepalive");
    }
    if let Err(e) = sock.set_recv_buffer_size(SOCKET_BUFFER_SIZE) {
        debug!(error = %e, "failed to set receive buffer size");
    }
    if let Err(e) = sock.set_send_buffer_size(SOCKET_BUFFER_SIZE) {
        debug!(error = %e, "failed to set send buffer size");
    }
}
