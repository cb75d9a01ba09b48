use thiserror::Error;

/// Errors surfaced by the client.
///
/// The core never retries automatically; the one exception is the DNS/connect
/// candidate loop inside connection creation, which is not visible here.
#[derive(Error, Debug)]
pub enum HttpClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("protocol error: {0}")]
    ProtocolError(String),

    #[error("{status} Client Error for url: {url}")]
    ClientError { status: u16, url: String },

    #[error("{status} Server Error for url: {url}")]
    ServerError { status: u16, url: String },

    #[error("connection pool is closed")]
    PoolClosed,

    #[error("session is closed")]
    SessionClosed,

    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, HttpClientError>;
