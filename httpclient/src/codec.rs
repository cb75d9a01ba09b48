//! HTTP/1.1 wire codec: request serialization and response parsing.
//!
//! Request building is a capability behind the [`Codec`] trait so an
//! accelerated implementation could be swapped in without touching
//! `Session`; only one conforming implementation, [`Http11Codec`], ships
//! here. Response parsing is a free function rather than a trait method
//! because it operates directly against a connection's buffered reader and
//! has no state worth abstracting over.

use crate::error::{HttpClientError, Result};
use crate::headers::HeaderMap;
use bytes::BytesMut;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

pub trait Codec: Send + Sync + 'static {
    fn encode_request(
        &self,
        method: &str,
        target: &str,
        headers: &HeaderMap,
        body: Option<&[u8]>,
    ) -> Vec<u8>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Http11Codec;

impl Codec for Http11Codec {
    fn encode_request(
        &self,
        method: &str,
        target: &str,
        headers: &HeaderMap,
        body: Option<&[u8]>,
    ) -> Vec<u8> {
        build_request(method, target, headers, body)
    }
}

pub fn build_request(
    method: &str,
    target: &str,
    headers: &HeaderMap,
    body: Option<&[u8]>,
) -> Vec<u8> {
    let mut buf = Vec::with_capacity(target.len() + 256 + body.map(<[u8]>::len).unwrap_or(0));
    buf.extend_from_slice(method.to_ascii_uppercase().as_bytes());
    buf.push(b' ');
    buf.extend_from_slice(target.as_bytes());
    buf.extend_from_slice(b" HTTP/1.1\r\n");
    for (name, value) in headers.iter() {
        buf.extend_from_slice(name.as_bytes());
        buf.extend_from_slice(b": ");
        buf.extend_from_slice(value.as_bytes());
        buf.extend_from_slice(b"\r\n");
    }
    buf.extend_from_slice(b"\r\n");
    if let Some(body) = body {
        buf.extend_from_slice(body);
    }
    buf
}

#[derive(Debug, Clone)]
pub struct ParsedResponse {
    pub status: u16,
    pub reason: String,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
    pub keep_alive: bool,
}

/// Parses one HTTP/1.1 response message off `reader`.
///
/// Reads the status line and header block, then the body according to
/// whichever framing header (if any) is present. `reader` must already be
/// positioned at the start of a response message.
pub async fn parse_response<R>(reader: &mut R) -> Result<ParsedResponse>
where
    R: AsyncBufRead + Unpin,
{
    let status_line = read_line(reader).await?;
    let mut parts = status_line.splitn(3, ' ');
    let _version = parts
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| protocol_error(format!("malformed status line: {status_line:?}")))?;
    let status: u16 = parts
        .next()
        .ok_or_else(|| protocol_error(format!("malformed status line: {status_line:?}")))?
        .parse()
        .map_err(|_| protocol_error(format!("non-integer status in {status_line:?}")))?;
    let reason = parts.next().unwrap_or("").to_string();

    let mut headers = HeaderMap::new();
    loop {
        let line = read_line(reader).await?;
        if line.is_empty() {
            break;
        }
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| protocol_error(format!("malformed header line: {line:?}")))?;
        headers.set(name.trim().to_string(), value.trim().to_string());
    }

    let keep_alive = !headers
        .get("Connection")
        .map(|v| v.eq_ignore_ascii_case("close"))
        .unwrap_or(false);

    let body = if let Some(len) = headers.get("Content-Length") {
        let len: usize = len
            .trim()
            .parse()
            .map_err(|_| protocol_error(format!("bad Content-Length: {len:?}")))?;
        let mut buf = vec![0u8; len];
        read_exact_or_protocol_error(reader, &mut buf).await?;
        buf
    } else if headers
        .get("Transfer-Encoding")
        .map(|v| v.to_ascii_lowercase().contains("chunked"))
        .unwrap_or(false)
    {
        read_chunked_body(reader).await?
    } else {
        // No framing header at all: HEAD, 204, 304, or a misbehaving server.
        // Per contract, no read-until-EOF is attempted on a connection the
        // caller expects to keep alive.
        Vec::new()
    };

    Ok(ParsedResponse { status, reason, headers, body, keep_alive })
}

/// Chunks are concatenated into one buffer as they arrive; no special-cased
/// fast path for a single chunk.
async fn read_chunked_body<R>(reader: &mut R) -> Result<Vec<u8>>
where
    R: AsyncBufRead + Unpin,
{
    let mut body = BytesMut::new();
    loop {
        let size_line = read_line(reader).await?;
        let size_token = size_line.split(';').next().unwrap_or("").trim();
        let size = usize::from_str_radix(size_token, 16)
            .map_err(|_| protocol_error(format!("bad chunk size: {size_line:?}")))?;
        if size == 0 {
            // Drain trailer headers (if any) up to the terminating blank line.
            loop {
                let trailer = read_line(reader).await?;
                if trailer.is_empty() {
                    break;
                }
            }
            break;
        }
        let mut chunk = vec![0u8; size];
        read_exact_or_protocol_error(reader, &mut chunk).await?;
        body.extend_from_slice(&chunk);
        let mut crlf = [0u8; 2];
        read_exact_or_protocol_error(reader, &mut crlf).await?;
    }
    Ok(body.to_vec())
}

async fn read_line<R>(reader: &mut R) -> Result<String>
where
    R: AsyncBufRead + Unpin,
{
    let mut raw = Vec::new();
    let n = reader.read_until(b'\n', &mut raw).await?;
    if n == 0 {
        return Err(protocol_error("unexpected EOF reading response"));
    }
    while matches!(raw.last(), Some(b'\n') | Some(b'\r')) {
        raw.pop();
    }
    Ok(String::from_utf8_lossy(&raw).into_owned())
}

async fn read_exact_or_protocol_error<R>(reader: &mut R, buf: &mut [u8]) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    match reader.read_exact(buf).await {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            Err(protocol_error("unexpected EOF mid-body"))
        }
        Err(e) => Err(HttpClientError::Io(e)),
    }
}

fn protocol_error(msg: impl Into<String>) -> HttpClientError {
    HttpClientError::ProtocolError(msg.into())
}
