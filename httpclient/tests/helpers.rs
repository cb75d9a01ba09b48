//! Shared fixtures for integration tests: a minimal HTTP/1.1 request-head
//! reader and a self-signed certificate generator for the TLS round-trip
//! test.

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};

/// Reads request lines until the blank line terminating the header block,
/// returning the request line on success or `None` on EOF/error. Generic
/// over the stream type so it works equally against a raw `TcpStream` and a
/// `tokio_rustls` TLS stream wrapping one.
pub async fn read_request_head<S: AsyncRead + Unpin>(stream: &mut S) -> Option<String> {
    let mut raw = Vec::new();
    let mut byte = [0u8; 1];
    let mut request_line = None;
    loop {
        match stream.read(&mut byte).await {
            Ok(0) => return None,
            Ok(_) => raw.push(byte[0]),
            Err(_) => return None,
        }
        if raw.ends_with(b"\r\n") {
            let line = String::from_utf8_lossy(&raw).trim().to_string();
            if request_line.is_none() {
                request_line = Some(line.clone());
            }
            if line.is_empty() {
                return request_line;
            }
            raw.clear();
        }
    }
}

/// Generates a self-signed certificate/key pair as DER, for direct use in a
/// `rustls::ServerConfig` fixture without round-tripping through disk.
pub fn generate_valid_test_cert_der(
) -> Result<(CertificateDer<'static>, PrivateKeyDer<'static>), Box<dyn std::error::Error + Send + Sync>> {
    let subject_alt_names = vec!["localhost".to_string()];
    let rcgen::CertifiedKey { cert, signing_key } =
        rcgen::generate_simple_self_signed(subject_alt_names)?;

    let cert_der = CertificateDer::from(cert.der().to_vec());
    let key_der = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(signing_key.serialize_der()));

    Ok((cert_der, key_der))
}
