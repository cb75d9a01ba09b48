//! Optional TOML-backed client configuration, for deployments that prefer
//! to keep connection policy out of code.

use crate::error::{HttpClientError, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_verify")]
    pub verify: bool,
    #[serde(default = "default_connector_limit")]
    pub connector_limit: usize,
    #[serde(default = "default_per_host_limit")]
    pub connector_limit_per_host: usize,
    #[serde(default)]
    pub default_headers: Vec<(String, String)>,
}

impl ClientConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            verify: default_verify(),
            connector_limit: default_connector_limit(),
            connector_limit_per_host: default_per_host_limit(),
            default_headers: Vec::new(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_verify() -> bool {
    true
}

fn default_connector_limit() -> usize {
    100
}

fn default_per_host_limit() -> usize {
    30
}

/// Loads a [`ClientConfig`] from a TOML file on disk.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<ClientConfig> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)
        .map_err(|e| HttpClientError::Config(format!("failed to read {}: {e}", path.display())))?;
    toml::from_str(&raw)
        .map_err(|e| HttpClientError::Config(format!("failed to parse {}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_fields_are_absent() {
        let cfg: ClientConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.timeout_secs, 30);
        assert!(cfg.verify);
        assert_eq!(cfg.connector_limit, 100);
        assert_eq!(cfg.connector_limit_per_host, 30);
        assert!(cfg.default_headers.is_empty());
    }

    #[test]
    fn parses_a_fully_specified_document() {
        let doc = r#"
            timeout_secs = 5
            verify = false
            connector_limit = 10
            connector_limit_per_host = 4
            default_headers = [["User-Agent", "custom/1.0"]]
        "#;
        let cfg: ClientConfig = toml::from_str(doc).unwrap();
        assert_eq!(cfg.timeout_secs, 5);
        assert!(!cfg.verify);
        assert_eq!(cfg.connector_limit, 10);
        assert_eq!(cfg.connector_limit_per_host, 4);
        assert_eq!(cfg.default_headers, vec![("User-Agent".to_string(), "custom/1.0".to_string())]);
    }

    #[test]
    fn load_from_path_reports_missing_file_as_config_error() {
        let err = load_from_path("/nonexistent/path/does-not-exist.toml").unwrap_err();
        assert!(matches!(err, HttpClientError::Config(_)));
    }

    #[test]
    fn load_from_path_round_trips_every_field() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("client.toml");
        std::fs::write(
            &path,
            r#"
                timeout_secs = 7
                verify = false
                connector_limit = 50
                connector_limit_per_host = 12
                default_headers = [["X-Test", "1"]]
            "#,
        )
        .expect("write temp config");

        let cfg = load_from_path(&path).expect("load config from temp file");
        assert_eq!(cfg.timeout_secs, 7);
        assert_eq!(cfg.timeout(), Duration::from_secs(7));
        assert!(!cfg.verify);
        assert_eq!(cfg.connector_limit, 50);
        assert_eq!(cfg.connector_limit_per_host, 12);
        assert_eq!(cfg.default_headers, vec![("X-Test".to_string(), "1".to_string())]);
    }
}
