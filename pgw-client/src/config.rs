//! Client configuration (`client_config.json`).
//!
//! Same rules as the server's file: every field optional, wrongly-typed
//! values fall back to the default.

use crate::error::ClientError;
use pgw_server::config::{lenient, level_filter};
use serde::Deserialize;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_SERVER_IP: &str = "127.0.0.1";
pub const DEFAULT_SERVER_PORT: u16 = 9000;
pub const DEFAULT_LOG_FILE: &str = "client.log";
pub const DEFAULT_LOG_LEVEL: &str = "INFO";
pub const DEFAULT_TIMEOUT_MS: u64 = 1000;
pub const DEFAULT_RETRIES: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub server_ip: String,
    pub server_port: u16,
    pub log_file: String,
    pub log_level: String,
    pub timeout_ms: u64,
    pub retries: u32,
}

#[derive(Debug, Default, Deserialize)]
struct RawClientConfig {
    #[serde(default, deserialize_with = "lenient")]
    server_ip: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    server_port: Option<u16>,
    #[serde(default, deserialize_with = "lenient")]
    log_file: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    log_level: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    timeout_ms: Option<u64>,
    #[serde(default, deserialize_with = "lenient")]
    retries: Option<u32>,
}

impl From<RawClientConfig> for ClientConfig {
    fn from(raw: RawClientConfig) -> Self {
        Self {
            server_ip: raw.server_ip.unwrap_or_else(|| DEFAULT_SERVER_IP.into()),
            server_port: raw.server_port.unwrap_or(DEFAULT_SERVER_PORT),
            log_file: raw.log_file.unwrap_or_else(|| DEFAULT_LOG_FILE.into()),
            log_level: raw.log_level.unwrap_or_else(|| DEFAULT_LOG_LEVEL.into()),
            timeout_ms: raw
                .timeout_ms
                .filter(|ms| *ms > 0)
                .unwrap_or(DEFAULT_TIMEOUT_MS),
            retries: raw.retries.filter(|n| *n > 0).unwrap_or(DEFAULT_RETRIES),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::from(RawClientConfig::default())
    }
}

impl ClientConfig {
    /// Load from `path`.  A missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ClientError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ClientError> {
        let raw: RawClientConfig = serde_json::from_str(text)?;
        Ok(raw.into())
    }

    pub fn server_addr(&self) -> Result<SocketAddr, ClientError> {
        let ip: IpAddr = self.server_ip.parse()?;
        Ok(SocketAddr::new(ip, self.server_port))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn log_filter(&self) -> log::LevelFilter {
        level_filter(&self.log_level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = ClientConfig::default();
        assert_eq!(c.server_addr().unwrap(), "127.0.0.1:9000".parse().unwrap());
        assert_eq!(c.timeout(), Duration::from_secs(1));
        assert_eq!(c.retries, 3);
        assert_eq!(c.log_file, "client.log");
    }

    #[test]
    fn fields_parse_and_bad_ones_fall_back() {
        let c = ClientConfig::from_json(
            r#"{"server_ip": "10.0.0.7", "server_port": 9100, "timeout_ms": "soon",
                "retries": 0, "log_level": "DEBUG"}"#,
        )
        .unwrap();
        assert_eq!(c.server_addr().unwrap(), "10.0.0.7:9100".parse().unwrap());
        assert_eq!(c.timeout_ms, DEFAULT_TIMEOUT_MS);
        assert_eq!(c.retries, DEFAULT_RETRIES);
        assert_eq!(c.log_filter(), log::LevelFilter::Debug);
    }

    #[test]
    fn missing_file_means_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let c = ClientConfig::load(dir.path().join("absent.json")).unwrap();
        assert_eq!(c, ClientConfig::default());
    }

    #[test]
    fn invalid_json_is_an_error() {
        assert!(matches!(
            ClientConfig::from_json("{ nope"),
            Err(ClientError::Config(_))
        ));
    }

    #[test]
    fn bad_ip_is_an_error() {
        let c = ClientConfig {
            server_ip: "gateway.local".into(),
            ..ClientConfig::default()
        };
        assert!(c.server_addr().is_err());
    }
}
