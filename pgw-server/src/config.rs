//! Server configuration loaded from a JSON file.
//!
//! A missing file or invalid JSON is an error.  Individual fields are read
//! leniently: a missing, wrongly-typed or out-of-range value falls back to its
//! default instead of failing the whole load.

use crate::error::PgwError;
use crate::policy::Blacklist;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_UDP_IP: &str = "0.0.0.0";
pub const DEFAULT_UDP_PORT: u16 = 9000;
pub const DEFAULT_SESSION_TIMEOUT_SEC: u64 = 30;
pub const DEFAULT_CDR_FILE: &str = "cdr.log";
pub const DEFAULT_HTTP_PORT: u16 = 8080;
pub const DEFAULT_SHUTDOWN_RATE_MS: u64 = 10;
pub const DEFAULT_LOG_FILE: &str = "pgw.log";
pub const DEFAULT_LOG_LEVEL: &str = "INFO";
pub const DEFAULT_SWEEP_INTERVAL_MS: u64 = 200;
pub const DEFAULT_WORKER_THREADS: usize = 4;
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub udp_ip: String,
    pub udp_port: u16,
    pub session_timeout_sec: u64,
    pub cdr_file: String,
    pub http_port: u16,
    /// Milliseconds between paced removals during graceful drain.
    pub graceful_shutdown_rate: u64,
    pub log_file: String,
    pub log_level: String,
    pub blacklist: Vec<String>,
    pub sweep_interval_ms: u64,
    pub worker_threads: usize,
    pub queue_capacity: usize,
}

/// Field-by-field view of the file; every field is optional and lenient.
#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    #[serde(default, deserialize_with = "lenient")]
    udp_ip: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    udp_port: Option<u16>,
    #[serde(default, deserialize_with = "lenient")]
    session_timeout_sec: Option<u64>,
    #[serde(default, deserialize_with = "lenient")]
    cdr_file: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    http_port: Option<u16>,
    #[serde(default, deserialize_with = "lenient")]
    graceful_shutdown_rate: Option<u64>,
    #[serde(default, deserialize_with = "lenient")]
    log_file: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    log_level: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    blacklist: Option<Vec<serde_json::Value>>,
    #[serde(default, deserialize_with = "lenient")]
    sweep_interval_ms: Option<u64>,
    #[serde(default, deserialize_with = "lenient")]
    worker_threads: Option<usize>,
    #[serde(default, deserialize_with = "lenient")]
    queue_capacity: Option<usize>,
}

/// Deserialize a field as `Some(T)`, or `None` if the JSON value has the wrong
/// shape.  Never fails on the value itself.
pub fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

impl Default for Config {
    fn default() -> Self {
        Self::from(RawConfig::default())
    }
}

impl From<RawConfig> for Config {
    fn from(raw: RawConfig) -> Self {
        let blacklist = raw
            .blacklist
            .unwrap_or_default()
            .into_iter()
            .filter_map(|v| match v {
                serde_json::Value::String(s) => Some(s),
                _ => None,
            })
            .collect();

        Self {
            udp_ip: raw.udp_ip.unwrap_or_else(|| DEFAULT_UDP_IP.to_string()),
            udp_port: raw.udp_port.unwrap_or(DEFAULT_UDP_PORT),
            session_timeout_sec: raw.session_timeout_sec.unwrap_or(DEFAULT_SESSION_TIMEOUT_SEC),
            cdr_file: raw.cdr_file.unwrap_or_else(|| DEFAULT_CDR_FILE.to_string()),
            http_port: raw.http_port.unwrap_or(DEFAULT_HTTP_PORT),
            graceful_shutdown_rate: raw.graceful_shutdown_rate.unwrap_or(DEFAULT_SHUTDOWN_RATE_MS),
            log_file: raw.log_file.unwrap_or_else(|| DEFAULT_LOG_FILE.to_string()),
            log_level: raw.log_level.unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
            blacklist,
            sweep_interval_ms: raw
                .sweep_interval_ms
                .filter(|&ms| ms > 0)
                .unwrap_or(DEFAULT_SWEEP_INTERVAL_MS),
            worker_threads: raw
                .worker_threads
                .filter(|&n| n > 0)
                .unwrap_or(DEFAULT_WORKER_THREADS),
            queue_capacity: raw
                .queue_capacity
                .filter(|&n| n > 0)
                .unwrap_or(DEFAULT_QUEUE_CAPACITY),
        }
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PgwError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(PgwError::Config(format!(
                "Config file does not exist: {}",
                path.display()
            )));
        }
        let text = std::fs::read_to_string(path).map_err(|e| {
            PgwError::Config(format!("Failed to open config file {}: {}", path.display(), e))
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, PgwError> {
        let raw: RawConfig = serde_json::from_str(text)?;
        Ok(raw.into())
    }

    /// UDP bind address.  Fails if `udp_ip` is not an IP literal.
    pub fn udp_addr(&self) -> Result<SocketAddr, PgwError> {
        let ip: IpAddr = self.udp_ip.parse()?;
        Ok(SocketAddr::new(ip, self.udp_port))
    }

    /// HTTP control-plane bind address (all interfaces).
    pub fn http_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.http_port))
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_sec)
    }

    pub fn drain_interval(&self) -> Duration {
        Duration::from_millis(self.graceful_shutdown_rate)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    pub fn blacklist(&self) -> Blacklist {
        Blacklist::new(self.blacklist.iter().cloned())
    }

    /// `log_level` mapped onto a `log` filter.  Unknown names mean `Info`.
    pub fn log_filter(&self) -> log::LevelFilter {
        level_filter(&self.log_level)
    }
}

/// Map the config's level names (`DEBUG`, `INFO`, `WARN`, `ERROR`,
/// `CRITICAL`) onto `log` filters.
pub fn level_filter(name: &str) -> log::LevelFilter {
    match name.to_uppercase().as_str() {
        "TRACE" => log::LevelFilter::Trace,
        "DEBUG" => log::LevelFilter::Debug,
        "WARN" | "WARNING" => log::LevelFilter::Warn,
        "ERROR" | "CRITICAL" => log::LevelFilter::Error,
        "OFF" => log::LevelFilter::Off,
        _ => log::LevelFilter::Info,
    }
}
