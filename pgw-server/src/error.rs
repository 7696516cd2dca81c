use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PgwError {
    #[error("Invalid IMSI format: {0:?}")]
    Format(String),
    #[error("Config error: {0}")]
    Config(String),
    #[error("Failed to bind UDP socket on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to open CDR file {}: {source}", path.display())]
    CdrOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<std::net::AddrParseError> for PgwError {
    fn from(err: std::net::AddrParseError) -> Self {
        PgwError::Config(format!("Invalid address: {}", err))
    }
}

impl From<serde_json::Error> for PgwError {
    fn from(err: serde_json::Error) -> Self {
        PgwError::Config(format!("Failed to parse config: {}", err))
    }
}
