use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Invalid IMSI: {0}")]
    InvalidImsi(String),
    #[error("Config error: {0}")]
    Config(String),
    #[error("No response from {server} after {attempts} attempt(s)")]
    NoResponse { server: String, attempts: u32 },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<pgw_server::PgwError> for ClientError {
    fn from(e: pgw_server::PgwError) -> Self {
        match e {
            pgw_server::PgwError::Format(msg) => ClientError::InvalidImsi(msg),
            other => ClientError::Config(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(e: serde_json::Error) -> Self {
        ClientError::Config(e.to_string())
    }
}

impl From<std::net::AddrParseError> for ClientError {
    fn from(e: std::net::AddrParseError) -> Self {
        ClientError::Config(e.to_string())
    }
}
