//! `pgw-client`: sends one IMSI to a `pgw-server` and reports the verdict.
//!
//! ```text
//!  IMSI ──imsi::encode──▶ BCD bytes ──UDP──▶ pgw-server
//!                                              │
//!  "Response: created" ◀──────── reply ────────┘
//! ```
//!
//! - [`config`] — `client_config.json`
//! - [`client`] — blocking UDP exchange with timeout and retries
//! - [`error`]  — error type

pub mod client;
pub mod config;
pub mod error;

pub use client::UdpClient;
pub use config::ClientConfig;
pub use error::ClientError;
