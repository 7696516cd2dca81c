//! `pgw-server`: session admission for a packet gateway.
//!
//! # Architecture
//!
//! ```text
//!   UDP (BCD IMSI)                               HTTP control plane
//!        │                                      /check_subscriber  /stop
//!  ┌─────▼──────┐  Request  ┌──────────────┐          │            │
//!  │  receiver  │──────────▶│ DispatchQueue│          │            │
//!  └────────────┘           └──────┬───────┘          │            │
//!                                  │ pop              │            │
//!                           ┌──────▼───────┐          │            │
//!                           │  WorkerPool  │          │            │
//!                           │  (Admission) │          │            │
//!                           └──────┬───────┘          │            │
//!                                  │ create_session   │ has_session│
//!                           ┌──────▼──────────────────▼──┐         │
//!                           │        SessionStore        │◀─ stop ─┘
//!                           │  (sweeper thread, drain)   │  (via Gateway)
//!                           └──────┬─────────────────────┘
//!                                  │ created / deleted
//!                           ┌──────▼───────┐
//!                           │ CdrRecorder  │──▶ cdr.log
//!                           └──────────────┘
//! ```
//!
//! Each module has a single responsibility:
//! - [`imsi`]      — BCD encode / decode and validation
//! - [`policy`]    — blacklist
//! - [`session`]   — session map, TTL sweep, paced drain
//! - [`cdr`]       — append-only billing records
//! - [`dispatch`]  — bounded request queue
//! - [`worker`]    — worker pool and per-request admission
//! - [`transport`] — UDP socket wrapper
//! - [`server`]    — receive loop plus pool lifecycle
//! - [`control`]   — HTTP endpoints
//! - [`gateway`]   — wiring and ordered shutdown
//! - [`config`]    — JSON configuration
//! - [`logging`]   — `env_logger` setup for the binaries

pub mod cdr;
pub mod config;
pub mod control;
pub mod dispatch;
pub mod error;
pub mod gateway;
pub mod imsi;
pub mod logging;
pub mod policy;
pub mod server;
pub mod session;
pub mod transport;
pub mod worker;

pub use cdr::{CdrAction, CdrRecorder};
pub use config::Config;
pub use error::PgwError;
pub use gateway::Gateway;
pub use policy::Blacklist;
pub use session::{SessionConfig, SessionControl, SessionStore};
pub use worker::Verdict;
