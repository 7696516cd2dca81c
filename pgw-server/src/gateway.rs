//! Wiring of the data plane and its ordered shutdown.

use crate::cdr::CdrRecorder;
use crate::config::Config;
use crate::error::PgwError;
use crate::policy::Blacklist;
use crate::server::UdpServer;
use crate::session::{SessionConfig, SessionControl, SessionStore};
use crate::transport::{Transport, RECV_TIMEOUT};
use crate::worker::Admission;
use std::net::SocketAddr;
use std::sync::Arc;

/// Everything behind the UDP port: billing sink, session store with its
/// sweeper, and the UDP server with its worker pool.
pub struct Gateway {
    cdr: Arc<CdrRecorder>,
    sessions: Arc<SessionStore>,
    udp: UdpServer,
}

impl Gateway {
    pub fn start(config: &Config) -> Result<Self, PgwError> {
        let cdr = Arc::new(CdrRecorder::open(&config.cdr_file)?);
        let blacklist = Arc::new(config.blacklist());
        let sessions = Arc::new(SessionStore::new(
            SessionConfig::from(config),
            Arc::clone(&blacklist),
            Arc::clone(&cdr),
        ));
        sessions.spawn_sweeper()?;

        let udp = match Self::start_udp(config, &sessions, blacklist) {
            Ok(udp) => udp,
            Err(e) => {
                sessions.stop();
                return Err(e);
            }
        };

        log::info!(
            "[gateway] started: udp {} cdr {} timeout {:?}",
            udp.local_addr(),
            cdr.path().display(),
            sessions.config().session_timeout
        );
        Ok(Self { cdr, sessions, udp })
    }

    fn start_udp(
        config: &Config,
        sessions: &Arc<SessionStore>,
        blacklist: Arc<Blacklist>,
    ) -> Result<UdpServer, PgwError> {
        let transport = Arc::new(Transport::bind(config.udp_addr()?, RECV_TIMEOUT)?);
        let sessions: Arc<dyn SessionControl> = sessions.clone();
        let admission = Arc::new(Admission::new(sessions, blacklist));
        UdpServer::start(
            transport,
            config.queue_capacity,
            config.worker_threads,
            admission,
        )
    }

    pub fn udp_addr(&self) -> SocketAddr {
        self.udp.local_addr()
    }

    pub fn sessions(&self) -> Arc<SessionStore> {
        Arc::clone(&self.sessions)
    }

    pub fn cdr(&self) -> &CdrRecorder {
        &self.cdr
    }

    /// Stop intake, drain sessions, answer what is still queued, then close
    /// the socket.  Blocks for the length of the drain.
    pub fn shutdown(mut self) -> usize {
        log::info!("[gateway] shutting down");
        self.udp.stop_intake();
        let drained = self.sessions.stop();
        self.udp.stop_workers();
        log::info!(
            "[gateway] stopped: {} drained, cdr {} written / {} lost, {} datagram(s) dropped (queue full)",
            drained,
            self.cdr.written(),
            self.cdr.dropped(),
            self.udp.dropped()
        );
        drained
    }
}
