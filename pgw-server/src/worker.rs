//! Worker pool and the per-datagram admission decision.
//!
//! Each worker loops on [`DispatchQueue::pop`] and hands every request to a
//! shared handler.  For the UDP server that handler is
//! [`Admission::decide`] followed by a reply on the transport.

use crate::dispatch::{DispatchQueue, Request};
use crate::error::PgwError;
use crate::imsi;
use crate::policy::Blacklist;
use crate::session::SessionControl;
use crate::transport::Transport;
use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Outcome of one admission attempt, as sent on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Created,
    Rejected,
}

impl Verdict {
    pub fn as_bytes(self) -> &'static [u8] {
        match self {
            Verdict::Created => b"created",
            Verdict::Rejected => b"rejected",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Created => f.write_str("created"),
            Verdict::Rejected => f.write_str("rejected"),
        }
    }
}

/// Decode → validate → policy → session store.
pub struct Admission {
    sessions: Arc<dyn SessionControl>,
    blacklist: Arc<Blacklist>,
}

impl Admission {
    pub fn new(sessions: Arc<dyn SessionControl>, blacklist: Arc<Blacklist>) -> Self {
        Self {
            sessions,
            blacklist,
        }
    }

    pub fn decide(&self, payload: &[u8]) -> Verdict {
        let imsi = imsi::decode(payload);
        if !imsi::is_well_formed(&imsi) {
            log::warn!(
                "[worker] malformed IMSI {:?} ({} byte payload)",
                imsi,
                payload.len()
            );
            return Verdict::Rejected;
        }
        if self.blacklist.is_blacklisted(&imsi) {
            log::warn!("[worker] {} is blacklisted", imsi);
            return Verdict::Rejected;
        }
        if self.sessions.create_session(&imsi) {
            Verdict::Created
        } else {
            Verdict::Rejected
        }
    }

    /// Decide on `request` and send the verdict back to its peer.
    pub fn handle(&self, request: Request, transport: &Transport) -> Verdict {
        let verdict = self.decide(&request.payload);
        if let Err(e) = transport.send_to(verdict.as_bytes(), request.peer) {
            log::error!("[worker] reply to {} failed: {}", request.peer, e);
        }
        verdict
    }
}

pub type Handler = dyn Fn(Request) + Send + Sync;

/// Fixed-size pool of threads draining one [`DispatchQueue`].
pub struct WorkerPool {
    queue: Arc<DispatchQueue>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Start `size` workers (at least one).
    pub fn spawn(
        size: usize,
        queue: Arc<DispatchQueue>,
        handler: Arc<Handler>,
    ) -> Result<Self, PgwError> {
        let mut pool = Self {
            queue,
            workers: Vec::with_capacity(size.max(1)),
        };
        for id in 0..size.max(1) {
            let queue = Arc::clone(&pool.queue);
            let handler = Arc::clone(&handler);
            let spawned = thread::Builder::new()
                .name(format!("pgw-worker-{id}"))
                .spawn(move || {
                    while let Some(request) = queue.pop() {
                        handler(request);
                    }
                    log::debug!("[worker] {} exited", id);
                });
            match spawned {
                Ok(handle) => pool.workers.push(handle),
                Err(e) => {
                    pool.shutdown();
                    return Err(e.into());
                }
            }
        }
        log::info!("[worker] {} worker(s) started", pool.workers.len());
        Ok(pool)
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Close the queue, let the workers finish what is queued, and join them.
    pub fn shutdown(&mut self) {
        if self.workers.is_empty() {
            return;
        }
        self.queue.close();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                log::error!("[worker] worker thread panicked");
            }
        }
        log::info!("[worker] pool stopped");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}
