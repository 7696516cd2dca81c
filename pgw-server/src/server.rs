//! UDP admission server: one receive thread feeding a worker pool.
//!
//! ```text
//!   socket ──recv──▶ [receiver] ──push──▶ DispatchQueue ──pop──▶ [worker N]
//!      ▲                                                            │
//!      └──────────────────── "created" / "rejected" ◀───────────────┘
//! ```
//!
//! Shutdown is two-phase so the session store can drain in between:
//! [`UdpServer::stop_intake`] stops reading new datagrams,
//! [`UdpServer::stop_workers`] answers whatever is still queued and joins
//! the pool.

use crate::dispatch::{DispatchQueue, Request};
use crate::error::PgwError;
use crate::transport::{Transport, MAX_PAYLOAD};
use crate::worker::{Admission, Handler, WorkerPool};
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Pause after a receive error that is not a timeout.
const RECV_ERROR_BACKOFF: Duration = Duration::from_millis(100);

pub struct UdpServer {
    transport: Arc<Transport>,
    queue: Arc<DispatchQueue>,
    running: Arc<AtomicBool>,
    dropped: Arc<AtomicU64>,
    receiver: Option<JoinHandle<()>>,
    pool: WorkerPool,
}

impl UdpServer {
    pub fn start(
        transport: Arc<Transport>,
        queue_capacity: usize,
        workers: usize,
        admission: Arc<Admission>,
    ) -> Result<Self, PgwError> {
        let queue = Arc::new(DispatchQueue::with_capacity(queue_capacity));

        let handler: Arc<Handler> = {
            let transport = Arc::clone(&transport);
            Arc::new(move |request: Request| {
                admission.handle(request, &transport);
            })
        };
        let mut pool = WorkerPool::spawn(workers, Arc::clone(&queue), handler)?;

        let running = Arc::new(AtomicBool::new(true));
        let dropped = Arc::new(AtomicU64::new(0));
        let receiver = {
            let transport = Arc::clone(&transport);
            let queue = Arc::clone(&queue);
            let running = Arc::clone(&running);
            let dropped = Arc::clone(&dropped);
            thread::Builder::new()
                .name("pgw-receiver".into())
                .spawn(move || {
                    receive_loop(|buf| transport.recv_from(buf), &queue, &running, &dropped)
                })
        };
        let receiver = match receiver {
            Ok(handle) => handle,
            Err(e) => {
                pool.shutdown();
                return Err(e.into());
            }
        };

        log::info!(
            "[udp] listening on {} ({} workers, queue {})",
            transport.local_addr(),
            pool.size(),
            queue.capacity()
        );
        Ok(Self {
            transport,
            queue,
            running,
            dropped,
            receiver: Some(receiver),
            pool,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.transport.local_addr()
    }

    /// Datagrams discarded because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Stop receiving.  Requests already queued stay queued.
    pub fn stop_intake(&mut self) {
        let Some(handle) = self.receiver.take() else {
            return;
        };
        self.running.store(false, Ordering::SeqCst);
        self.transport.wake();
        if handle.join().is_err() {
            log::error!("[udp] receive thread panicked");
        }
        log::info!("[udp] intake stopped ({} queued)", self.queue.len());
    }

    /// Answer the remaining queue and join every worker.
    pub fn stop_workers(&mut self) {
        self.pool.shutdown();
    }

    pub fn stop(&mut self) {
        self.stop_intake();
        self.stop_workers();
    }
}

impl Drop for UdpServer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn receive_loop<R>(mut recv: R, queue: &DispatchQueue, running: &AtomicBool, dropped: &AtomicU64)
where
    R: FnMut(&mut [u8]) -> io::Result<Option<(usize, SocketAddr)>>,
{
    let mut buf = [0u8; MAX_PAYLOAD];
    while running.load(Ordering::SeqCst) {
        let (len, peer) = match recv(&mut buf) {
            Ok(Some(received)) => received,
            Ok(None) => continue,
            Err(e) => {
                log::warn!("[udp] receive error: {}", e);
                thread::sleep(RECV_ERROR_BACKOFF);
                continue;
            }
        };
        if !running.load(Ordering::SeqCst) {
            break;
        }
        let request = Request {
            payload: buf[..len].to_vec(),
            peer,
        };
        if !queue.push(request) {
            dropped.fetch_add(1, Ordering::Relaxed);
            log::warn!("[udp] queue full, dropped datagram from {}", peer);
        }
    }
    log::debug!("[udp] receive loop exited");
}
