//! Bounded FIFO between the UDP receive loop and the worker pool.
//!
//! One producer (the receive loop) pushes, many workers pop.  Workers block on
//! a condition variable; [`DispatchQueue::close`] wakes them all, and each
//! keeps popping until the queue is both closed and empty.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// One received datagram awaiting processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Raw (still BCD-encoded) payload.
    pub payload: Vec<u8>,
    /// Where the reply goes.
    pub peer: SocketAddr,
}

#[derive(Debug)]
struct QueueInner {
    items: VecDeque<Request>,
    closed: bool,
}

#[derive(Debug)]
pub struct DispatchQueue {
    inner: Mutex<QueueInner>,
    ready: Condvar,
    capacity: usize,
}

impl DispatchQueue {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Mutex::new(QueueInner {
                items: VecDeque::with_capacity(capacity.min(4096)),
                closed: false,
            }),
            ready: Condvar::new(),
            capacity,
        }
    }

    /// Enqueue and wake one waiting worker.  Returns `false`, dropping the
    /// request, if the queue is full or closed.
    pub fn push(&self, request: Request) -> bool {
        let mut inner = self.lock();
        if inner.closed || inner.items.len() >= self.capacity {
            return false;
        }
        inner.items.push_back(request);
        drop(inner);
        self.ready.notify_one();
        true
    }

    /// Block until a request is available.  Returns `None` once the queue is
    /// closed and drained.
    pub fn pop(&self) -> Option<Request> {
        let mut inner = self.lock();
        loop {
            if let Some(request) = inner.items.pop_front() {
                return Some(request);
            }
            if inner.closed {
                return None;
            }
            inner = self
                .ready
                .wait(inner)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Refuse further pushes and wake every waiter.
    pub fn close(&self) {
        self.lock().closed = true;
        self.ready.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock(&self) -> MutexGuard<'_, QueueInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
