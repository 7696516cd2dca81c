//! Thread-safe session store with TTL expiry and paced graceful drain.
//!
//! ```text
//!            create_session (ok)
//!   absent ─────────────────────▶ live ──TTL elapsed + sweep──▶ expired
//!                                  │
//!                                  └────────stop() drain──────▶ drained
//! ```
//!
//! `expired` and `drained` are both `absent` again; a later `create_session`
//! starts a fresh session.  Every `live` entry is billed once as `created`
//! and at most once as `deleted`.
//!
//! Lock order is always session map → CDR sink, never the reverse.  Records
//! are appended while the map lock is held so the CDR lines for one IMSI
//! always appear in lifecycle order.  The cost is that readers
//! (`has_session`, `list_active`, and through them `/check_subscriber`) wait
//! out any in-flight CDR write and flush, so a slow CDR destination slows
//! lookups too.  A failing destination does not: the sink drops the record
//! and the sweep or drain carries on.

use crate::cdr::{CdrAction, CdrRecorder};
use crate::config::Config;
use crate::error::PgwError;
use crate::policy::Blacklist;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Admission and lookup, as seen by the UDP workers and the control plane.
pub trait SessionControl: Send + Sync {
    /// Admit `imsi`.  Returns `false` if blacklisted, already live, or the
    /// store has been stopped.
    fn create_session(&self, imsi: &str) -> bool;

    fn has_session(&self, imsi: &str) -> bool;
}

/// Timing parameters for the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Sessions at least this old are removed by the next sweep.
    pub session_timeout: Duration,
    /// Pause between expiry sweeps.
    pub sweep_interval: Duration,
    /// Pause between successive removals during graceful drain.
    pub drain_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_timeout: Duration::from_secs(crate::config::DEFAULT_SESSION_TIMEOUT_SEC),
            sweep_interval: Duration::from_millis(crate::config::DEFAULT_SWEEP_INTERVAL_MS),
            drain_interval: Duration::from_millis(crate::config::DEFAULT_SHUTDOWN_RATE_MS),
        }
    }
}

impl From<&Config> for SessionConfig {
    fn from(config: &Config) -> Self {
        Self {
            session_timeout: config.session_timeout(),
            sweep_interval: config.sweep_interval(),
            drain_interval: config.drain_interval(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Session {
    created_at: Instant,
}

pub struct SessionStore {
    sessions: Mutex<HashMap<String, Session>>,
    blacklist: Arc<Blacklist>,
    cdr: Arc<CdrRecorder>,
    config: SessionConfig,
    stopped: AtomicBool,
    /// Set once on stop; wakes the sweeper out of its interval wait.
    halt: (Mutex<bool>, Condvar),
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl SessionStore {
    pub fn new(config: SessionConfig, blacklist: Arc<Blacklist>, cdr: Arc<CdrRecorder>) -> Self {
        log::info!(
            "[session] timeout {:?}, sweep every {:?}, drain pacing {:?}, {} blacklisted",
            config.session_timeout,
            config.sweep_interval,
            config.drain_interval,
            blacklist.len()
        );
        Self {
            sessions: Mutex::new(HashMap::new()),
            blacklist,
            cdr,
            config,
            stopped: AtomicBool::new(false),
            halt: (Mutex::new(false), Condvar::new()),
            sweeper: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Snapshot of live identifiers, in no particular order.
    pub fn list_active(&self) -> Vec<String> {
        self.lock_sessions().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock_sessions().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_sessions().is_empty()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Remove every session whose age has reached the timeout and bill each
    /// removal.  Returns the number removed.
    pub fn expire_sweep(&self) -> usize {
        let now = Instant::now();
        let timeout = self.config.session_timeout;
        let mut sessions = self.lock_sessions();

        let mut expired = Vec::new();
        sessions.retain(|imsi, session| {
            let live = now.saturating_duration_since(session.created_at) < timeout;
            if !live {
                expired.push(imsi.clone());
            }
            live
        });

        for imsi in &expired {
            log::info!("[session] expired {}", imsi);
            self.cdr.record(imsi, CdrAction::Deleted);
        }
        expired.len()
    }

    /// Start the background expiry sweeper.  A no-op if it is already running
    /// or the store has been stopped.
    pub fn spawn_sweeper(self: &Arc<Self>) -> Result<(), PgwError> {
        let mut slot = self.sweeper.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() || self.is_stopped() {
            return Ok(());
        }
        let store = Arc::clone(self);
        let handle = thread::Builder::new()
            .name("pgw-sweeper".into())
            .spawn(move || store.sweep_loop())?;
        *slot = Some(handle);
        Ok(())
    }

    fn sweep_loop(&self) {
        let (lock, cvar) = &self.halt;
        loop {
            let halted = lock.lock().unwrap_or_else(PoisonError::into_inner);
            let (halted, _) = cvar
                .wait_timeout_while(halted, self.config.sweep_interval, |h| !*h)
                .unwrap_or_else(PoisonError::into_inner);
            if *halted {
                break;
            }
            drop(halted);

            let n = self.expire_sweep();
            if n > 0 {
                log::debug!("[session] sweep removed {} session(s)", n);
            }
        }
        log::debug!("[session] sweeper exited");
    }

    /// Graceful drain.  Stops the sweeper, then removes the remaining sessions
    /// one at a time with `drain_interval` between removals, billing each as
    /// `deleted`.  Returns the number drained; later calls return 0.
    pub fn stop(&self) -> usize {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return 0;
        }

        {
            let (lock, cvar) = &self.halt;
            *lock.lock().unwrap_or_else(PoisonError::into_inner) = true;
            cvar.notify_all();
        }
        let sweeper = self
            .sweeper
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = sweeper {
            if handle.join().is_err() {
                log::error!("[session] sweeper thread panicked");
            }
        }

        // No admission can succeed past this point, so the snapshot is final.
        let pending = self.list_active();
        log::info!("[session] draining {} session(s)", pending.len());

        let mut drained = 0;
        for imsi in &pending {
            if drained > 0 && !self.config.drain_interval.is_zero() {
                thread::sleep(self.config.drain_interval);
            }
            let mut sessions = self.lock_sessions();
            if sessions.remove(imsi).is_some() {
                self.cdr.record(imsi, CdrAction::Deleted);
                drained += 1;
                log::debug!("[session] drained {}", imsi);
            }
        }

        log::info!("[session] SessionStore stopped ({} drained)", drained);
        drained
    }

    fn lock_sessions(&self) -> MutexGuard<'_, HashMap<String, Session>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SessionControl for SessionStore {
    fn create_session(&self, imsi: &str) -> bool {
        if self.blacklist.is_blacklisted(imsi) {
            log::warn!("[session] rejected {}: blacklisted", imsi);
            return false;
        }

        let mut sessions = self.lock_sessions();
        if self.is_stopped() {
            log::warn!("[session] rejected {}: store stopped", imsi);
            return false;
        }
        match sessions.entry(imsi.to_string()) {
            Entry::Occupied(_) => {
                log::warn!("[session] rejected {}: session already exists", imsi);
                false
            }
            Entry::Vacant(slot) => {
                slot.insert(Session {
                    created_at: Instant::now(),
                });
                self.cdr.record(imsi, CdrAction::Created);
                log::info!("[session] created {}", imsi);
                true
            }
        }
    }

    fn has_session(&self, imsi: &str) -> bool {
        self.lock_sessions().contains_key(imsi)
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("live", &self.len())
            .field("stopped", &self.is_stopped())
            .field("config", &self.config)
            .finish()
    }
}
