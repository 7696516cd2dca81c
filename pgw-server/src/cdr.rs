//! Charging data record (CDR) sink.
//!
//! Every session lifecycle event becomes one appended line:
//!
//! ```text
//! 2024-05-01 12:00:00,123456789012345,created
//! 2024-05-01 12:00:30,123456789012345,deleted
//! ```
//!
//! The file handle sits behind its own mutex, independent of the session map,
//! and each line is written with a single `write_all` and flushed before
//! [`CdrRecorder::record`] returns.

use crate::error::PgwError;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

/// Timestamp layout of the first CDR field (local time, second resolution).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CdrAction {
    Created,
    Deleted,
}

impl CdrAction {
    pub fn as_str(self) -> &'static str {
        match self {
            CdrAction::Created => "created",
            CdrAction::Deleted => "deleted",
        }
    }
}

impl fmt::Display for CdrAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Thread-safe, append-only CDR writer.
pub struct CdrRecorder {
    path: PathBuf,
    /// `None` after a failed write; reopened on the next record.
    file: Mutex<Option<File>>,
    written: AtomicU64,
    dropped: AtomicU64,
}

impl CdrRecorder {
    /// Open (create + append) the CDR destination.  Failure here is fatal to
    /// startup.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PgwError> {
        let path = path.as_ref().to_path_buf();
        let file = open_append(&path)?;
        log::info!("[cdr] recording to {}", path.display());
        Ok(Self {
            path,
            file: Mutex::new(Some(file)),
            written: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record.
    ///
    /// Failures are logged here and never reported to the caller.  After a
    /// failed write the handle is discarded; the next call reopens it once and
    /// drops its record if that also fails.
    pub fn record(&self, imsi: &str, action: CdrAction) {
        let line = format_line(imsi, action);
        let mut guard = self.file.lock().unwrap_or_else(PoisonError::into_inner);

        if guard.is_none() {
            match open_append(&self.path) {
                Ok(file) => {
                    log::info!("[cdr] reopened {}", self.path.display());
                    *guard = Some(file);
                }
                Err(e) => {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    log::error!("[cdr] {}; dropped record: {}", e, line.trim_end());
                    return;
                }
            }
        }

        let Some(file) = guard.as_mut() else {
            return;
        };
        match file.write_all(line.as_bytes()).and_then(|_| file.flush()) {
            Ok(()) => {
                self.written.fetch_add(1, Ordering::Relaxed);
                log::info!("[cdr] {}", line.trim_end());
            }
            Err(e) => {
                *guard = None;
                self.dropped.fetch_add(1, Ordering::Relaxed);
                log::error!(
                    "[cdr] write to {} failed: {}; dropped record: {}",
                    self.path.display(),
                    e,
                    line.trim_end()
                );
            }
        }
    }

    /// Records successfully appended since open.
    pub fn written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }

    /// Records lost to write or reopen failures.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for CdrRecorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CdrRecorder")
            .field("path", &self.path)
            .field("written", &self.written())
            .field("dropped", &self.dropped())
            .finish()
    }
}

fn open_append(path: &Path) -> Result<File, PgwError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| PgwError::CdrOpen {
            path: path.to_path_buf(),
            source,
        })
}

fn format_line(imsi: &str, action: CdrAction) -> String {
    format!(
        "{},{},{}\n",
        chrono::Local::now().format(TIMESTAMP_FORMAT),
        imsi,
        action
    )
}
