//! `env_logger` setup shared by the binaries.
//!
//! The library itself only emits through the `log` facade.

use env_logger::{Builder, Env, Target};
use log::LevelFilter;
use std::fs::OpenOptions;

/// Install the process logger.  `RUST_LOG` overrides `level`.  Output is
/// appended to `log_file` when it can be opened, otherwise it goes to stderr.
pub fn init(level: LevelFilter, log_file: &str) {
    let mut builder = Builder::from_env(Env::default().default_filter_or(level.to_string()));

    let mut target = "stderr";
    if !log_file.is_empty() {
        match OpenOptions::new().create(true).append(true).open(log_file) {
            Ok(file) => {
                builder.target(Target::Pipe(Box::new(file)));
                target = log_file;
            }
            Err(e) => eprintln!("cannot open log file {log_file}: {e}; logging to stderr"),
        }
    }

    if builder.try_init().is_ok() {
        log::info!("[log] level {} to {}", level, target);
    }
}
