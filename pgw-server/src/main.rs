//! Entry point for `pgw-server`.
//!
//! Loads the configuration, installs logging, starts the gateway and serves
//! the control plane until `/stop` or a termination signal.  The gateway's
//! blocking shutdown runs on a blocking thread once HTTP has stopped.

use anyhow::{Context, Result};
use clap::Parser;
use pgw_server::{control, logging, Config, Gateway, SessionControl};
use std::path::PathBuf;
use std::sync::Arc;

/// Packet gateway session admission server.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// JSON configuration file.
    #[arg(default_value = "config.json")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    logging::init(config.log_filter(), &config.log_file);

    let gateway = Gateway::start(&config).context("failed to start gateway")?;

    let http_addr = config.http_addr();
    let listener = match tokio::net::TcpListener::bind(http_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tokio::task::spawn_blocking(move || gateway.shutdown()).await?;
            return Err(e).with_context(|| format!("failed to bind control plane on {http_addr}"));
        }
    };

    let sessions: Arc<dyn SessionControl> = gateway.sessions();
    let (state, stop) = control::channel(sessions);
    control::serve(listener, state, shutdown_signal(stop))
        .await
        .context("control plane error")?;

    let drained = tokio::task::spawn_blocking(move || gateway.shutdown())
        .await
        .context("shutdown task failed")?;
    log::info!("[main] exiting after draining {} session(s)", drained);
    Ok(())
}

/// Resolves on `/stop`, Ctrl-C or SIGTERM.
async fn shutdown_signal(stop: control::StopSignal) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("[main] cannot listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                log::error!("[main] cannot listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = stop.stopped() => log::info!("[main] stop requested over HTTP"),
        _ = ctrl_c => log::info!("[main] interrupted"),
        _ = terminate => log::info!("[main] terminated"),
    }
}
