//! Entry point for `pgw-client`.

use anyhow::{Context, Result};
use clap::Parser;
use pgw_client::{ClientConfig, UdpClient};
use pgw_server::logging;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Send an IMSI to the PGW admission server.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// 15-digit IMSI.
    imsi: String,
    /// Client configuration file.
    #[arg(short, long, default_value = "client_config.json")]
    config: PathBuf,
    /// Server address, overriding the config (e.g. 127.0.0.1:9000).
    #[arg(short, long)]
    server: Option<SocketAddr>,
    /// Attempts before giving up.
    #[arg(short, long)]
    retries: Option<u32>,
    /// Per-attempt reply timeout in milliseconds.
    #[arg(short, long)]
    timeout_ms: Option<u64>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = ClientConfig::load(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    logging::init(config.log_filter(), &config.log_file);

    let server = match cli.server {
        Some(addr) => addr,
        None => config.server_addr().context("bad server address in config")?,
    };
    let timeout = cli
        .timeout_ms
        .map(Duration::from_millis)
        .unwrap_or_else(|| config.timeout());
    let retries = cli.retries.unwrap_or(config.retries);

    let client = UdpClient::connect(server, timeout, retries).context("failed to open UDP socket")?;
    log::info!("[client] sending {} to {}", cli.imsi, server);
    let reply = client
        .request(&cli.imsi)
        .with_context(|| format!("request for {} failed", cli.imsi))?;
    log::info!("[client] {} -> {}", cli.imsi, reply);
    println!("Response: {reply}");
    Ok(())
}
