//! Blocking UDP client for the admission server.

use crate::error::ClientError;
use pgw_server::imsi;
use std::io::ErrorKind;
use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;

/// Pause between attempts after a transient failure.
const RETRY_BACKOFF: Duration = Duration::from_millis(100);

/// Largest reply the server sends is `rejected`; leave room.
const REPLY_BUF: usize = 64;

fn is_transient_io_error(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        ErrorKind::TimedOut
            | ErrorKind::WouldBlock
            | ErrorKind::Interrupted
            | ErrorKind::ConnectionRefused
            | ErrorKind::ConnectionReset
    )
}

#[derive(Debug)]
pub struct UdpClient {
    socket: UdpSocket,
    server: SocketAddr,
    retries: u32,
}

impl UdpClient {
    /// Bind an ephemeral local port and aim it at `server`.
    pub fn connect(server: SocketAddr, timeout: Duration, retries: u32) -> Result<Self, ClientError> {
        let local: SocketAddr = if server.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            (std::net::Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(local)?;
        let timeout = if timeout.is_zero() {
            Duration::from_millis(crate::config::DEFAULT_TIMEOUT_MS)
        } else {
            timeout
        };
        socket.set_read_timeout(Some(timeout))?;
        socket.set_write_timeout(Some(timeout))?;
        Ok(Self {
            socket,
            server,
            retries: retries.max(1),
        })
    }

    /// Encode `imsi`, send it and return the server's reply.
    pub fn request(&self, imsi: &str) -> Result<String, ClientError> {
        let payload = imsi::encode(imsi)?;
        if !imsi::is_well_formed(imsi) {
            return Err(ClientError::InvalidImsi(format!(
                "{imsi:?} is not {} digits",
                imsi::IMSI_LEN
            )));
        }
        let reply = self.exchange(&payload)?;
        Ok(String::from_utf8_lossy(&reply).into_owned())
    }

    /// Send `payload` and wait for one datagram from the server, retrying
    /// transient failures.
    pub fn exchange(&self, payload: &[u8]) -> Result<Vec<u8>, ClientError> {
        let mut buf = [0u8; REPLY_BUF];
        for attempt in 1..=self.retries {
            log::debug!(
                "[client] attempt {}/{}: {} byte(s) to {}",
                attempt,
                self.retries,
                payload.len(),
                self.server
            );
            if let Err(e) = self.socket.send_to(payload, self.server) {
                if is_transient_io_error(&e) {
                    log::warn!("[client] send failed: {}", e);
                    std::thread::sleep(RETRY_BACKOFF);
                    continue;
                }
                return Err(e.into());
            }

            loop {
                match self.socket.recv_from(&mut buf) {
                    Ok((len, from)) if from == self.server => return Ok(buf[..len].to_vec()),
                    Ok((_, from)) => log::debug!("[client] ignoring datagram from {}", from),
                    Err(e) if is_transient_io_error(&e) => {
                        log::warn!("[client] no reply: {}", e);
                        break;
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            if attempt < self.retries {
                std::thread::sleep(RETRY_BACKOFF);
            }
        }
        Err(ClientError::NoResponse {
            server: self.server.to_string(),
            attempts: self.retries,
        })
    }
}
