//! UDP socket lifecycle for the admission server.
//!
//! [`Transport`] owns a blocking `std::net::UdpSocket` with a receive timeout
//! so the receive loop can notice shutdown promptly.  [`Transport::wake`]
//! sends an empty datagram to the socket's own address to unblock a pending
//! receive.  The descriptor is closed when the transport is dropped.

use crate::error::PgwError;
use std::io::ErrorKind;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use std::time::Duration;

/// Largest request payload the server reads.
pub const MAX_PAYLOAD: usize = 256;

/// Default bound on a single blocking receive.
pub const RECV_TIMEOUT: Duration = Duration::from_millis(250);

#[derive(Debug)]
pub struct Transport {
    socket: UdpSocket,
    local_addr: SocketAddr,
}

/// Returns true if the error just means "nothing arrived in time".
fn is_idle(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
    )
}

impl Transport {
    /// Bind to `addr` and apply `recv_timeout` to every receive.
    ///
    /// Port 0 lets the OS choose; [`Transport::local_addr`] reports the result.
    pub fn bind(addr: SocketAddr, recv_timeout: Duration) -> Result<Self, PgwError> {
        let socket = UdpSocket::bind(addr).map_err(|source| PgwError::Bind {
            addr: addr.to_string(),
            source,
        })?;
        let timeout = if recv_timeout.is_zero() {
            RECV_TIMEOUT
        } else {
            recv_timeout
        };
        socket.set_read_timeout(Some(timeout))?;
        let local_addr = socket.local_addr()?;
        log::info!("[udp] bound {}", local_addr);
        Ok(Self { socket, local_addr })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Receive one datagram into `buf`.
    ///
    /// Returns `Ok(None)` when the timeout elapses with nothing received.
    pub fn recv_from(&self, buf: &mut [u8]) -> std::io::Result<Option<(usize, SocketAddr)>> {
        match self.socket.recv_from(buf) {
            Ok(received) => Ok(Some(received)),
            Err(e) if is_idle(&e) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn send_to(&self, bytes: &[u8], peer: SocketAddr) -> std::io::Result<usize> {
        self.socket.send_to(bytes, peer)
    }

    /// Send an empty datagram to ourselves to unblock a pending receive.
    pub fn wake(&self) {
        let target = self.wake_addr();
        if let Err(e) = self.socket.send_to(&[], target) {
            log::debug!("[udp] wake datagram to {} failed: {}", target, e);
        }
    }

    /// Our own address, with the unspecified IP replaced by loopback.
    fn wake_addr(&self) -> SocketAddr {
        let ip = match self.local_addr.ip() {
            IpAddr::V4(ip) if ip.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST),
            IpAddr::V6(ip) if ip.is_unspecified() => IpAddr::V6(Ipv6Addr::LOCALHOST),
            ip => ip,
        };
        SocketAddr::new(ip, self.local_addr.port())
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        log::info!("[udp] closed {}", self.local_addr);
    }
}
