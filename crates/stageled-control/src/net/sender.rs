//! Bitmap transmission
//!
//! One datagram per frame: `3 x LED_COUNT` bytes of R,G,B in LED order,
//! no header and no length prefix.

use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};

use crate::{error::ControlError, Result};

/// UDP sender for serialized bitmaps
pub struct BitmapSender {
    socket: UdpSocket,
    failing: bool,
}

impl BitmapSender {
    /// Bind an ephemeral local socket
    pub fn new() -> Result<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        tracing::info!("Bitmap sender bound to {}", socket.local_addr()?);

        Ok(Self {
            socket,
            failing: false,
        })
    }

    /// Send one bitmap, returning the number of bytes written
    ///
    /// Failures are logged on the first occurrence and on recovery only,
    /// so a missing remote does not flood the log at frame rate.
    pub fn send(&mut self, bitmap: &[u8], target: SocketAddr) -> Result<usize> {
        match self.socket.send_to(bitmap, target) {
            Ok(sent) => {
                if self.failing {
                    tracing::info!("Transmission to {} recovered", target);
                    self.failing = false;
                }
                tracing::trace!("Sent {} bytes to {}", sent, target);
                Ok(sent)
            }
            Err(e) => {
                if !self.failing {
                    tracing::warn!("Transmission to {} failed: {}", target, e);
                    self.failing = true;
                }
                Err(e.into())
            }
        }
    }

    /// True while the last send failed
    pub fn is_failing(&self) -> bool {
        self.failing
    }
}

/// Resolve a host name and port to the first IPv4/IPv6 address
pub fn resolve_target(host: &str, port: u16) -> Result<SocketAddr> {
    (host, port)
        .to_socket_addrs()
        .map_err(|e| ControlError::InvalidAddress(format!("{}: {}", host, e)))?
        .next()
        .ok_or_else(|| ControlError::InvalidAddress(format!("{}: no address", host)))
}
