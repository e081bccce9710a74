use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
#[cfg(unix)]
use std::os::fd::{AsRawFd, RawFd};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Result, TransportError};

/// Largest datagram the channels will send or receive.
pub const MAX_DATAGRAM: usize = 65_535;

/// Client-side datagram channel with a fixed peer.
///
/// Bound to an ephemeral local port. Receives accept any source address;
/// replies and probe responses arrive from the server's own socket.
pub struct UdpChannel {
    socket: UdpSocket,
    peer: SocketAddr,
}

impl UdpChannel {
    /// Bind an ephemeral local socket directed at `peer`.
    pub fn connect(peer: SocketAddr) -> Result<Self> {
        let local = unspecified_for(peer);
        let socket =
            UdpSocket::bind(local).map_err(|source| TransportError::Bind { addr: local, source })?;
        debug!(%peer, "bound udp channel");
        Ok(Self { socket, peer })
    }

    /// Send one datagram to the peer.
    pub fn send(&self, buf: &[u8]) -> Result<usize> {
        self.socket.send_to(buf, self.peer).map_err(Into::into)
    }

    /// Receive one datagram from any source (blocking, honors the receive
    /// timeout).
    pub fn recv(&self, buf: &mut [u8]) -> Result<usize> {
        let (read, _from) = self.socket.recv_from(buf)?;
        Ok(read)
    }

    /// Set the receive timeout for subsequent receives.
    ///
    /// Like the TCP channel, the timeout lives on the shared socket.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.socket.set_read_timeout(timeout).map_err(Into::into)
    }

    /// Duplicate the handle (new descriptor over the same socket).
    pub fn try_clone(&self) -> Result<Self> {
        let socket = self.socket.try_clone()?;
        Ok(Self {
            socket,
            peer: self.peer,
        })
    }

    /// Wake a receive blocked on this socket by sending it a zero-length
    /// datagram addressed to itself.
    pub fn unblock(&self) -> Result<()> {
        let local = self.socket.local_addr()?;
        // An unspecified bind address is not routable; aim at loopback on
        // the bound port instead.
        let target = if local.ip().is_unspecified() {
            let loopback: IpAddr = match local {
                SocketAddr::V4(_) => Ipv4Addr::LOCALHOST.into(),
                SocketAddr::V6(_) => Ipv6Addr::LOCALHOST.into(),
            };
            SocketAddr::new(loopback, local.port())
        } else {
            local
        };
        self.socket.send_to(&[], target)?;
        Ok(())
    }

    /// The fixed peer address.
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }
}

#[cfg(unix)]
impl AsRawFd for UdpChannel {
    fn as_raw_fd(&self) -> RawFd {
        self.socket.as_raw_fd()
    }
}

impl std::fmt::Debug for UdpChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UdpChannel").field("peer", &self.peer).finish()
    }
}

/// Server-side datagram endpoint.
pub struct UdpEndpoint {
    socket: UdpSocket,
    addr: SocketAddr,
}

impl UdpEndpoint {
    /// Bind the endpoint.
    pub fn bind(addr: SocketAddr) -> Result<Self> {
        let socket =
            UdpSocket::bind(addr).map_err(|source| TransportError::Bind { addr, source })?;
        let addr = socket.local_addr()?;
        info!(%addr, "listening on udp");
        Ok(Self { socket, addr })
    }

    /// Receive one datagram (blocking).
    pub fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr)> {
        self.socket.recv_from(buf).map_err(Into::into)
    }

    /// Send one datagram to `target`.
    pub fn send_to(&self, buf: &[u8], target: SocketAddr) -> Result<usize> {
        self.socket.send_to(buf, target).map_err(Into::into)
    }

    /// Duplicate the handle, e.g. for a per-datagram handler thread.
    pub fn try_clone(&self) -> Result<Self> {
        let socket = self.socket.try_clone()?;
        Ok(Self {
            socket,
            addr: self.addr,
        })
    }

    /// Locally bound address (with the resolved port when bound to port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }
}

fn unspecified_for(peer: SocketAddr) -> SocketAddr {
    let ip: IpAddr = match peer {
        SocketAddr::V4(_) => Ipv4Addr::UNSPECIFIED.into(),
        SocketAddr::V6(_) => Ipv6Addr::UNSPECIFIED.into(),
    };
    SocketAddr::new(ip, 0)
}
