use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
#[cfg(unix)]
use std::os::fd::{AsRawFd, RawFd};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Result, TransportError};

/// A connected TCP channel — implements Read + Write.
///
/// Cloned handles share the underlying connection, so the link monitor and
/// the client loop can each hold their own reader/writer over one socket.
/// The receive timeout is a property of the shared socket, not of a handle.
pub struct TcpChannel {
    inner: TcpStream,
}

impl TcpChannel {
    /// Connect to a listening peer (blocking).
    pub fn connect(addr: SocketAddr) -> Result<Self> {
        let inner =
            TcpStream::connect(addr).map_err(|source| TransportError::Connect { addr, source })?;
        debug!(%addr, "connected tcp channel");
        Ok(Self { inner })
    }

    pub(crate) fn from_stream(inner: TcpStream) -> Self {
        Self { inner }
    }

    /// Duplicate the handle (new descriptor over the same connection).
    pub fn try_clone(&self) -> Result<Self> {
        let cloned = self.inner.try_clone()?;
        Ok(Self { inner: cloned })
    }

    /// Set the receive timeout for subsequent reads.
    ///
    /// Applies to the shared socket: reads through cloned handles observe
    /// the same timeout.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.inner.set_read_timeout(timeout).map_err(Into::into)
    }

    /// Shut down both directions, forcing a blocked read on any handle of
    /// this connection to return.
    pub fn shutdown_both(&self) -> Result<()> {
        self.inner.shutdown(Shutdown::Both).map_err(Into::into)
    }

    /// Address of the connected peer.
    pub fn peer_addr(&self) -> Result<SocketAddr> {
        self.inner.peer_addr().map_err(Into::into)
    }
}

impl Read for TcpChannel {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Write for TcpChannel {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(unix)]
impl AsRawFd for TcpChannel {
    fn as_raw_fd(&self) -> RawFd {
        self.inner.as_raw_fd()
    }
}

impl std::fmt::Debug for TcpChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpChannel")
            .field("peer", &self.inner.peer_addr().ok())
            .finish()
    }
}

/// Accepts connections for the reliable-channel listener.
pub struct TcpAcceptor {
    listener: TcpListener,
    addr: SocketAddr,
}

impl TcpAcceptor {
    /// Bind and listen (blocking accepts).
    pub fn bind(addr: SocketAddr) -> Result<Self> {
        let listener =
            TcpListener::bind(addr).map_err(|source| TransportError::Bind { addr, source })?;
        let addr = listener.local_addr()?;
        info!(%addr, "listening on tcp");
        Ok(Self { listener, addr })
    }

    /// Accept the next connection (blocking).
    pub fn accept(&self) -> Result<(TcpChannel, SocketAddr)> {
        let (stream, peer) = self.listener.accept().map_err(TransportError::Accept)?;
        debug!(%peer, "accepted tcp connection");
        Ok((TcpChannel::from_stream(stream), peer))
    }

    /// Locally bound address (with the resolved port when bound to port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};

    fn loopback() -> SocketAddr {
        "127.0.0.1:0".parse().expect("loopback addr should parse")
    }

    #[test]
    fn bind_accept_connect_roundtrip() {
        let acceptor = TcpAcceptor::bind(loopback()).expect("acceptor should bind");
        let addr = acceptor.local_addr();

        let handle = std::thread::spawn(move || {
            let mut client = TcpChannel::connect(addr).expect("client should connect");
            client.write_all(b"hello").expect("write should succeed");
        });

        let (mut server, _peer) = acceptor.accept().expect("acceptor should accept");
        let mut buf = [0u8; 5];
        server.read_exact(&mut buf).expect("read should succeed");
        assert_eq!(&buf, b"hello");

        handle.join().expect("client thread should finish");
    }

    #[test]
    fn connect_refused_carries_address() {
        // Bind then drop to get a port that is very likely closed.
        let addr = {
            let acceptor = TcpAcceptor::bind(loopback()).expect("acceptor should bind");
            acceptor.local_addr()
        };

        let err = TcpChannel::connect(addr).expect_err("connect should fail");
        match err {
            TransportError::Connect { addr: failed, .. } => assert_eq!(failed, addr),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn cloned_handle_shares_connection() {
        let acceptor = TcpAcceptor::bind(loopback()).expect("acceptor should bind");
        let addr = acceptor.local_addr();

        let handle = std::thread::spawn(move || {
            let client = TcpChannel::connect(addr).expect("client should connect");
            let mut clone = client.try_clone().expect("clone should succeed");
            clone.write_all(b"via-clone").expect("write should succeed");
        });

        let (mut server, _peer) = acceptor.accept().expect("acceptor should accept");
        let mut buf = [0u8; 9];
        server.read_exact(&mut buf).expect("read should succeed");
        assert_eq!(&buf, b"via-clone");

        handle.join().expect("client thread should finish");
    }

    #[test]
    fn shutdown_unblocks_pending_read() {
        let acceptor = TcpAcceptor::bind(loopback()).expect("acceptor should bind");
        let addr = acceptor.local_addr();

        let client = TcpChannel::connect(addr).expect("client should connect");
        let (_server, _peer) = acceptor.accept().expect("acceptor should accept");

        let mut reading = client.try_clone().expect("clone should succeed");
        let stopper = client.try_clone().expect("clone should succeed");

        let reader = std::thread::spawn(move || {
            let mut buf = [0u8; 16];
            // EOF or an error, either way the read must return.
            let _ = reading.read(&mut buf);
        });

        std::thread::sleep(Duration::from_millis(50));
        stopper.shutdown_both().expect("shutdown should succeed");
        reader.join().expect("blocked read should have returned");
    }
}
