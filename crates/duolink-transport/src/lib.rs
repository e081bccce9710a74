//! TCP and UDP channel transports for duolink.
//!
//! The lowest layer of the stack: blocking socket wrappers for the reliable
//! and best-effort channels, the channel identity shared with the link
//! monitor, and the readiness-multiplexing primitive the client loop blocks
//! on.

pub mod channel;
pub mod error;
#[cfg(unix)]
pub mod poll;
pub mod tcp;
pub mod udp;

pub use channel::ChannelId;
pub use error::{Result, TransportError};
#[cfg(unix)]
pub use poll::poll_readable;
pub use tcp::{TcpAcceptor, TcpChannel};
pub use udp::{UdpChannel, UdpEndpoint, MAX_DATAGRAM};
