//! Resilient terminal chat over a dual-channel link.
//!
//! duolink pairs a reliable TCP primary with a best-effort UDP backup. A
//! background link monitor probes whichever channel is active and fails over
//! after sustained probe failures, while the interactive client multiplexes
//! user input and inbound traffic over the active channel.
//!
//! # Crate Structure
//!
//! - [`transport`] — Blocking TCP/UDP channel wrappers and readiness polling
//! - [`frame`] — Tag and length prefixed framing shared by both channels
//! - [`monitor`] — Link-health probing and failover state

/// Re-export transport types.
pub mod transport {
    pub use duolink_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use duolink_frame::*;
}

/// Re-export monitor types.
pub mod monitor {
    pub use duolink_monitor::*;
}
