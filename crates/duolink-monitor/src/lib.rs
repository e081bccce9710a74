//! Link-health monitoring and channel failover.
//!
//! A background thread probes whichever channel currently carries user
//! traffic with heartbeat frames. A streak of failed probes flips the active
//! channel to the alternate transport; a single dropped packet never does,
//! since loss is routine on the best-effort channel. Only the active channel
//! is probed, keeping probe traffic minimal and tying the failover decision
//! to the channel users actually depend on.

pub mod config;
pub mod error;
pub mod monitor;
pub mod state;

pub use config::MonitorConfig;
pub use error::{MonitorError, Result};
pub use monitor::{LinkMonitor, SwitchCallback};
pub use state::LinkState;
