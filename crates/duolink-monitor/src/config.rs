use std::time::Duration;

/// Probe-loop tuning for the link monitor.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Time between probe ticks.
    pub probe_interval: Duration,
    /// How long to wait for a probe reply.
    pub probe_timeout: Duration,
    /// Consecutive failures before the active channel flips.
    pub fail_threshold: u32,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            probe_interval: Duration::from_secs(3),
            probe_timeout: Duration::from_secs(1),
            fail_threshold: 3,
        }
    }
}
