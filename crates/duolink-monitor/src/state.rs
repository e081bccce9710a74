use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};

use duolink_transport::ChannelId;

const CHANNEL_TCP: u8 = 0;
const CHANNEL_UDP: u8 = 1;

/// Shared failover state.
///
/// Only the monitor thread records probe outcomes; the client loop and tests
/// read through the accessors. The active channel starts on the reliable
/// side.
#[derive(Debug)]
pub struct LinkState {
    active: AtomicU8,
    fail_count: AtomicU32,
    fail_threshold: u32,
}

impl LinkState {
    pub fn new(fail_threshold: u32) -> Self {
        Self {
            active: AtomicU8::new(CHANNEL_TCP),
            fail_count: AtomicU32::new(0),
            fail_threshold,
        }
    }

    /// The channel currently designated for user traffic.
    pub fn active(&self) -> ChannelId {
        match self.active.load(Ordering::SeqCst) {
            CHANNEL_UDP => ChannelId::Udp,
            _ => ChannelId::Tcp,
        }
    }

    /// Consecutive probe failures on the active channel.
    pub fn fail_count(&self) -> u32 {
        self.fail_count.load(Ordering::SeqCst)
    }

    /// Record a successful probe, clearing the failure streak.
    pub fn probe_succeeded(&self) {
        self.fail_count.store(0, Ordering::SeqCst);
    }

    /// Record a failed probe.
    ///
    /// At the threshold the active channel flips, the streak resets, and the
    /// new channel is returned so the caller can notify.
    pub fn probe_failed(&self) -> Option<ChannelId> {
        let failures = self.fail_count.fetch_add(1, Ordering::SeqCst) + 1;
        if failures < self.fail_threshold {
            return None;
        }

        let next = self.active().other();
        self.set_active(next);
        self.fail_count.store(0, Ordering::SeqCst);
        Some(next)
    }

    fn set_active(&self, channel: ChannelId) {
        let raw = match channel {
            ChannelId::Tcp => CHANNEL_TCP,
            ChannelId::Udp => CHANNEL_UDP,
        };
        self.active.store(raw, Ordering::SeqCst);
    }
}
