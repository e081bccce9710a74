use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use duolink_frame::{FrameWriter, TAG_TCP};
use duolink_transport::TcpChannel;
use tracing::debug;

/// Registry of connected reliable-channel peers.
///
/// Holds a write handle per member; all sends go through the one lock, so
/// broadcasts and heartbeat replies to the same connection never interleave
/// mid-frame. Members are added by their connection handler and removed when
/// it exits.
pub struct Room {
    members: Mutex<HashMap<u64, FrameWriter<TcpChannel>>>,
    next_id: AtomicU64,
}

impl Room {
    pub fn new() -> Self {
        Self {
            members: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a connection; returns its member id.
    pub fn join(&self, channel: &TcpChannel) -> duolink_transport::Result<u64> {
        let writer = FrameWriter::new(channel.try_clone()?);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.members().insert(id, writer);
        Ok(id)
    }

    /// Drop a member's write handle.
    pub fn leave(&self, id: u64) {
        self.members().remove(&id);
    }

    /// Send one frame to one member (heartbeat replies).
    pub fn send_to(&self, id: u64, tag: u8, body: &[u8]) {
        if let Some(writer) = self.members().get_mut(&id) {
            if let Err(err) = writer.send(tag, body) {
                debug!(member = id, error = %err, "send failed");
            }
        }
    }

    /// Broadcast a chat body to every member, the sender included.
    ///
    /// Per-member send failures are skipped; the failing member's own
    /// handler notices the dead connection and removes it.
    pub fn broadcast(&self, body: &[u8], from: u64) {
        for (id, writer) in self.members().iter_mut() {
            if let Err(err) = writer.send(TAG_TCP, body) {
                debug!(member = *id, from, error = %err, "broadcast send failed");
            }
        }
    }

    /// Current member count.
    pub fn len(&self) -> usize {
        self.members().len()
    }

    fn members(&self) -> MutexGuard<'_, HashMap<u64, FrameWriter<TcpChannel>>> {
        match self.members.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
