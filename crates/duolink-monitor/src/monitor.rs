use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use bytes::BytesMut;
use duolink_frame::{
    decode_datagram, encode_frame, is_heartbeat, read_frame_exact, tag_for, HEARTBEAT,
};
use duolink_transport::{ChannelId, TcpChannel, UdpChannel};
use tracing::{debug, info};

use crate::config::MonitorConfig;
use crate::error::{MonitorError, Result};
use crate::state::LinkState;

/// Callback invoked on the monitor thread after each channel switch.
pub type SwitchCallback = Box<dyn Fn(ChannelId) + Send>;

/// Probe replies are small; a racing oversized chat frame decodes as a
/// mismatched body and counts as a failed probe either way.
const PROBE_REPLY_BUF: usize = 512;

/// Background link-health monitor.
///
/// Probes the active channel with heartbeats and fails over to the alternate
/// channel after a streak of failed probes. Owns its thread: `stop()` then
/// `join()` during session teardown, before the channel handles are closed,
/// so no probe races a closing socket.
pub struct LinkMonitor {
    state: Arc<LinkState>,
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
}

struct Shared {
    running: AtomicBool,
    /// Handles used only by `stop()` to force a blocked probe receive to
    /// return; the probe loop owns its own clones.
    stop_tcp: TcpChannel,
    stop_udp: UdpChannel,
    pacer: Pacer,
}

/// Wakeable inter-probe sleep.
///
/// The stop flag lives under the mutex so a wake issued just before the
/// sleeper starts waiting is never missed.
struct Pacer {
    stopped: Mutex<bool>,
    cond: Condvar,
}

impl Pacer {
    fn new() -> Self {
        Self {
            stopped: Mutex::new(false),
            cond: Condvar::new(),
        }
    }

    fn sleep(&self, duration: Duration) {
        let guard = match self.stopped.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let _ = self
            .cond
            .wait_timeout_while(guard, duration, |stopped| !*stopped);
    }

    fn wake(&self) {
        let mut guard = match self.stopped.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = true;
        self.cond.notify_all();
    }
}

impl LinkMonitor {
    /// Start probing on a background thread.
    ///
    /// The channels are typically clones of the handles the interactive
    /// session uses; sends need no coordination and receive contention is
    /// resolved by socket-level delivery.
    pub fn spawn(
        tcp: TcpChannel,
        udp: UdpChannel,
        config: MonitorConfig,
        on_switch: Option<SwitchCallback>,
    ) -> Result<Self> {
        let state = Arc::new(LinkState::new(config.fail_threshold));
        let shared = Arc::new(Shared {
            running: AtomicBool::new(true),
            stop_tcp: tcp.try_clone()?,
            stop_udp: udp.try_clone()?,
            pacer: Pacer::new(),
        });

        let handle = {
            let state = Arc::clone(&state);
            let shared = Arc::clone(&shared);
            std::thread::Builder::new()
                .name("duolink-monitor".into())
                .spawn(move || probe_loop(&state, &shared, &config, on_switch, tcp, udp))?
        };

        Ok(Self {
            state,
            shared,
            handle: Some(handle),
        })
    }

    /// The channel currently designated for user traffic.
    pub fn active(&self) -> ChannelId {
        self.state.active()
    }

    /// Consecutive probe failures so far.
    pub fn fail_count(&self) -> u32 {
        self.state.fail_count()
    }

    /// Shared state handle for readers that outlive a borrow of the monitor.
    pub fn state(&self) -> Arc<LinkState> {
        Arc::clone(&self.state)
    }

    /// Stop the probe loop and unblock any in-flight receive.
    ///
    /// Safe to call from any thread; repeated calls are no-ops. Does not
    /// rely on the probe timeout: a sleeping tick is woken through the
    /// pacer, a receive blocked on the reliable channel through a socket
    /// shutdown, and one blocked on the best-effort channel through a
    /// zero-length self-addressed datagram.
    pub fn stop(&self) {
        if self.shared.running.swap(false, Ordering::SeqCst) {
            self.shared.pacer.wake();
            if let Err(err) = self.shared.stop_tcp.shutdown_both() {
                debug!(error = %err, "tcp shutdown during stop");
            }
            if let Err(err) = self.shared.stop_udp.unblock() {
                debug!(error = %err, "udp unblock during stop");
            }
        }
    }

    /// Stop and wait for the probe thread to finish.
    pub fn join(mut self) {
        self.stop();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for LinkMonitor {
    fn drop(&mut self) {
        self.stop();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn probe_loop(
    state: &LinkState,
    shared: &Shared,
    config: &MonitorConfig,
    on_switch: Option<SwitchCallback>,
    mut tcp: TcpChannel,
    udp: UdpChannel,
) {
    while shared.running.load(Ordering::SeqCst) {
        let started = Instant::now();
        let active = state.active();

        let outcome = match active {
            ChannelId::Tcp => probe_tcp(&mut tcp, config.probe_timeout),
            ChannelId::Udp => probe_udp(&udp, config.probe_timeout),
        };

        // A probe unblocked by stop() fails by construction; don't let it
        // count against the channel.
        if !shared.running.load(Ordering::SeqCst) {
            break;
        }

        match outcome {
            Ok(()) => {
                debug!(channel = %active, "probe ok");
                state.probe_succeeded();
            }
            Err(err) => {
                debug!(channel = %active, error = %err, "probe failed");
                if let Some(next) = state.probe_failed() {
                    info!(from = %active, to = %next, "active channel switched");
                    if let Some(callback) = &on_switch {
                        callback(next);
                    }
                }
            }
        }

        if let Some(remaining) = config.probe_interval.checked_sub(started.elapsed()) {
            shared.pacer.sleep(remaining);
        }
    }
    debug!("probe loop stopped");
}

/// One reliable-channel probe: framed heartbeat out, one frame back within
/// the timeout. Any frame counts; a chat reply racing the pong is still
/// proof of life.
fn probe_tcp(tcp: &mut TcpChannel, timeout: Duration) -> Result<()> {
    tcp.set_read_timeout(Some(timeout))?;

    let mut ping = BytesMut::new();
    encode_frame(tag_for(ChannelId::Tcp), HEARTBEAT, &mut ping)?;
    tcp.write_all(&ping)?;

    read_frame_exact(tcp)?;
    Ok(())
}

/// One best-effort probe: heartbeat datagram out, a datagram whose decoded
/// body equals the heartbeat back within the timeout.
fn probe_udp(udp: &UdpChannel, timeout: Duration) -> Result<()> {
    udp.set_read_timeout(Some(timeout))?;

    let mut ping = BytesMut::new();
    encode_frame(tag_for(ChannelId::Udp), HEARTBEAT, &mut ping)?;
    udp.send(&ping)?;

    let mut reply = [0u8; PROBE_REPLY_BUF];
    let read = udp.recv(&mut reply)?;
    let frame = decode_datagram(&reply[..read])?;
    if !is_heartbeat(&frame.body) {
        return Err(MonitorError::UnexpectedReply);
    }
    Ok(())
}
