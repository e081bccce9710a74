use std::io::{ErrorKind, Read, Write};
use std::os::fd::AsRawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use duolink_frame::{
    decode_datagram, encode_frame, is_heartbeat, tag_for, FrameError, FrameReader, FrameWriter,
};
use duolink_monitor::{LinkMonitor, LinkState, MonitorConfig};
use duolink_transport::{poll_readable, ChannelId, TcpChannel, UdpChannel, MAX_DATAGRAM};
use tracing::{debug, warn};

use crate::cmd::{install_ctrlc, parse_duration, resolve_addr, ClientArgs};
use crate::exit::{io_error, monitor_error, transport_error, CliResult, SUCCESS};

/// Idle wait per poll round; bounds how long a Ctrl-C can go unnoticed.
const POLL_TICK: Duration = Duration::from_millis(500);

/// Re-check cadence while the reliable channel is dead but still nominally
/// active. Its descriptor would report readable forever, so it is left out
/// of the poll set until the monitor fails over.
const DEAD_CHANNEL_TICK: Duration = Duration::from_millis(200);

/// Matches the buffer capacity of the locked stdin handle, so reads bypass
/// its internal buffering and poll readiness stays in sync with what has
/// actually been consumed.
const INPUT_CHUNK: usize = 8 * 1024;

pub fn run(args: ClientArgs) -> CliResult<i32> {
    let config = MonitorConfig {
        probe_interval: parse_duration(&args.probe_interval)?,
        probe_timeout: parse_duration(&args.probe_timeout)?,
        fail_threshold: args.fail_threshold,
    };

    let tcp_addr = resolve_addr(&args.host, args.tcp_port)?;
    let udp_addr = resolve_addr(&args.host, args.udp_port)?;

    let tcp =
        TcpChannel::connect(tcp_addr).map_err(|err| transport_error("connect failed", err))?;
    let udp =
        UdpChannel::connect(udp_addr).map_err(|err| transport_error("udp setup failed", err))?;

    // The monitor probes over its own clones; the session's handles can come
    // and go without pulling a socket out from under an in-flight probe.
    let monitor = LinkMonitor::spawn(
        tcp.try_clone()
            .map_err(|err| transport_error("clone failed", err))?,
        udp.try_clone()
            .map_err(|err| transport_error("clone failed", err))?,
        config,
        Some(Box::new(|channel: ChannelId| {
            println!("\n[monitor] active channel switched to {channel}");
        })),
    )
    .map_err(|err| monitor_error("monitor start failed", err))?;

    println!(
        "[client] connected to {} (tcp:{} / udp:{}) - Ctrl-D or Ctrl-C to quit",
        args.host, args.tcp_port, args.udp_port
    );

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc(Arc::clone(&running))?;

    let state = monitor.state();
    let session = run_session(args.nick.as_deref(), tcp, udp, &state, &running);

    println!("\n[client] shutting down");
    monitor.join();

    session.map(|()| SUCCESS)
}

/// The dual-channel event loop: block until stdin or the active channel is
/// readable, then service input first and inbound traffic second. Ends on
/// end-of-input or interrupt; transport faults degrade, they never abort.
fn run_session(
    nick: Option<&str>,
    tcp: TcpChannel,
    udp: UdpChannel,
    state: &LinkState,
    running: &AtomicBool,
) -> CliResult<()> {
    let stdin = std::io::stdin();
    let stdin_fd = stdin.as_raw_fd();
    let tcp_fd = tcp.as_raw_fd();
    let udp_fd = udp.as_raw_fd();

    let mut tcp_reader = FrameReader::new(
        tcp.try_clone()
            .map_err(|err| transport_error("clone failed", err))?,
    );
    let mut tcp_writer = FrameWriter::new(tcp);
    let mut tcp_down = false;

    let mut handle = stdin.lock();
    let mut input = InputLines::new();
    let mut dgram = vec![0u8; MAX_DATAGRAM];
    let mut need_prompt = true;

    while running.load(Ordering::SeqCst) {
        if need_prompt {
            prompt();
            need_prompt = false;
        }

        let polled = state.active();
        let (fds, tick) = match polled {
            ChannelId::Tcp if tcp_down => (vec![stdin_fd], DEAD_CHANNEL_TICK),
            ChannelId::Tcp => (vec![stdin_fd, tcp_fd], POLL_TICK),
            ChannelId::Udp => (vec![stdin_fd, udp_fd], POLL_TICK),
        };

        let ready =
            poll_readable(&fds, Some(tick)).map_err(|err| transport_error("poll failed", err))?;
        if !running.load(Ordering::SeqCst) {
            break;
        }

        // 1) User input first.
        if ready[0] {
            let open = input
                .fill_once(&mut handle)
                .map_err(|err| io_error("stdin read failed", err))?;
            while let Some(line) = input.next_line() {
                send_line(&line, nick, state.active(), &mut tcp_writer, &udp);
                need_prompt = true;
            }
            if !open {
                // End of input: flush any unterminated final line, then
                // shut down the ordinary way.
                if let Some(line) = input.take_remainder() {
                    send_line(&line, nick, state.active(), &mut tcp_writer, &udp);
                }
                break;
            }
        }

        let channel_ready = ready.len() > 1 && ready[1];

        // 2) Reliable channel, only while it is still the active one.
        if polled == ChannelId::Tcp && channel_ready && state.active() == ChannelId::Tcp {
            match drain_tcp(&mut tcp_reader) {
                Ok(rendered) => need_prompt |= rendered,
                Err(err) => {
                    // Peer closure or a read fault. Not fatal to the session;
                    // the monitor notices persistent trouble and fails over.
                    warn!(error = %err, "reliable channel fault");
                    tcp_down = true;
                }
            }
        }

        // 3) Best-effort channel.
        if polled == ChannelId::Udp && channel_ready && state.active() == ChannelId::Udp {
            need_prompt |= recv_udp(&udp, &mut dgram);
        }
    }

    Ok(())
}

/// Poll-friendly line splitter over stdin.
///
/// One read syscall per readable event, then complete lines drained from the
/// buffer, so readiness on the descriptor always matches pending input. A
/// line-buffered reader would strand lines in userspace where poll cannot
/// see them.
struct InputLines {
    buf: Vec<u8>,
}

impl InputLines {
    fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// One read off the input; `false` means end of input.
    fn fill_once(&mut self, input: &mut impl Read) -> std::io::Result<bool> {
        let mut chunk = [0u8; INPUT_CHUNK];
        let read = loop {
            match input.read(&mut chunk) {
                Ok(read) => break read,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        };
        if read == 0 {
            return Ok(false);
        }
        self.buf.extend_from_slice(&chunk[..read]);
        Ok(true)
    }

    /// Next complete line, without its line ending.
    fn next_line(&mut self) -> Option<String> {
        let end = self.buf.iter().position(|&byte| byte == b'\n')?;
        let line: Vec<u8> = self.buf.drain(..=end).take(end).collect();
        Some(strip_carriage_return(line))
    }

    /// Whatever is left after end of input, if anything.
    fn take_remainder(&mut self) -> Option<String> {
        if self.buf.is_empty() {
            return None;
        }
        Some(strip_carriage_return(std::mem::take(&mut self.buf)))
    }
}

fn strip_carriage_return(mut line: Vec<u8>) -> String {
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    String::from_utf8_lossy(&line).into_owned()
}

/// Frame a line with the active channel's tag and send it there.
///
/// Send failures are swallowed: the user interface does not retry, the
/// monitor's probing reacts to the underlying fault. Oversized lines are the
/// exception and are reported, since no failover can ever deliver them.
fn send_line(
    line: &str,
    nick: Option<&str>,
    active: ChannelId,
    tcp_writer: &mut FrameWriter<TcpChannel>,
    udp: &UdpChannel,
) {
    if line.is_empty() {
        return;
    }
    let body = format_outgoing(nick, line);
    let tag = tag_for(active);

    match active {
        ChannelId::Tcp => match tcp_writer.send(tag, &body) {
            Ok(()) => {}
            Err(err @ FrameError::PayloadTooLarge { .. }) => warn!(error = %err, "line not sent"),
            Err(err) => debug!(error = %err, "tcp send failed"),
        },
        ChannelId::Udp => {
            let mut buf = BytesMut::new();
            match encode_frame(tag, &body, &mut buf) {
                Ok(()) => {
                    if let Err(err) = udp.send(&buf) {
                        debug!(error = %err, "udp send failed");
                    }
                }
                Err(err) => warn!(error = %err, "line not sent"),
            }
        }
    }
}

/// One read off the reliable channel, then drain every completed frame.
/// Returns whether anything was rendered.
fn drain_tcp(reader: &mut FrameReader<TcpChannel>) -> duolink_frame::Result<bool> {
    if reader.fill_once()? == 0 {
        return Err(FrameError::ConnectionClosed);
    }
    let mut rendered = false;
    while let Some(frame) = reader.try_extract() {
        rendered |= render(&frame.body);
    }
    Ok(rendered)
}

/// One datagram off the best-effort channel. Malformed datagrams are dropped
/// quietly; loss is routine on this channel.
fn recv_udp(udp: &UdpChannel, buf: &mut [u8]) -> bool {
    let read = match udp.recv(buf) {
        Ok(read) => read,
        Err(err) => {
            debug!(error = %err, "udp receive failed");
            return false;
        }
    };
    match decode_datagram(&buf[..read]) {
        Ok(frame) => render(&frame.body),
        Err(err) => {
            debug!(error = %err, "malformed datagram dropped");
            false
        }
    }
}

fn render(body: &[u8]) -> bool {
    match display_line(body) {
        Some(line) => {
            println!("\n← {line}");
            true
        }
        None => false,
    }
}

/// The text to show for an inbound body, or `None` for monitor traffic.
fn display_line(body: &[u8]) -> Option<String> {
    if is_heartbeat(body) {
        return None;
    }
    Some(String::from_utf8_lossy(body).into_owned())
}

fn format_outgoing(nick: Option<&str>, line: &str) -> Vec<u8> {
    match nick {
        Some(nick) => format!("{nick}: {line}").into_bytes(),
        None => line.as_bytes().to_vec(),
    }
}

fn prompt() {
    print!("→ ");
    let _ = std::io::stdout().flush();
}
