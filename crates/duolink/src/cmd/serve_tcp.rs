use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use duolink_frame::{is_heartbeat, read_frame_exact, FrameError};
use duolink_transport::{TcpAcceptor, TcpChannel, TransportError};
use tracing::{debug, info, warn};

use crate::cmd::{install_ctrlc, resolve_addr, ServeTcpArgs};
use crate::exit::{io_error, transport_error, CliResult, SUCCESS};
use crate::room::Room;

pub fn run(args: ServeTcpArgs) -> CliResult<i32> {
    let addr = resolve_addr(&args.host, args.port)?;
    let acceptor = TcpAcceptor::bind(addr).map_err(|err| transport_error("bind failed", err))?;

    println!(
        "[serve-tcp] listening on {} (Ctrl-C to quit)",
        acceptor.local_addr()
    );

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc(Arc::clone(&running))?;

    let room = Arc::new(Room::new());

    while running.load(Ordering::SeqCst) {
        let (channel, peer) = match acceptor.accept() {
            Ok(pair) => pair,
            // A signal (Ctrl-C) interrupting the accept is how shutdown
            // arrives; loop so the run flag decides.
            Err(TransportError::Accept(err))
                if err.kind() == std::io::ErrorKind::Interrupted =>
            {
                continue;
            }
            Err(err) => return Err(transport_error("accept failed", err)),
        };

        let room = Arc::clone(&room);
        let running = Arc::clone(&running);
        thread::Builder::new()
            .name("duolink-conn".into())
            .spawn(move || serve_connection(channel, peer, &room, &running))
            .map_err(|err| io_error("spawn failed", err))?;
    }

    Ok(SUCCESS)
}

/// Serve one client until it disconnects.
///
/// Heartbeats are answered immediately on the same connection and tag; any
/// other body goes to the room for fan-out.
fn serve_connection(mut channel: TcpChannel, peer: SocketAddr, room: &Room, running: &AtomicBool) {
    let member = match room.join(&channel) {
        Ok(member) => member,
        Err(err) => {
            warn!(%peer, error = %err, "could not register client");
            return;
        }
    };
    info!(%peer, members = room.len(), "client connected");

    while running.load(Ordering::SeqCst) {
        let frame = match read_frame_exact(&mut channel) {
            Ok(frame) => frame,
            Err(FrameError::ConnectionClosed) => break,
            Err(err) => {
                warn!(%peer, error = %err, "receive failed");
                break;
            }
        };

        if is_heartbeat(&frame.body) {
            room.send_to(member, frame.tag, &frame.body);
            continue;
        }

        debug!(%peer, size = frame.body.len(), "broadcasting");
        room.broadcast(&frame.body, member);
    }

    room.leave(member);
    info!(%peer, "client disconnected");
}
