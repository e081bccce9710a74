use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use bytes::BytesMut;
use duolink_frame::{decode_datagram, encode_frame, is_heartbeat, TAG_UDP};
use duolink_transport::{TransportError, UdpEndpoint, MAX_DATAGRAM};
use tracing::{debug, info, warn};

use crate::cmd::{install_ctrlc, resolve_addr, ServeUdpArgs};
use crate::exit::{io_error, transport_error, CliResult, SUCCESS};

pub fn run(args: ServeUdpArgs) -> CliResult<i32> {
    let addr = resolve_addr(&args.host, args.port)?;
    let endpoint = UdpEndpoint::bind(addr).map_err(|err| transport_error("bind failed", err))?;

    println!(
        "[serve-udp] listening on {} (Ctrl-C to quit)",
        endpoint.local_addr()
    );

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc(Arc::clone(&running))?;

    let mut buf = vec![0u8; MAX_DATAGRAM];
    while running.load(Ordering::SeqCst) {
        let (read, from) = match endpoint.recv_from(&mut buf) {
            Ok(pair) => pair,
            // A signal (Ctrl-C) interrupting the receive is how shutdown
            // arrives; loop so the run flag decides.
            Err(TransportError::Io(err)) if err.kind() == std::io::ErrorKind::Interrupted => {
                continue;
            }
            Err(err) => return Err(transport_error("receive failed", err)),
        };

        let datagram = buf[..read].to_vec();
        let handler = endpoint
            .try_clone()
            .map_err(|err| transport_error("clone failed", err))?;
        thread::Builder::new()
            .name("duolink-dgram".into())
            .spawn(move || handle_datagram(&handler, &datagram, from))
            .map_err(|err| io_error("spawn failed", err))?;
    }

    Ok(SUCCESS)
}

/// Decode one datagram and echo its body back to the source, heartbeats
/// included: a pong is just the heartbeat echoed on the same transport.
fn handle_datagram(endpoint: &UdpEndpoint, datagram: &[u8], from: SocketAddr) {
    let frame = match decode_datagram(datagram) {
        Ok(frame) => frame,
        Err(err) => {
            warn!(%from, error = %err, "malformed datagram dropped");
            return;
        }
    };

    if is_heartbeat(&frame.body) {
        debug!(%from, "heartbeat answered");
    } else {
        info!(%from, size = frame.body.len(), "echoing");
    }

    let mut reply = BytesMut::new();
    if encode_frame(TAG_UDP, &frame.body, &mut reply).is_err() {
        // The body came off the wire, so it always fits the length field.
        return;
    }
    if let Err(err) = endpoint.send_to(&reply, from) {
        debug!(%from, error = %err, "reply send failed");
    }
}
