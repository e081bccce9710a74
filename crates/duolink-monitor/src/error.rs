/// Errors that can occur while setting up or running probes.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] duolink_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] duolink_frame::FrameError),

    /// An I/O error outside the channel layers (thread spawn, raw writes).
    #[error("monitor I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A probe reply arrived but did not carry the heartbeat body.
    #[error("unexpected probe reply body")]
    UnexpectedReply,
}

pub type Result<T> = std::result::Result<T, MonitorError>;
