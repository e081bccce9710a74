/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The body exceeds what the 2-byte length field can carry.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// A datagram shorter than the fixed 3-byte frame header.
    #[error("incomplete header ({available} of 3 bytes)")]
    IncompleteHeader { available: usize },

    /// A datagram whose declared body length exceeds the bytes present.
    #[error("incomplete body ({available} of {expected} bytes)")]
    IncompleteBody { expected: usize, available: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
