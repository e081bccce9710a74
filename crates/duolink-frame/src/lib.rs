//! Length-prefixed message framing for the duolink wire protocol.
//!
//! Every message on either channel is framed the same way:
//! - a 1-byte origin tag
//! - a 2-byte big-endian body length
//! - the body
//!
//! The reliable channel additionally needs reassembly, since stream reads do
//! not align with frame boundaries; on the best-effort channel one datagram
//! is one frame.

pub mod codec;
pub mod error;
pub mod reader;
pub mod tag;
pub mod writer;

pub use codec::{decode_datagram, decode_frame, encode_frame, Frame, HEADER_SIZE, MAX_BODY};
pub use error::{FrameError, Result};
pub use reader::{read_frame_exact, FrameReader, Reassembler};
pub use tag::{is_heartbeat, tag_for, tag_name, HEARTBEAT, TAG_TCP, TAG_UDP};
pub use writer::FrameWriter;
