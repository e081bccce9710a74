use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Frame header: tag (1) + length (2, big-endian) = 3 bytes.
pub const HEADER_SIZE: usize = 3;

/// Maximum body size representable by the 2-byte length field.
pub const MAX_BODY: usize = u16::MAX as usize;

/// A framed message.
///
/// Immutable once constructed; built on send, consumed and discarded on
/// receive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// One-byte origin tag.
    pub tag: u8,
    /// The message body.
    pub body: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(tag: u8, body: impl Into<Bytes>) -> Self {
        Self {
            tag,
            body: body.into(),
        }
    }

    /// Total wire size (header + body).
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.body.len()
    }
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────────┬────────────────┬────────────────┐
/// │ Tag (1B) │ Length (2B BE) │ Body           │
/// │          │                │ (Length bytes) │
/// └──────────┴────────────────┴────────────────┘
/// ```
///
/// No padding, no checksum. Text bodies are passed as their UTF-8 bytes.
pub fn encode_frame(tag: u8, body: &[u8], dst: &mut BytesMut) -> Result<()> {
    if body.len() > MAX_BODY {
        return Err(FrameError::PayloadTooLarge {
            size: body.len(),
            max: MAX_BODY,
        });
    }
    dst.reserve(HEADER_SIZE + body.len());
    dst.put_u8(tag);
    dst.put_u16(body.len() as u16);
    dst.put_slice(body);
    Ok(())
}

/// Decode the first frame from a reassembly buffer.
///
/// Returns `None` if the buffer doesn't hold a complete frame yet; this is
/// the expected steady state on a stream, not an error. On success the frame
/// bytes are consumed and any remainder stays in the buffer.
pub fn decode_frame(src: &mut BytesMut) -> Option<Frame> {
    if src.len() < HEADER_SIZE {
        return None;
    }

    let body_len = u16::from_be_bytes([src[1], src[2]]) as usize;
    let total = HEADER_SIZE + body_len;
    if src.len() < total {
        return None;
    }

    let tag = src[0];
    src.advance(HEADER_SIZE);
    let body = src.split_to(body_len).freeze();

    Some(Frame { tag, body })
}

/// Decode exactly one frame from a datagram.
///
/// Datagrams carry one frame each, so a short buffer is a malformed datagram
/// rather than a partial read. Bytes past the declared length are ignored.
pub fn decode_datagram(src: &[u8]) -> Result<Frame> {
    if src.len() < HEADER_SIZE {
        return Err(FrameError::IncompleteHeader {
            available: src.len(),
        });
    }

    let body_len = u16::from_be_bytes([src[1], src[2]]) as usize;
    let total = HEADER_SIZE + body_len;
    if src.len() < total {
        return Err(FrameError::IncompleteBody {
            expected: body_len,
            available: src.len() - HEADER_SIZE,
        });
    }

    Ok(Frame {
        tag: src[0],
        body: Bytes::copy_from_slice(&src[HEADER_SIZE..total]),
    })
}
