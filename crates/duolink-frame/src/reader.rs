use std::io::{ErrorKind, Read};

use bytes::BytesMut;

use crate::codec::{decode_frame, Frame, HEADER_SIZE};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Incremental frame extraction from a byte stream.
///
/// Stream reads don't align with frame boundaries: a read may return part of
/// a frame or several frames back to back. Feed whatever arrived, then drain
/// [`try_extract`](Self::try_extract) until it returns `None`.
#[derive(Debug, Default)]
pub struct Reassembler {
    buf: BytesMut,
}

impl Reassembler {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
        }
    }

    /// Append raw stream bytes.
    pub fn feed(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Extract the next complete frame, if one is buffered.
    ///
    /// `None` means "need more data", not an error.
    pub fn try_extract(&mut self) -> Option<Frame> {
        decode_frame(&mut self.buf)
    }

    /// Bytes currently buffered.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }
}

/// Reads complete frames from any `Read` stream.
///
/// Wraps a [`Reassembler`]. Callers either block for whole frames with
/// [`read_frame`](Self::read_frame), or pump one read at a time with
/// [`fill_once`](Self::fill_once) + [`try_extract`](Self::try_extract) when
/// multiplexing the stream with other event sources.
pub struct FrameReader<T> {
    inner: T,
    reassembler: Reassembler,
}

impl<T: Read> FrameReader<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            reassembler: Reassembler::new(),
        }
    }

    /// Perform one read into the reassembly buffer.
    ///
    /// Returns the number of bytes read; 0 means the peer closed.
    pub fn fill_once(&mut self) -> Result<usize> {
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        let read = loop {
            match self.inner.read(&mut chunk) {
                Ok(read) => break read,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        };
        self.reassembler.feed(&chunk[..read]);
        Ok(read)
    }

    /// Extract the next buffered frame, if any.
    pub fn try_extract(&mut self) -> Option<Frame> {
        self.reassembler.try_extract()
    }

    /// Read the next complete frame (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached.
    pub fn read_frame(&mut self) -> Result<Frame> {
        loop {
            if let Some(frame) = self.try_extract() {
                return Ok(frame);
            }
            if self.fill_once()? == 0 {
                return Err(FrameError::ConnectionClosed);
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

/// Read exactly one frame with two exact-length reads: the 3-byte header,
/// then the declared body.
///
/// The alternative to buffered reassembly for single-frame-at-a-time callers
/// (server connection handlers, monitor probes). EOF before a whole frame
/// arrives is `ConnectionClosed`.
pub fn read_frame_exact<T: Read>(stream: &mut T) -> Result<Frame> {
    let mut header = [0u8; HEADER_SIZE];
    read_exact(stream, &mut header)?;

    let body_len = u16::from_be_bytes([header[1], header[2]]) as usize;
    let mut body = vec![0u8; body_len];
    read_exact(stream, &mut body)?;

    Ok(Frame::new(header[0], body))
}

fn read_exact<T: Read>(stream: &mut T, buf: &mut [u8]) -> Result<()> {
    match stream.read_exact(buf) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::UnexpectedEof => Err(FrameError::ConnectionClosed),
        Err(err) => Err(FrameError::Io(err)),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::codec::encode_frame;
    use crate::tag::{TAG_TCP, TAG_UDP};

    #[test]
    fn reassembler_partial_then_complete() {
        let mut wire = BytesMut::new();
        encode_frame(TAG_TCP, b"split", &mut wire).unwrap();

        let mut reassembler = Reassembler::new();

        // First two bytes: not even a whole header. Incomplete, not an error.
        reassembler.feed(&wire[..2]);
        assert!(reassembler.try_extract().is_none());

        reassembler.feed(&wire[2..]);
        let frame = reassembler.try_extract().expect("frame should complete");
        assert_eq!(frame.tag, TAG_TCP);
        assert_eq!(frame.body.as_ref(), b"split");
        assert_eq!(reassembler.buffered(), 0);
    }

    #[test]
    fn reassembler_drains_back_to_back_frames() {
        let mut wire = BytesMut::new();
        encode_frame(TAG_TCP, b"A", &mut wire).unwrap();
        encode_frame(TAG_TCP, b"B", &mut wire).unwrap();

        let mut reassembler = Reassembler::new();
        reassembler.feed(&wire);

        let first = reassembler.try_extract().expect("first frame");
        let second = reassembler.try_extract().expect("second frame");
        assert_eq!(first.body.as_ref(), b"A");
        assert_eq!(second.body.as_ref(), b"B");
        assert!(reassembler.try_extract().is_none());
    }

    #[test]
    fn read_single_frame() {
        let mut wire = BytesMut::new();
        encode_frame(TAG_TCP, b"hello", &mut wire).unwrap();

        let mut reader = FrameReader::new(Cursor::new(wire.to_vec()));
        let frame = reader.read_frame().unwrap();

        assert_eq!(frame.tag, TAG_TCP);
        assert_eq!(frame.body.as_ref(), b"hello");
    }

    #[test]
    fn read_multiple_frames() {
        let mut wire = BytesMut::new();
        encode_frame(TAG_TCP, b"one", &mut wire).unwrap();
        encode_frame(TAG_UDP, b"two", &mut wire).unwrap();
        encode_frame(TAG_TCP, b"three", &mut wire).unwrap();

        let mut reader = FrameReader::new(Cursor::new(wire.to_vec()));

        let f1 = reader.read_frame().unwrap();
        let f2 = reader.read_frame().unwrap();
        let f3 = reader.read_frame().unwrap();

        assert_eq!((f1.tag, f1.body.as_ref()), (TAG_TCP, b"one".as_ref()));
        assert_eq!((f2.tag, f2.body.as_ref()), (TAG_UDP, b"two".as_ref()));
        assert_eq!((f3.tag, f3.body.as_ref()), (TAG_TCP, b"three".as_ref()));
    }

    #[test]
    fn partial_reads_reassemble() {
        let mut wire = BytesMut::new();
        encode_frame(TAG_TCP, b"slow", &mut wire).unwrap();

        let byte_reader = ByteByByteReader {
            bytes: wire.to_vec(),
            pos: 0,
        };
        let mut reader = FrameReader::new(byte_reader);

        let frame = reader.read_frame().unwrap();
        assert_eq!(frame.tag, TAG_TCP);
        assert_eq!(frame.body.as_ref(), b"slow");
    }

    #[test]
    fn connection_closed_cleanly() {
        let mut reader = FrameReader::new(Cursor::new(Vec::<u8>::new()));
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn connection_closed_mid_frame() {
        let mut wire = BytesMut::new();
        encode_frame(TAG_TCP, b"only-part-arrives", &mut wire).unwrap();
        wire.truncate(HEADER_SIZE + 4);

        let mut reader = FrameReader::new(Cursor::new(wire.to_vec()));
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn interrupted_read_retries() {
        let mut wire = BytesMut::new();
        encode_frame(TAG_TCP, b"ok", &mut wire).unwrap();

        let inner = InterruptedThenData {
            interrupted: false,
            bytes: wire.to_vec(),
            pos: 0,
        };
        let mut reader = FrameReader::new(inner);

        let frame = reader.read_frame().unwrap();
        assert_eq!(frame.body.as_ref(), b"ok");
    }

    #[test]
    fn fill_once_reports_eof() {
        let mut reader = FrameReader::new(Cursor::new(Vec::<u8>::new()));
        assert_eq!(reader.fill_once().unwrap(), 0);
    }

    #[test]
    fn exact_read_roundtrip() {
        let mut wire = BytesMut::new();
        encode_frame(TAG_UDP, b"exact", &mut wire).unwrap();

        let mut cursor = Cursor::new(wire.to_vec());
        let frame = read_frame_exact(&mut cursor).unwrap();

        assert_eq!(frame.tag, TAG_UDP);
        assert_eq!(frame.body.as_ref(), b"exact");
    }

    #[test]
    fn exact_read_eof_before_header() {
        let mut cursor = Cursor::new(Vec::<u8>::new());
        let err = read_frame_exact(&mut cursor).unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn exact_read_eof_mid_body() {
        let mut wire = BytesMut::new();
        encode_frame(TAG_TCP, b"truncated", &mut wire).unwrap();
        wire.truncate(HEADER_SIZE + 3);

        let mut cursor = Cursor::new(wire.to_vec());
        let err = read_frame_exact(&mut cursor).unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn accessors_and_into_inner() {
        let mut reader = FrameReader::new(Cursor::new(Vec::<u8>::new()));
        let _ = reader.get_ref();
        let _ = reader.get_mut();
        let _inner = reader.into_inner();
    }

    #[derive(Debug)]
    struct ByteByByteReader {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for ByteByByteReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.bytes.len() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    struct InterruptedThenData {
        interrupted: bool,
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for InterruptedThenData {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            if self.pos >= self.bytes.len() {
                return Ok(0);
            }
            let n = (self.bytes.len() - self.pos).min(buf.len());
            buf[..n].copy_from_slice(&self.bytes[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }
}
