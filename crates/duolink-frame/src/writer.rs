use std::io::{ErrorKind, Write};

use bytes::BytesMut;

use crate::codec::{encode_frame, Frame};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 1024;

/// Writes complete frames to any `Write` stream.
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
}

impl<T: Write> FrameWriter<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
        }
    }

    /// Write a complete frame (blocking).
    pub fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.send(frame.tag, frame.body.as_ref())
    }

    /// Encode and send a body under a tag.
    pub fn send(&mut self, tag: u8, body: &[u8]) -> Result<()> {
        self.buf.clear();
        encode_frame(tag, body, &mut self.buf)?;

        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(written) => offset += written,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        self.flush()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
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

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::codec::decode_frame;
    use crate::tag::{TAG_TCP, TAG_UDP};

    #[test]
    fn write_single_frame() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));

        writer.send(TAG_TCP, b"hello").unwrap();

        let mut wire = BytesMut::from(writer.into_inner().into_inner().as_slice());
        let frame = decode_frame(&mut wire).unwrap();
        assert_eq!(frame.tag, TAG_TCP);
        assert_eq!(frame.body.as_ref(), b"hello");
    }

    #[test]
    fn write_multiple_frames() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));

        writer.send(TAG_TCP, b"one").unwrap();
        writer.send(TAG_UDP, b"two").unwrap();

        let mut wire = BytesMut::from(writer.into_inner().into_inner().as_slice());

        let f1 = decode_frame(&mut wire).unwrap();
        let f2 = decode_frame(&mut wire).unwrap();
        assert_eq!((f1.tag, f1.body.as_ref()), (TAG_TCP, b"one".as_ref()));
        assert_eq!((f2.tag, f2.body.as_ref()), (TAG_UDP, b"two".as_ref()));
        assert!(wire.is_empty());
    }

    #[test]
    fn oversized_body_rejected_before_writing() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));

        let err = writer.send(TAG_TCP, &vec![0u8; 70_000]).unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { .. }));
        assert!(writer.into_inner().into_inner().is_empty());
    }

    #[test]
    fn write_frame_method() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        let frame = Frame::new(TAG_UDP, "abc");

        writer.write_frame(&frame).unwrap();

        let mut wire = BytesMut::from(writer.into_inner().into_inner().as_slice());
        let decoded = decode_frame(&mut wire).unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn short_writes_complete_the_frame() {
        let mut writer = FrameWriter::new(OneByteWriter { data: Vec::new() });

        writer.send(TAG_TCP, b"chunked").unwrap();

        let mut wire = BytesMut::from(writer.into_inner().data.as_slice());
        let frame = decode_frame(&mut wire).unwrap();
        assert_eq!(frame.body.as_ref(), b"chunked");
    }

    #[test]
    fn interrupted_write_and_flush_retry() {
        let mut writer = FrameWriter::new(InterruptedWriteThenFlush {
            write_interrupted: false,
            flush_interrupted: false,
            data: Vec::new(),
        });

        writer.send(TAG_TCP, b"retry").unwrap();
        assert!(!writer.into_inner().data.is_empty());
    }

    #[test]
    fn zero_length_write_is_connection_closed() {
        let mut writer = FrameWriter::new(ZeroWriter);
        let err = writer.send(TAG_TCP, b"x").unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    struct OneByteWriter {
        data: Vec<u8>,
    }

    impl Write for OneByteWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if buf.is_empty() {
                return Ok(0);
            }
            self.data.push(buf[0]);
            Ok(1)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct InterruptedWriteThenFlush {
        write_interrupted: bool,
        flush_interrupted: bool,
        data: Vec<u8>,
    }

    impl Write for InterruptedWriteThenFlush {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if !self.write_interrupted {
                self.write_interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            if !self.flush_interrupted {
                self.flush_interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            Ok(())
        }
    }

    struct ZeroWriter;

    impl Write for ZeroWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}
