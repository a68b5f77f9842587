use std::io::{ErrorKind, Read};

use bytes::BytesMut;
use plotbridge_transport::SocketStream;

use crate::codec::{decode_envelope, Frame, FrameConfig};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 64 * 1024;
const READ_CHUNK_SIZE: usize = 64 * 1024;

/// Reads complete frames from any `Read` stream.
///
/// Partial envelopes stay buffered across calls, so a read timeout in the
/// middle of a large payload loses nothing.
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Read> FrameReader<T> {
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Read the next complete frame.
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` at EOF. A read timeout on
    /// the stream is reported as `FrameError::Io`.
    pub fn read_frame(&mut self) -> Result<Frame> {
        loop {
            if let Some(frame) = decode_envelope(&mut self.buf, self.config.max_payload_size)? {
                return Ok(frame);
            }
            self.fill()?;
        }
    }

    /// Like [`read_frame`](Self::read_frame), but a read timeout yields
    /// `Ok(None)` instead of an error.
    ///
    /// This is the receive-loop primitive: the caller gets control back once
    /// per timeout period and can check its stop flag.
    pub fn poll_frame(&mut self) -> Result<Option<Frame>> {
        loop {
            if let Some(frame) = decode_envelope(&mut self.buf, self.config.max_payload_size)? {
                return Ok(Some(frame));
            }
            match self.fill() {
                Ok(()) => {}
                Err(FrameError::Io(err))
                    if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
                {
                    return Ok(None);
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn fill(&mut self) -> Result<()> {
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        loop {
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };
            if read == 0 {
                if !self.buf.is_empty() {
                    tracing::debug!(
                        buffered = self.buf.len(),
                        "stream closed mid-envelope"
                    );
                }
                return Err(FrameError::ConnectionClosed);
            }
            self.buf.extend_from_slice(&chunk[..read]);
            return Ok(());
        }
    }

    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }

    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl FrameReader<SocketStream> {
    /// Create a reader for a socket and apply the configured read timeout.
    pub fn for_socket(inner: SocketStream, config: FrameConfig) -> Result<Self> {
        inner.set_read_timeout(config.read_timeout)?;
        Ok(Self::with_config(inner, config))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::time::Duration;

    use bytes::{BufMut, BytesMut};

    use super::*;
    use crate::codec::{encode_envelope, MAGIC};
    use crate::writer::FrameWriter;

    fn wire(frames: &[&[u8]]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        for frame in frames {
            encode_envelope(frame, &mut buf).unwrap();
        }
        buf.to_vec()
    }

    #[test]
    fn reads_frames_in_order() {
        let bytes = wire(&[b"y = x * 2", b"data|x|i|1|()|use", b"finalize"]);
        let mut reader = FrameReader::new(Cursor::new(bytes));

        assert_eq!(reader.read_frame().unwrap().payload(), b"y = x * 2");
        assert_eq!(reader.read_frame().unwrap().payload(), b"data|x|i|1|()|use");
        assert_eq!(reader.read_frame().unwrap().payload(), b"finalize");
        assert!(matches!(
            reader.read_frame(),
            Err(FrameError::ConnectionClosed)
        ));
    }

    #[test]
    fn large_payload_spans_many_reads() {
        let payload: Vec<u8> = (0..200_000u32).flat_map(|v| v.to_ne_bytes()).collect();
        let mut reader = FrameReader::new(Cursor::new(wire(&[&payload])));
        assert_eq!(reader.read_frame().unwrap().payload(), payload.as_slice());
    }

    #[test]
    fn byte_at_a_time_stream() {
        let reader = ByteByByteReader {
            bytes: wire(&[b"exit"]),
            pos: 0,
        };
        let mut framed = FrameReader::new(reader);
        assert_eq!(framed.read_frame().unwrap().payload(), b"exit");
    }

    #[test]
    fn eof_mid_envelope_is_connection_closed() {
        let mut partial = BytesMut::new();
        partial.put_slice(&MAGIC);
        partial.put_u32_le(16);
        partial.put_slice(b"only-part");

        let mut reader = FrameReader::new(Cursor::new(partial.to_vec()));
        assert!(matches!(
            reader.read_frame(),
            Err(FrameError::ConnectionClosed)
        ));
    }

    #[test]
    fn oversized_envelope_in_stream() {
        let cfg = FrameConfig {
            max_payload_size: 4,
            ..FrameConfig::default()
        };
        let mut reader = FrameReader::with_config(Cursor::new(wire(&[b"finalize"])), cfg);
        assert!(matches!(
            reader.read_frame(),
            Err(FrameError::PayloadTooLarge { size: 8, max: 4 })
        ));
    }

    #[test]
    fn poll_frame_maps_timeout_to_none_and_keeps_partial_bytes() {
        let bytes = wire(&[b"finalize"]);
        let reader = StallingReader {
            chunks: vec![
                Ok(bytes[..5].to_vec()),
                Err(ErrorKind::WouldBlock),
                Ok(bytes[5..].to_vec()),
            ],
        };
        let mut framed = FrameReader::new(reader);

        assert!(framed.poll_frame().unwrap().is_none());
        let frame = framed.poll_frame().unwrap().expect("frame after stall");
        assert_eq!(frame.payload(), b"finalize");
    }

    #[test]
    fn read_frame_propagates_would_block() {
        let reader = StallingReader {
            chunks: vec![Err(ErrorKind::WouldBlock)],
        };
        let mut framed = FrameReader::new(reader);
        let err = framed.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::Io(e) if e.kind() == ErrorKind::WouldBlock));
    }

    #[test]
    fn interrupted_read_retries() {
        let bytes = wire(&[b"exit"]);
        let reader = StallingReader {
            chunks: vec![Err(ErrorKind::Interrupted), Ok(bytes)],
        };
        let mut framed = FrameReader::new(reader);
        assert_eq!(framed.read_frame().unwrap().payload(), b"exit");
    }

    #[test]
    fn socket_poll_times_out_without_data() {
        let (left, right) = SocketStream::pair().unwrap();
        let cfg = FrameConfig {
            read_timeout: Some(Duration::from_millis(10)),
            ..FrameConfig::default()
        };
        let mut reader = FrameReader::for_socket(right, cfg).unwrap();
        assert!(reader.poll_frame().unwrap().is_none());

        let mut writer = FrameWriter::new(left);
        writer.send(b"finalize").unwrap();
        assert_eq!(
            reader.poll_frame().unwrap().expect("frame").payload(),
            b"finalize"
        );
    }

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

    /// Replays scripted chunks and errors, then reports EOF.
    struct StallingReader {
        chunks: Vec<std::result::Result<Vec<u8>, ErrorKind>>,
    }

    impl Read for StallingReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.chunks.is_empty() {
                return Ok(0);
            }
            match self.chunks.remove(0) {
                Ok(bytes) => {
                    buf[..bytes.len()].copy_from_slice(&bytes);
                    Ok(bytes.len())
                }
                Err(kind) => Err(std::io::Error::from(kind)),
            }
        }
    }
}
