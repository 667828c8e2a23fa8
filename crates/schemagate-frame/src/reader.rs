use std::io::{ErrorKind, Read};

use bytes::BytesMut;
use schemagate_transport::ConnStream;

use crate::codec::{FrameConfig, Line, LineDecoder};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Reads newline-delimited lines from any `Read` stream.
///
/// Handles partial reads internally; callers always get complete lines.
pub struct LineReader<T> {
    inner: T,
    buf: BytesMut,
    decoder: LineDecoder,
    eof: bool,
}

impl<T: Read> LineReader<T> {
    /// Create a new line reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, &FrameConfig::default())
    }

    /// Create a new line reader with explicit configuration.
    pub fn with_config(inner: T, config: &FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            decoder: LineDecoder::new(config.max_frame_size),
            eof: false,
        }
    }

    /// Read the next line (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` once EOF is reached and
    /// every buffered line has been delivered, and `Err(FrameError::Idle)`
    /// when a read timeout expires before a full line arrived.
    pub fn read_line(&mut self) -> Result<Line> {
        loop {
            if let Some(line) = self.decoder.decode(&mut self.buf) {
                return Ok(line);
            }
            if self.eof {
                return match self.decoder.decode_eof(&mut self.buf) {
                    Some(line) => Ok(line),
                    None => Err(FrameError::ConnectionClosed),
                };
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    return Err(FrameError::Idle)
                }
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                self.eof = true;
                continue;
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl LineReader<ConnStream> {
    /// Create a line reader for a socket stream and apply the read timeout.
    pub fn with_config_stream(inner: ConnStream, config: &FrameConfig) -> Result<Self> {
        inner
            .set_read_timeout(config.read_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}

pub(crate) fn transport_to_frame_error(err: schemagate_transport::TransportError) -> FrameError {
    match err {
        schemagate_transport::TransportError::Io(io)
        | schemagate_transport::TransportError::Accept(io) => FrameError::Io(io),
        other => FrameError::Io(std::io::Error::other(other.to_string())),
    }
}
