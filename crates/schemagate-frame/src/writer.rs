use std::io::{ErrorKind, Write};

use bytes::BytesMut;
use schemagate_transport::ConnStream;

use crate::codec::{encode_response, FrameConfig};
use crate::envelope::Response;
use crate::error::{FrameError, Result};
use crate::reader::transport_to_frame_error;

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Writes newline-terminated response frames to any `Write` stream.
pub struct LineWriter<T> {
    inner: T,
    buf: BytesMut,
}

impl<T: Write> LineWriter<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
        }
    }

    /// Encode and send one response line (blocking).
    ///
    /// A peer that closed its side surfaces as [`FrameError::PeerGone`]; one
    /// that stays connected without reading until the write timeout expires
    /// surfaces as [`FrameError::WriteStalled`].
    pub fn send(&mut self, response: &Response) -> Result<()> {
        self.buf.clear();
        encode_response(response, &mut self.buf)?;

        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => {
                    return Err(FrameError::PeerGone(std::io::Error::from(
                        ErrorKind::WriteZero,
                    )))
                }
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(classify_write_error(err)),
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
                Err(err) => return Err(classify_write_error(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl LineWriter<ConnStream> {
    /// Create a line writer for a socket stream and apply the write timeout.
    pub fn with_config_stream(inner: ConnStream, config: &FrameConfig) -> Result<Self> {
        inner
            .set_write_timeout(config.write_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::new(inner))
    }
}

fn classify_write_error(err: std::io::Error) -> FrameError {
    match err.kind() {
        ErrorKind::BrokenPipe | ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted => {
            FrameError::PeerGone(err)
        }
        // SO_SNDTIMEO expiry is reported as EAGAIN on Unix.
        ErrorKind::WouldBlock | ErrorKind::TimedOut => FrameError::WriteStalled(err),
        _ => FrameError::Io(err),
    }
}
