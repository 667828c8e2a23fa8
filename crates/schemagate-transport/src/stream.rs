use std::io::{Read, Write};
use std::net::Shutdown;
use std::time::Duration;

use crate::error::Result;

/// A connected client stream implementing Read + Write.
///
/// Returned by every [`Listener`](crate::Listener) implementation so the
/// serving loop above does not care which socket family it is reading from.
pub struct ConnStream {
    inner: ConnStreamInner,
}

enum ConnStreamInner {
    Tcp(std::net::TcpStream),
    #[cfg(unix)]
    Unix(std::os::unix::net::UnixStream),
}

impl Read for ConnStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            ConnStreamInner::Tcp(stream) => stream.read(buf),
            #[cfg(unix)]
            ConnStreamInner::Unix(stream) => stream.read(buf),
        }
    }
}

impl Write for ConnStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            ConnStreamInner::Tcp(stream) => stream.write(buf),
            #[cfg(unix)]
            ConnStreamInner::Unix(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            ConnStreamInner::Tcp(stream) => stream.flush(),
            #[cfg(unix)]
            ConnStreamInner::Unix(stream) => stream.flush(),
        }
    }
}

impl ConnStream {
    pub(crate) fn from_tcp(stream: std::net::TcpStream) -> Self {
        Self {
            inner: ConnStreamInner::Tcp(stream),
        }
    }

    #[cfg(unix)]
    pub(crate) fn from_unix(stream: std::os::unix::net::UnixStream) -> Self {
        Self {
            inner: ConnStreamInner::Unix(stream),
        }
    }

    /// Set read timeout on the underlying stream.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        match &self.inner {
            ConnStreamInner::Tcp(stream) => stream.set_read_timeout(timeout).map_err(Into::into),
            #[cfg(unix)]
            ConnStreamInner::Unix(stream) => stream.set_read_timeout(timeout).map_err(Into::into),
        }
    }

    /// Set write timeout on the underlying stream.
    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        match &self.inner {
            ConnStreamInner::Tcp(stream) => stream.set_write_timeout(timeout).map_err(Into::into),
            #[cfg(unix)]
            ConnStreamInner::Unix(stream) => stream.set_write_timeout(timeout).map_err(Into::into),
        }
    }

    /// Switch the stream between blocking and non-blocking mode.
    pub fn set_nonblocking(&self, nonblocking: bool) -> Result<()> {
        match &self.inner {
            ConnStreamInner::Tcp(stream) => stream.set_nonblocking(nonblocking).map_err(Into::into),
            #[cfg(unix)]
            ConnStreamInner::Unix(stream) => {
                stream.set_nonblocking(nonblocking).map_err(Into::into)
            }
        }
    }

    /// Try to clone this stream (creates a new file descriptor).
    pub fn try_clone(&self) -> Result<Self> {
        match &self.inner {
            ConnStreamInner::Tcp(stream) => Ok(Self::from_tcp(stream.try_clone()?)),
            #[cfg(unix)]
            ConnStreamInner::Unix(stream) => Ok(Self::from_unix(stream.try_clone()?)),
        }
    }

    /// Shut down both halves of the connection.
    ///
    /// Errors from an already-disconnected peer are ignored.
    pub fn shutdown(&self) {
        let _ = match &self.inner {
            ConnStreamInner::Tcp(stream) => stream.shutdown(Shutdown::Both),
            #[cfg(unix)]
            ConnStreamInner::Unix(stream) => stream.shutdown(Shutdown::Both),
        };
    }

    /// Peer description for diagnostics.
    pub fn peer_label(&self) -> String {
        match &self.inner {
            ConnStreamInner::Tcp(stream) => stream
                .peer_addr()
                .map(|addr| addr.to_string())
                .unwrap_or_else(|_| "tcp:unknown".to_string()),
            #[cfg(unix)]
            ConnStreamInner::Unix(_) => "unix".to_string(),
        }
    }
}

impl std::fmt::Debug for ConnStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.inner {
            ConnStreamInner::Tcp(_) => f.debug_struct("ConnStream").field("type", &"tcp").finish(),
            #[cfg(unix)]
            ConnStreamInner::Unix(_) => {
                f.debug_struct("ConnStream").field("type", &"unix").finish()
            }
        }
    }
}
