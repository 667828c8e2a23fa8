/// Errors that can occur while reading or writing frames.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer closed its read side while a response was being written.
    #[error("peer went away: {0}")]
    PeerGone(std::io::Error),

    /// A write did not complete within the configured write timeout.
    ///
    /// Part of the frame may already be on the wire, so the stream is no
    /// longer usable.
    #[error("write stalled: {0}")]
    WriteStalled(std::io::Error),

    /// No complete line arrived within the configured read timeout.
    ///
    /// Buffered partial input is kept; the read can be retried.
    #[error("read timed out")]
    Idle,

    /// The connection was closed (EOF).
    #[error("connection closed")]
    ConnectionClosed,

    /// A response could not be serialized.
    #[error("failed to encode frame: {0}")]
    Encode(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, FrameError>;
