use crate::error::Result;
use crate::stream::ConnStream;

/// A bound, non-blocking listener.
///
/// `poll_accept` never blocks: it returns `Ok(None)` when no client is
/// waiting so the caller can check for cancellation and back off. Accepted
/// streams are switched back to blocking mode.
pub trait Listener: Send {
    /// Accept a pending connection, if any.
    fn poll_accept(&self) -> Result<Option<ConnStream>>;

    /// Human-readable bound address for logs.
    fn local_label(&self) -> String;
}
