use std::path::PathBuf;

/// Errors that can occur in transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to bind a Unix socket path.
    #[error("failed to bind to {path}: {source}")]
    Bind {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to bind a TCP address.
    #[error("failed to bind to {addr}: {source}")]
    BindTcp {
        addr: String,
        source: std::io::Error,
    },

    /// Host/port did not resolve to a usable socket address.
    #[error("failed to resolve {host}:{port}: {reason}")]
    Resolve {
        host: String,
        port: u16,
        reason: String,
    },

    /// Failed to connect to the specified address.
    #[error("failed to connect to {target}: {source}")]
    Connect {
        target: String,
        source: std::io::Error,
    },

    /// Failed to accept an incoming connection.
    #[error("failed to accept connection: {0}")]
    Accept(std::io::Error),

    /// An I/O error occurred on the transport stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The socket path is too long for the platform.
    #[error("socket path too long ({len} bytes, max {max}): {path}")]
    PathTooLong {
        path: PathBuf,
        len: usize,
        max: usize,
    },

    /// The endpoint kind is not available on this platform.
    #[error("unsupported endpoint: {0}")]
    Unsupported(String),
}

pub type Result<T> = std::result::Result<T, TransportError>;
