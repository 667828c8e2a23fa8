/// Errors that can occur while setting up or running the service.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] schemagate_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] schemagate_frame::FrameError),

    /// Schema resolver setup error.
    #[error("schema error: {0}")]
    Schema(#[from] schemagate_schema::SchemaError),

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The backend HTTP client could not be created.
    #[error("backend client setup failed: {0}")]
    Backend(String),

    /// An operation handler failed unexpectedly.
    #[error("internal fault in {method}: {detail}")]
    Internal { method: String, detail: String },

    /// Local I/O failure outside the framing layer (stdin/stdout).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ServiceError>;
