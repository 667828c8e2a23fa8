/// Errors raised while applying a patch.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PatchError {
    /// The pointer is not a valid RFC 6901 pointer.
    #[error("invalid pointer: {0}")]
    InvalidPointer(String),

    /// An intermediate or target location does not exist.
    #[error("path not found: {0}")]
    PathNotFound(String),

    /// An array index is not a number, or is out of range.
    #[error("invalid array index {index:?} at {path}")]
    InvalidIndex { path: String, index: String },

    /// The operation needs a value and none was supplied.
    #[error("missing value for {op} at {path}")]
    MissingValue { op: String, path: String },

    /// The parent of the target is a scalar.
    #[error("cannot address into scalar at {0}")]
    NotAContainer(String),
}

pub type Result<T> = std::result::Result<T, PatchError>;
