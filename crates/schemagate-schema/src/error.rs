/// A user-supplied relative path that does not stay inside its root.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GuardError {
    /// Nothing to resolve.
    #[error("empty path")]
    Empty,

    /// Absolute paths are never accepted.
    #[error("absolute path not allowed: {0}")]
    Absolute(String),

    /// The path resolves to the root itself or somewhere outside it.
    #[error("path escapes root: {0}")]
    OutsideRoot(String),
}

/// Errors that can occur while resolving or compiling a schema.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// `$schema` is empty or not an absolute http(s) URL.
    #[error("invalid schema marker: {0}")]
    InvalidMarker(String),

    /// `$schema` is a URL, but not under the canonical base + version.
    #[error("schema marker is not canonical: {0}")]
    NotCanonical(String),

    /// The schema name points outside the schemas root.
    #[error("schema path outside configured root: {0}")]
    OutsideRoot(#[from] GuardError),

    /// A schema file exists but could not be read or parsed.
    #[error("failed to load schema {location}: {reason}")]
    LoadFailed { location: String, reason: String },

    /// A remote fetch failed.
    #[error("failed to fetch {url}: {reason}")]
    FetchFailed { url: String, reason: String },

    /// Neither local lookup nor any fetch produced the schema.
    #[error("schema not resolvable: {0}")]
    Unresolved(String),

    /// The schema document is not a valid 2020-12 schema.
    #[error("failed to compile schema: {0}")]
    CompileFailed(String),
}

pub type Result<T> = std::result::Result<T, SchemaError>;
