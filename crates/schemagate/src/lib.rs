//! Schema governance over newline-delimited JSON-RPC.
//!
//! schemagate validates JSON assets against a canonical, versioned set of
//! JSON Schemas, lists and serves schemas and examples, diffs assets as
//! RFC 6902 patches, and forwards validated assets to an optional backend.
//! Requests arrive over stdio, a Unix-domain socket or TCP.
//!
//! # Crate Structure
//!
//! - [`transport`]: socket listeners and connection streams
//! - [`frame`]: line framing, request/response envelopes, operation results
//! - [`diff`]: JSON Pointer helpers, diff and patch apply
//! - [`schema`]: path guard, schema resolution and validation
//! - [`service`]: dispatcher, catalog operations and serving loops

/// Re-export transport types.
pub mod transport {
    pub use schemagate_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use schemagate_frame::*;
}

/// Re-export diff types.
pub mod diff {
    pub use schemagate_diff::*;
}

/// Re-export schema types.
pub mod schema {
    pub use schemagate_schema::*;
}

/// Re-export service types.
pub mod service {
    pub use schemagate_service::*;
}
