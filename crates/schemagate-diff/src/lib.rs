//! Deterministic structural diffing of JSON documents.
//!
//! Objects are compared key by key; every other pairing (arrays, scalars,
//! type changes) becomes a single whole-value `replace`. The resulting
//! patch is sorted by `(path, op)` so the output never depends on
//! traversal order.

pub mod apply;
pub mod diff;
pub mod error;
pub mod pointer;

pub use apply::apply_patch;
pub use diff::{diff, Op, PatchOp};
pub use error::{PatchError, Result};
