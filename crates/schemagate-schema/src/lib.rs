//! Canonical schema resolution and asset validation.
//!
//! Assets name their schema with an absolute `$schema` URL under a
//! configured base + version prefix. Resolution prefers the local schemas
//! directory, then an on-disk cache of earlier downloads, then the network.
//! Cross-schema `$ref`s are served from a registry built over the local
//! directory so validation does not depend on network access.

pub mod canonical;
pub mod config;
pub mod error;
pub mod fetch;
pub mod guard;
pub mod registry;
pub mod resolver;
pub mod validator;

pub use canonical::{parse_marker, SchemaRef, ALIASES};
pub use config::{ResolverConfig, DEFAULT_MAX_BATCH, DEFAULT_SCHEMAS_BASE, DEFAULT_SCHEMAS_VERSION};
pub use error::{GuardError, Result, SchemaError};
pub use fetch::{HttpFetcher, OfflineFetcher, SchemaCache, SchemaFetcher};
pub use registry::{LocalRegistry, LocalRetriever, RegistryCache};
pub use resolver::{ResolvedSchema, SchemaResolver, SchemaSource};
pub use validator::{exceeds_size, ValidationEngine};
