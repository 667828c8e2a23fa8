//! Request handling and serving loops for schemagate.
//!
//! A [`Dispatcher`] maps decoded requests onto the catalog, validation,
//! diff, audit and backend operations. A [`Server`] drives it from stdio,
//! a Unix-domain socket (one client at a time) or TCP (one worker per
//! connection), stopping cooperatively when its cancellation token fires.

pub mod audit;
pub mod backend;
pub mod catalog;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod server;

pub use audit::{governance_audit, TRANSPORTS};
pub use backend::BackendClient;
pub use catalog::{Catalog, ExampleEntry, SchemaEntry};
pub use config::{BackendConfig, ServiceConfig, DEFAULT_BACKEND_ASSETS_PATH};
pub use dispatch::{Dispatcher, DEPRECATED_VALIDATE, METHODS};
pub use error::{Result, ServiceError};
pub use server::{BoundEndpoint, ConnectionStrategy, Server};
