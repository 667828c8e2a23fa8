//! Listener and stream plumbing for schemagate.
//!
//! Provides a unified interface over the socket transports the service
//! listens on:
//! - Unix domain sockets (Linux/macOS)
//! - TCP
//!
//! Listeners are polled rather than blocked on, so accept loops can observe
//! a [`CancellationToken`] between attempts. Everything above this layer
//! works with the [`ConnStream`] type provided here.

pub mod endpoint;
pub mod error;
pub mod listener;
pub mod stream;
pub mod tcp;

#[cfg(unix)]
pub mod uds;

pub use endpoint::Endpoint;
pub use error::{Result, TransportError};
pub use listener::Listener;
pub use stream::ConnStream;
pub use tcp::TcpSocketListener;
pub use tokio_util::sync::CancellationToken;

#[cfg(unix)]
pub use uds::UnixSocketListener;
