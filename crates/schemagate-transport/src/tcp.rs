use std::io::ErrorKind;
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::listener::Listener;
use crate::stream::ConnStream;

/// TCP listener polled without blocking.
#[derive(Debug)]
pub struct TcpSocketListener {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl TcpSocketListener {
    /// Resolve `host:port` and bind to the first IPv4/IPv6 address.
    ///
    /// Port `0` asks the OS for an ephemeral port; read it back with
    /// [`local_addr`](Self::local_addr).
    pub fn bind(host: &str, port: u16) -> Result<Self> {
        let mut addrs = (host, port)
            .to_socket_addrs()
            .map_err(|err| TransportError::Resolve {
                host: host.to_string(),
                port,
                reason: err.to_string(),
            })?;
        let addr = addrs
            .find(|addr| matches!(addr, SocketAddr::V4(_) | SocketAddr::V6(_)))
            .ok_or_else(|| TransportError::Resolve {
                host: host.to_string(),
                port,
                reason: "no addresses".to_string(),
            })?;

        let bind_err = |source: std::io::Error| TransportError::BindTcp {
            addr: addr.to_string(),
            source,
        };
        let listener = TcpListener::bind(addr).map_err(bind_err)?;
        listener.set_nonblocking(true).map_err(bind_err)?;
        let local_addr = listener.local_addr().map_err(bind_err)?;

        info!(%local_addr, "listening on tcp");

        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Connect to a TCP listener (blocking).
    pub fn connect(addr: SocketAddr) -> Result<ConnStream> {
        let stream = TcpStream::connect(addr).map_err(|source| TransportError::Connect {
            target: addr.to_string(),
            source,
        })?;
        debug!(%addr, "connected to tcp listener");
        Ok(ConnStream::from_tcp(stream))
    }

    /// The address the listener actually bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

impl Listener for TcpSocketListener {
    fn poll_accept(&self) -> Result<Option<ConnStream>> {
        match self.listener.accept() {
            Ok((stream, peer)) => {
                stream.set_nonblocking(false)?;
                let _ = stream.set_nodelay(true);
                debug!(%peer, "accepted connection");
                Ok(Some(ConnStream::from_tcp(stream)))
            }
            Err(err) if err.kind() == ErrorKind::WouldBlock => Ok(None),
            Err(err) if err.kind() == ErrorKind::Interrupted => Ok(None),
            Err(err) => Err(TransportError::Accept(err)),
        }
    }

    fn local_label(&self) -> String {
        self.local_addr.to_string()
    }
}
