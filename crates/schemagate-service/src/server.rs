//! Serving loops for stdio, Unix-socket and TCP endpoints.
//!
//! Every loop feeds lines through the same [`Dispatcher`] and watches a
//! [`CancellationToken`] between blocking operations. Socket reads use a
//! short read timeout so idle connections notice cancellation too.

use std::io::{ErrorKind, Read, Write};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use schemagate_frame::{FrameConfig, FrameError, Line, LineReader, LineWriter};
use schemagate_transport::{
    CancellationToken, ConnStream, Endpoint, Listener, TcpSocketListener, TransportError,
};
use tracing::{debug, info, warn};

use crate::config::ServiceConfig;
use crate::dispatch::Dispatcher;
use crate::error::{Result, ServiceError};

const ACCEPT_BACKOFF: Duration = Duration::from_millis(25);
const ERROR_BACKOFF: Duration = Duration::from_millis(150);
const DRAIN_POLL: Duration = Duration::from_millis(10);

/// How accepted connections are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStrategy {
    /// Serve one connection to completion before accepting the next.
    Sequential,
    /// Hand every connection to its own worker thread.
    PerConnection,
}

impl ConnectionStrategy {
    /// Unix sockets are served one client at a time; TCP concurrently.
    pub fn for_endpoint(endpoint: &Endpoint) -> Self {
        match endpoint {
            Endpoint::Tcp { .. } => Self::PerConnection,
            Endpoint::Stdio | Endpoint::Unix { .. } => Self::Sequential,
        }
    }
}

/// Shared serving state; cheap to clone into worker threads.
#[derive(Debug, Clone)]
pub struct Server {
    dispatcher: Arc<Dispatcher>,
    frame: FrameConfig,
    poll_interval: Duration,
    shutdown_grace: Duration,
}

impl Server {
    pub fn new(dispatcher: Arc<Dispatcher>, config: &ServiceConfig) -> Self {
        Self {
            dispatcher,
            frame: config.frame_config(),
            poll_interval: config.poll_interval,
            shutdown_grace: config.shutdown_grace,
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Serve stdin/stdout until EOF or cancellation.
    pub fn serve_stdio(&self, token: &CancellationToken) -> Result<()> {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        self.serve_stream(std::io::stdin(), &mut out, token)
    }

    /// Serve a line stream sequentially.
    ///
    /// Reads happen on a helper thread so a blocked read never delays
    /// cancellation. Exactly one response is written per input line, in order.
    pub fn serve_stream<R, W>(&self, input: R, output: &mut W, token: &CancellationToken) -> Result<()>
    where
        R: Read + Send + 'static,
        W: Write,
    {
        let (tx, rx) = mpsc::sync_channel::<std::result::Result<Line, FrameError>>(1);
        let frame = FrameConfig {
            read_timeout: None,
            ..self.frame.clone()
        };
        thread::Builder::new()
            .name("schemagate-stdin".to_string())
            .spawn(move || {
                let mut reader = LineReader::with_config(input, &frame);
                loop {
                    let next = reader.read_line();
                    let done = next.is_err();
                    if tx.send(next).is_err() || done {
                        break;
                    }
                }
            })?;

        let mut writer = LineWriter::new(output);
        loop {
            if token.is_cancelled() {
                debug!("stream serving cancelled");
                return Ok(());
            }
            match rx.recv_timeout(self.poll_interval) {
                Ok(Ok(line)) => {
                    let response = self.dispatcher.handle(line);
                    match writer.send(&response) {
                        Ok(()) => {}
                        Err(FrameError::PeerGone(err)) => {
                            debug!(error = %err, "output closed");
                            return Ok(());
                        }
                        Err(FrameError::WriteStalled(err)) => {
                            warn!(error = %err, "output stopped draining; abandoning stream");
                            return Ok(());
                        }
                        Err(err) => return Err(err.into()),
                    }
                }
                Ok(Err(FrameError::ConnectionClosed)) => return Ok(()),
                Ok(Err(err)) => return Err(err.into()),
                Err(mpsc::RecvTimeoutError::Timeout) => {}
                Err(mpsc::RecvTimeoutError::Disconnected) => return Ok(()),
            }
        }
    }

    /// Serve one socket connection until the peer closes it or the token fires.
    ///
    /// A peer that disappears mid-write ends the connection quietly.
    pub fn serve_connection(&self, stream: ConnStream, token: &CancellationToken) -> Result<()> {
        let peer = stream.peer_label();
        let mut reader = LineReader::with_config_stream(stream.try_clone()?, &self.frame)?;
        let mut writer = LineWriter::with_config_stream(stream, &self.frame)?;
        debug!(%peer, "connection opened");

        let result = loop {
            if token.is_cancelled() {
                debug!(%peer, "connection cancelled");
                break Ok(());
            }
            let line = match reader.read_line() {
                Ok(line) => line,
                Err(FrameError::Idle) => continue,
                Err(FrameError::ConnectionClosed) => break Ok(()),
                Err(FrameError::Io(err)) if is_disconnect(&err) => break Ok(()),
                Err(err) => break Err(ServiceError::from(err)),
            };
            let response = self.dispatcher.handle(line);
            match writer.send(&response) {
                Ok(()) => {}
                Err(FrameError::PeerGone(err)) => {
                    debug!(%peer, error = %err, "peer went away during write");
                    break Ok(());
                }
                Err(FrameError::WriteStalled(err)) => {
                    warn!(%peer, error = %err, "peer stopped reading; dropping connection");
                    break Ok(());
                }
                Err(err) => break Err(err.into()),
            }
        };

        writer.get_ref().shutdown();
        debug!(%peer, "connection closed");
        result
    }

    /// Accept and serve connections until the token fires.
    ///
    /// Returns the number of connections accepted. On cancellation, worker
    /// threads get the configured grace period to finish their current
    /// request before they are abandoned.
    pub fn serve_listener<L>(
        &self,
        listener: &L,
        strategy: ConnectionStrategy,
        token: &CancellationToken,
    ) -> Result<u64>
    where
        L: Listener + ?Sized,
    {
        info!(endpoint = %listener.local_label(), ?strategy, "listener active");
        let mut workers: Vec<JoinHandle<()>> = Vec::new();
        let mut last_error = None::<ErrorKind>;
        let mut accepted = 0u64;

        while !token.is_cancelled() {
            match listener.poll_accept() {
                Ok(Some(stream)) => {
                    last_error = None;
                    accepted += 1;
                    match strategy {
                        ConnectionStrategy::Sequential => {
                            if let Err(err) = self.serve_connection(stream, token) {
                                warn!(error = %err, "connection ended with error");
                            }
                        }
                        ConnectionStrategy::PerConnection => {
                            let server = self.clone();
                            let token = token.clone();
                            let worker = thread::Builder::new()
                                .name(format!("schemagate-conn-{accepted}"))
                                .spawn(move || {
                                    if let Err(err) = server.serve_connection(stream, &token) {
                                        warn!(error = %err, "connection ended with error");
                                    }
                                })?;
                            workers.push(worker);
                            workers.retain(|worker| !worker.is_finished());
                        }
                    }
                }
                Ok(None) => thread::sleep(ACCEPT_BACKOFF),
                Err(err) => {
                    let kind = error_kind(&err);
                    if last_error != Some(kind) {
                        warn!(error = %err, "socket accept error");
                    }
                    last_error = Some(kind);
                    thread::sleep(ERROR_BACKOFF);
                }
            }
        }

        self.drain(workers);
        info!(endpoint = %listener.local_label(), accepted, "listener stopped");
        Ok(accepted)
    }

    fn drain(&self, workers: Vec<JoinHandle<()>>) {
        let deadline = Instant::now() + self.shutdown_grace;
        while workers.iter().any(|worker| !worker.is_finished()) && Instant::now() < deadline {
            thread::sleep(DRAIN_POLL);
        }

        let mut abandoned = 0usize;
        for worker in workers {
            if worker.is_finished() {
                if worker.join().is_err() {
                    warn!("connection worker panicked");
                }
            } else {
                abandoned += 1;
            }
        }
        if abandoned > 0 {
            warn!(abandoned, "shutdown grace elapsed with connections still open");
        }
    }
}

/// A bound endpoint, ready to serve.
#[derive(Debug)]
pub enum BoundEndpoint {
    Stdio,
    #[cfg(unix)]
    Unix(schemagate_transport::UnixSocketListener),
    Tcp(TcpSocketListener),
}

impl BoundEndpoint {
    /// Bind the listener for `endpoint`. Stdio needs no binding.
    pub fn bind(endpoint: &Endpoint) -> Result<Self> {
        match endpoint {
            Endpoint::Stdio => Ok(Self::Stdio),
            Endpoint::Tcp { host, port } => Ok(Self::Tcp(TcpSocketListener::bind(host, *port)?)),
            #[cfg(unix)]
            Endpoint::Unix { path, mode } => Ok(Self::Unix(
                schemagate_transport::UnixSocketListener::bind_with_mode(path, *mode)?,
            )),
            #[cfg(not(unix))]
            Endpoint::Unix { .. } => Err(TransportError::Unsupported(
                "unix domain sockets are not available on this platform".to_string(),
            )
            .into()),
        }
    }

    /// Where clients connect, for logs and ready markers.
    pub fn label(&self) -> String {
        match self {
            Self::Stdio => "stdio".to_string(),
            #[cfg(unix)]
            Self::Unix(listener) => listener.local_label(),
            Self::Tcp(listener) => listener.local_label(),
        }
    }

    /// Run the matching serving loop until EOF (stdio) or cancellation.
    pub fn serve(&self, server: &Server, token: &CancellationToken) -> Result<()> {
        match self {
            Self::Stdio => server.serve_stdio(token),
            #[cfg(unix)]
            Self::Unix(listener) => server
                .serve_listener(listener, ConnectionStrategy::Sequential, token)
                .map(|_| ()),
            Self::Tcp(listener) => server
                .serve_listener(listener, ConnectionStrategy::PerConnection, token)
                .map(|_| ()),
        }
    }
}

fn is_disconnect(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted | ErrorKind::BrokenPipe
    )
}

fn error_kind(err: &TransportError) -> ErrorKind {
    match err {
        TransportError::Accept(io) | TransportError::Io(io) => io.kind(),
        _ => ErrorKind::Other,
    }
}
