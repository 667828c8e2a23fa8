use std::io::ErrorKind;
use std::os::unix::fs::{FileTypeExt, MetadataExt, PermissionsExt};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::listener::Listener;
use crate::stream::ConnStream;

/// Unix domain socket listener.
///
/// Binds a filesystem-path socket, polls it for clients without blocking,
/// and removes the socket file on drop provided the path still refers to
/// the socket this listener created.
#[derive(Debug)]
pub struct UnixSocketListener {
    listener: UnixListener,
    path: PathBuf,
    created_inode: Option<(u64, u64)>,
}

impl UnixSocketListener {
    /// Default permission mode for created socket paths.
    pub const DEFAULT_SOCKET_MODE: u32 = 0o600;
    /// Maximum socket path length.
    /// Unix `sockaddr_un.sun_path` is typically 108 bytes on Linux, 104 on macOS.
    #[cfg(target_os = "linux")]
    const MAX_PATH_LEN: usize = 108;
    #[cfg(not(target_os = "linux"))]
    const MAX_PATH_LEN: usize = 104;

    /// Bind and listen on a filesystem-path Unix domain socket.
    ///
    /// If the file already exists and is a socket, it is removed first
    /// (stale socket cleanup).
    pub fn bind(path: impl AsRef<Path>) -> Result<Self> {
        Self::bind_with_mode(path, Self::DEFAULT_SOCKET_MODE)
    }

    /// Bind and listen with explicit socket file permissions.
    pub fn bind_with_mode(path: impl AsRef<Path>, mode: u32) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let path_bytes = path.as_os_str().len();
        if path_bytes >= Self::MAX_PATH_LEN {
            return Err(TransportError::PathTooLong {
                path,
                len: path_bytes,
                max: Self::MAX_PATH_LEN,
            });
        }

        let bind_err = |source: std::io::Error| TransportError::Bind {
            path: path.clone(),
            source,
        };

        // Remove stale socket if it exists, but never remove non-socket files.
        if let Ok(metadata) = std::fs::symlink_metadata(&path) {
            if metadata.file_type().is_socket() {
                debug!(?path, "removing stale socket");
                std::fs::remove_file(&path).map_err(bind_err)?;
            } else {
                return Err(bind_err(std::io::Error::new(
                    ErrorKind::AlreadyExists,
                    "existing path is not a unix socket",
                )));
            }
        }

        let listener = UnixListener::bind(&path).map_err(bind_err)?;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(mode)).map_err(bind_err)?;
        listener.set_nonblocking(true).map_err(bind_err)?;

        let created_metadata = std::fs::symlink_metadata(&path).map_err(bind_err)?;
        let created_inode = Some((created_metadata.dev(), created_metadata.ino()));

        info!(?path, mode = %format!("{mode:o}"), "listening on unix domain socket");

        Ok(Self {
            listener,
            path,
            created_inode,
        })
    }

    /// Connect to a listening Unix domain socket (blocking).
    pub fn connect(path: impl AsRef<Path>) -> Result<ConnStream> {
        let path = path.as_ref();
        let stream = UnixStream::connect(path).map_err(|source| TransportError::Connect {
            target: path.display().to_string(),
            source,
        })?;
        debug!(?path, "connected to unix domain socket");
        Ok(ConnStream::from_unix(stream))
    }

    /// The path this socket is bound to.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Listener for UnixSocketListener {
    fn poll_accept(&self) -> Result<Option<ConnStream>> {
        match self.listener.accept() {
            Ok((stream, _addr)) => {
                stream.set_nonblocking(false)?;
                debug!(path = ?self.path, "accepted connection");
                Ok(Some(ConnStream::from_unix(stream)))
            }
            Err(err) if err.kind() == ErrorKind::WouldBlock => Ok(None),
            Err(err) if err.kind() == ErrorKind::Interrupted => Ok(None),
            Err(err) => Err(TransportError::Accept(err)),
        }
    }

    fn local_label(&self) -> String {
        self.path.display().to_string()
    }
}

impl Drop for UnixSocketListener {
    fn drop(&mut self) {
        if let Some((expected_dev, expected_ino)) = self.created_inode {
            if let Ok(metadata) = std::fs::symlink_metadata(&self.path) {
                if metadata.file_type().is_socket()
                    && metadata.dev() == expected_dev
                    && metadata.ino() == expected_ino
                {
                    debug!(path = ?self.path, "cleaning up socket file");
                    let _ = std::fs::remove_file(&self.path);
                } else {
                    debug!(
                        path = ?self.path,
                        "socket path identity changed; skipping cleanup"
                    );
                }
            }
        }
    }
}
