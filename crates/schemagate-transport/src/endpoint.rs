use std::fmt;
use std::path::PathBuf;

/// Where the service accepts requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Newline-delimited frames on the process's stdin/stdout.
    Stdio,
    /// Filesystem-path Unix domain socket created with `mode` permissions.
    Unix { path: PathBuf, mode: u32 },
    /// TCP listener bound to `host:port`.
    Tcp { host: String, port: u16 },
}

impl Endpoint {
    /// Unix endpoint with the default hardened socket mode.
    pub fn unix(path: impl Into<PathBuf>) -> Self {
        Self::Unix {
            path: path.into(),
            mode: 0o600,
        }
    }

    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self::Tcp {
            host: host.into(),
            port,
        }
    }

    /// Short transport name used in lifecycle logs (`stdio`, `socket`, `tcp`).
    pub fn mode_name(&self) -> &'static str {
        match self {
            Endpoint::Stdio => "stdio",
            Endpoint::Unix { .. } => "socket",
            Endpoint::Tcp { .. } => "tcp",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Stdio => f.write_str("stdio"),
            Endpoint::Unix { path, .. } => write!(f, "unix:{}", path.display()),
            Endpoint::Tcp { host, port } => write!(f, "tcp://{host}:{port}"),
        }
    }
}
