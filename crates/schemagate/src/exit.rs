use std::fmt;
use std::io;

use schemagate_service::ServiceError;
use schemagate_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
/// The input file could not be read or decoded.
pub const INPUT_ERROR: i32 = 2;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::AddrInUse | io::ErrorKind::AddrNotAvailable => TRANSPORT_ERROR,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Bind { source, .. }
        | TransportError::BindTcp { source, .. }
        | TransportError::Accept(source)
        | TransportError::Io(source)
            if source.kind() == io::ErrorKind::PermissionDenied =>
        {
            CliError::new(PERMISSION_DENIED, format!("{context}: {source}"))
        }
        TransportError::Unsupported(_) => CliError::new(USAGE, format!("{context}: {err}")),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn service_error(context: &str, err: ServiceError) -> CliError {
    match err {
        ServiceError::Transport(err) => transport_error(context, err),
        ServiceError::InvalidConfig(_) => CliError::new(USAGE, format!("{context}: {err}")),
        ServiceError::Schema(_) => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        ServiceError::Frame(_) | ServiceError::Backend(_) => {
            CliError::new(FAILURE, format!("{context}: {err}"))
        }
        ServiceError::Io(source) => io_error(context, source),
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_config_is_a_usage_error() {
        let err = service_error(
            "startup failed",
            ServiceError::InvalidConfig("max_batch must be a positive integer".to_string()),
        );
        assert_eq!(err.code, USAGE);
        assert!(err.message.starts_with("startup failed: "));
    }

    #[test]
    fn bind_permission_denied_maps_to_permission_code() {
        let err = transport_error(
            "bind failed",
            TransportError::BindTcp {
                addr: "127.0.0.1:80".to_string(),
                source: io::Error::from(io::ErrorKind::PermissionDenied),
            },
        );
        assert_eq!(err.code, PERMISSION_DENIED);

        let err = transport_error(
            "bind failed",
            TransportError::BindTcp {
                addr: "127.0.0.1:7000".to_string(),
                source: io::Error::from(io::ErrorKind::AddrInUse),
            },
        );
        assert_eq!(err.code, TRANSPORT_ERROR);
    }
}
