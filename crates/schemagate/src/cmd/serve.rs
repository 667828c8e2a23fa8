use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use schemagate_service::{BoundEndpoint, Dispatcher, Server, ServiceConfig};
use schemagate_transport::CancellationToken;
use tracing::{info, warn};

use crate::cmd::{ServeArgs, ServiceArgs};
use crate::exit::{io_error, service_error, CliError, CliResult, INTERNAL, SUCCESS};

pub fn run(args: ServeArgs, service: &ServiceArgs) -> CliResult<i32> {
    let config = args.apply(service.service_config());
    let endpoint = args.endpoint();
    let dispatcher = Dispatcher::new(&config).map_err(|err| service_error("startup failed", err))?;
    let server = Server::new(Arc::new(dispatcher), &config);

    let token = CancellationToken::new();
    install_ctrlc_handler(token.clone())?;

    let bound = BoundEndpoint::bind(&endpoint).map_err(|err| service_error("bind failed", err))?;
    let lifecycle = Lifecycle::new(endpoint.mode_name(), &bound, &config);
    lifecycle.log("ready");

    let marker = match &args.ready_file {
        Some(path) => Some(
            ReadyMarker::write(path, endpoint.mode_name())
                .map_err(|err| io_error("ready file write failed", err))?,
        ),
        None => None,
    };

    let result = bound.serve(&server, &token);
    drop(bound);
    drop(marker);
    lifecycle.log("shutdown");

    result.map_err(|err| service_error("serve failed", err))?;
    Ok(SUCCESS)
}

fn install_ctrlc_handler(token: CancellationToken) -> CliResult<()> {
    ctrlc::set_handler(move || token.cancel())
        .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}

/// Fields repeated on the `ready` and `shutdown` events.
struct Lifecycle {
    mode: &'static str,
    location: Location,
    schemas_dir: String,
    examples_dir: String,
    schemas_base: String,
    schema_version: String,
    cache_dir: String,
}

enum Location {
    None,
    Tcp { host: String, port: u16 },
    Path(String),
}

impl Lifecycle {
    fn new(mode: &'static str, bound: &BoundEndpoint, config: &ServiceConfig) -> Self {
        let location = match bound {
            BoundEndpoint::Stdio => Location::None,
            BoundEndpoint::Tcp(listener) => {
                let addr = listener.local_addr();
                Location::Tcp {
                    host: addr.ip().to_string(),
                    port: addr.port(),
                }
            }
            #[cfg(unix)]
            BoundEndpoint::Unix(listener) => Location::Path(listener.path().display().to_string()),
        };
        Self {
            mode,
            location,
            schemas_dir: config.resolver.schemas_dir.display().to_string(),
            examples_dir: config.examples_dir.display().to_string(),
            schemas_base: config.resolver.base_url.clone(),
            schema_version: config.resolver.version.clone(),
            cache_dir: config
                .resolver
                .cache_dir
                .as_ref()
                .map(|dir| dir.display().to_string())
                .unwrap_or_default(),
        }
    }

    fn log(&self, event: &str) {
        let timestamp = now_rfc3339();
        match &self.location {
            Location::Tcp { host, port } => info!(
                mode = self.mode,
                host = %host,
                port = *port,
                schemas_dir = %self.schemas_dir,
                examples_dir = %self.examples_dir,
                schemas_base = %self.schemas_base,
                schema_version = %self.schema_version,
                cache_dir = %self.cache_dir,
                timestamp = %timestamp,
                "{event}"
            ),
            Location::Path(path) => info!(
                mode = self.mode,
                path = %path,
                schemas_dir = %self.schemas_dir,
                examples_dir = %self.examples_dir,
                schemas_base = %self.schemas_base,
                schema_version = %self.schema_version,
                cache_dir = %self.cache_dir,
                timestamp = %timestamp,
                "{event}"
            ),
            Location::None => info!(
                mode = self.mode,
                schemas_dir = %self.schemas_dir,
                examples_dir = %self.examples_dir,
                schemas_base = %self.schemas_base,
                schema_version = %self.schema_version,
                cache_dir = %self.cache_dir,
                timestamp = %timestamp,
                "{event}"
            ),
        }
    }
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Ready marker file, removed when dropped.
struct ReadyMarker {
    path: PathBuf,
}

impl ReadyMarker {
    fn write(path: &Path, mode: &str) -> std::io::Result<Self> {
        let body = serde_json::json!({
            "pid": std::process::id(),
            "mode": mode,
            "timestamp": now_rfc3339(),
        });
        let staging = path.with_extension("tmp");
        std::fs::write(&staging, format!("{body}\n"))?;
        std::fs::rename(&staging, path)?;
        Ok(Self {
            path: path.to_path_buf(),
        })
    }
}

impl Drop for ReadyMarker {
    fn drop(&mut self) {
        if let Err(err) = std::fs::remove_file(&self.path) {
            if err.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %err, "ready file removal failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ready_marker_is_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schemagate.ready");

        let marker = ReadyMarker::write(&path, "tcp").unwrap();
        let body: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(body["mode"], "tcp");
        assert_eq!(body["pid"], std::process::id());
        assert!(body["timestamp"].as_str().unwrap().ends_with('Z'));

        drop(marker);
        assert!(!path.exists());
    }
}
