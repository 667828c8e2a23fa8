use std::path::PathBuf;
use std::time::Duration;

use schemagate_frame::FrameConfig;
use schemagate_schema::{ResolverConfig, DEFAULT_MAX_BATCH};

use crate::error::{Result, ServiceError};

/// Default path appended to the backend base URL for asset uploads.
pub const DEFAULT_BACKEND_ASSETS_PATH: &str = "/synesthetic-assets/";
/// Default timeout for a backend POST.
pub const DEFAULT_BACKEND_TIMEOUT: Duration = Duration::from_secs(10);
/// How often blocked reads and accepts wake up to check for cancellation.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);
/// How long shutdown waits for in-flight connections.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_millis(2000);

/// Where validated assets may be pushed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    pub base_url: String,
    pub assets_path: String,
    pub timeout: Duration,
}

impl BackendConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            assets_path: DEFAULT_BACKEND_ASSETS_PATH.to_string(),
            timeout: DEFAULT_BACKEND_TIMEOUT,
        }
    }

    /// Full upload URL: base without trailing `/` plus the assets path.
    pub fn assets_url(&self) -> String {
        let path = self.assets_path.trim();
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };
        format!("{}{path}", self.base_url.trim_end_matches('/'))
    }
}

/// Everything the service needs, resolved by the caller.
///
/// The service never reads the environment itself.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub resolver: ResolverConfig,
    pub examples_dir: PathBuf,
    pub max_batch: usize,
    pub backend: Option<BackendConfig>,
    pub poll_interval: Duration,
    pub shutdown_grace: Duration,
    pub write_timeout: Option<Duration>,
}

impl ServiceConfig {
    pub fn new(schemas_dir: impl Into<PathBuf>, examples_dir: impl Into<PathBuf>) -> Self {
        Self {
            resolver: ResolverConfig::new(schemas_dir),
            examples_dir: examples_dir.into(),
            ..Self::default()
        }
    }

    /// Reject values the service cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.max_batch == 0 {
            return Err(ServiceError::InvalidConfig(
                "max batch must be a positive integer".to_string(),
            ));
        }
        if self.resolver.max_payload_size == 0 {
            return Err(ServiceError::InvalidConfig(
                "max payload size must be positive".to_string(),
            ));
        }
        if self.poll_interval.is_zero() {
            return Err(ServiceError::InvalidConfig(
                "poll interval must be non-zero".to_string(),
            ));
        }
        if let Some(backend) = &self.backend {
            if !backend.base_url.starts_with("http://") && !backend.base_url.starts_with("https://")
            {
                return Err(ServiceError::InvalidConfig(format!(
                    "backend url must be http(s): {}",
                    backend.base_url
                )));
            }
        }
        Ok(())
    }

    /// Frame settings for socket connections.
    pub fn frame_config(&self) -> FrameConfig {
        FrameConfig {
            max_frame_size: self.resolver.max_payload_size,
            read_timeout: Some(self.poll_interval),
            write_timeout: self.write_timeout,
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            resolver: ResolverConfig::default(),
            examples_dir: PathBuf::from("examples"),
            max_batch: DEFAULT_MAX_BATCH,
            backend: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            write_timeout: Some(Duration::from_secs(30)),
        }
    }
}
