use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use schemagate_schema::{ResolverConfig, DEFAULT_SCHEMAS_BASE, DEFAULT_SCHEMAS_VERSION};
use schemagate_service::{BackendConfig, ServiceConfig, DEFAULT_BACKEND_ASSETS_PATH};
use schemagate_transport::Endpoint;

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod schemas;
pub mod serve;
pub mod validate;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve requests on the configured endpoint until stdin closes or a signal arrives.
    Serve(ServeArgs),
    /// Validate one JSON asset file and print the result.
    Validate(ValidateArgs),
    /// List the schemas found under the schemas directory.
    Schemas,
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, service: &ServiceArgs, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args, service),
        Command::Validate(args) => validate::run(args, service),
        Command::Schemas => schemas::run(service, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum EndpointKind {
    Stdio,
    Socket,
    Tcp,
}

/// Options shared by every command that touches schemas or examples.
#[derive(Args, Debug, Clone)]
pub struct ServiceArgs {
    /// Local schemas root.
    #[arg(long, env = "SYN_SCHEMAS_DIR", default_value = "schemas", global = true)]
    pub schemas_dir: PathBuf,
    /// Examples root.
    #[arg(long, env = "SYN_EXAMPLES_DIR", default_value = "examples", global = true)]
    pub examples_dir: PathBuf,
    /// Canonical schema base URL, without the version segment.
    #[arg(long, env = "SYN_SCHEMAS_BASE_URL", default_value = DEFAULT_SCHEMAS_BASE, global = true)]
    pub schemas_base: String,
    /// Canonical schema version.
    #[arg(long, env = "SYN_SCHEMAS_VERSION", default_value = DEFAULT_SCHEMAS_VERSION, global = true)]
    pub schemas_version: String,
    /// Directory for downloaded schemas. Unset disables the cache.
    #[arg(long, env = "SYN_SCHEMA_CACHE_DIR", global = true)]
    pub schema_cache_dir: Option<PathBuf>,
    /// Maximum number of assets per validate_many call.
    #[arg(long, env = "MCP_MAX_BATCH", default_value_t = 100, global = true)]
    pub max_batch: usize,
}

impl ServiceArgs {
    pub fn resolver_config(&self) -> ResolverConfig {
        ResolverConfig {
            base_url: self.schemas_base.clone(),
            version: self.schemas_version.clone(),
            cache_dir: self.schema_cache_dir.clone(),
            ..ResolverConfig::new(&self.schemas_dir)
        }
    }

    pub fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            resolver: self.resolver_config(),
            max_batch: self.max_batch,
            ..ServiceConfig::new(&self.schemas_dir, &self.examples_dir)
        }
    }
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Transport to serve on.
    #[arg(long, env = "MCP_ENDPOINT", value_enum, default_value = "stdio")]
    pub endpoint: EndpointKind,
    /// TCP bind host.
    #[arg(long, env = "MCP_HOST", default_value = "127.0.0.1")]
    pub host: String,
    /// TCP bind port.
    #[arg(long, env = "MCP_PORT", default_value_t = 7000)]
    pub port: u16,
    /// Unix socket path.
    #[arg(long, env = "MCP_SOCKET_PATH", default_value = "/tmp/schemagate.sock")]
    pub socket_path: PathBuf,
    /// Unix socket permissions, in octal.
    #[arg(long, env = "MCP_SOCKET_MODE", default_value = "0600", value_parser = parse_octal_mode)]
    pub socket_mode: u32,
    /// Written once the endpoint accepts requests and removed on shutdown.
    #[arg(long, env = "MCP_READY_FILE")]
    pub ready_file: Option<PathBuf>,
    /// Backend base URL for populate_backend. Unset disables it.
    #[arg(long, env = "SYN_BACKEND_URL")]
    pub backend_url: Option<String>,
    /// Path appended to the backend URL when posting assets.
    #[arg(long, env = "SYN_BACKEND_ASSETS_PATH", default_value = DEFAULT_BACKEND_ASSETS_PATH)]
    pub backend_assets_path: String,
    /// Milliseconds in-flight connections get to finish after a shutdown signal.
    #[arg(long, env = "MCP_SHUTDOWN_GRACE_MS", default_value_t = 2000)]
    pub grace: u64,
}

impl ServeArgs {
    pub fn endpoint(&self) -> Endpoint {
        match self.endpoint {
            EndpointKind::Stdio => Endpoint::Stdio,
            EndpointKind::Socket => Endpoint::Unix {
                path: self.socket_path.clone(),
                mode: self.socket_mode,
            },
            EndpointKind::Tcp => Endpoint::tcp(&self.host, self.port),
        }
    }

    /// Layer the serving options over the shared ones.
    pub fn apply(&self, mut config: ServiceConfig) -> ServiceConfig {
        config.backend = self.backend_url.as_ref().map(|url| BackendConfig {
            assets_path: self.backend_assets_path.clone(),
            ..BackendConfig::new(url)
        });
        config.shutdown_grace = Duration::from_millis(self.grace);
        config
    }
}

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// JSON asset file to validate.
    pub file: PathBuf,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

fn parse_octal_mode(raw: &str) -> Result<u32, String> {
    let digits = raw.trim().trim_start_matches("0o");
    let mode = u32::from_str_radix(digits, 8).map_err(|err| format!("invalid octal mode: {err}"))?;
    if mode > 0o7777 {
        return Err(format!("mode {raw} is out of range"));
    }
    Ok(mode)
}
