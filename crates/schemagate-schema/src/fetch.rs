use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{Result, SchemaError};

/// Retrieves a schema document by URL.
pub trait SchemaFetcher: Send + Sync {
    fn fetch(&self, url: &str) -> Result<Value>;
}

/// Blocking HTTP fetcher with a per-request timeout.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("schemagate/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| SchemaError::FetchFailed {
                url: String::new(),
                reason: format!("client setup failed: {err}"),
            })?;
        Ok(Self { client })
    }
}

impl SchemaFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Value> {
        let fetch_err = |reason: String| SchemaError::FetchFailed {
            url: url.to_string(),
            reason,
        };

        debug!(url, "fetching remote schema");
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| fetch_err(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(fetch_err(format!("http status {}", status.as_u16())));
        }
        response
            .json::<Value>()
            .map_err(|err| fetch_err(format!("invalid json: {err}")))
    }
}

/// Fetcher for deployments without network access; every fetch fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineFetcher;

impl SchemaFetcher for OfflineFetcher {
    fn fetch(&self, url: &str) -> Result<Value> {
        Err(SchemaError::FetchFailed {
            url: url.to_string(),
            reason: "remote fetch disabled".to_string(),
        })
    }
}

/// On-disk cache of downloaded schemas, keyed by canonical filename.
///
/// Entries are written once and never invalidated. Writes go through a
/// temporary file and a rename so concurrent writers of the same schema
/// never expose a torn file. Failures are logged and otherwise ignored.
#[derive(Debug, Clone)]
pub struct SchemaCache {
    dir: PathBuf,
}

impl SchemaCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Cache file for a canonical filename. Nested names are flattened.
    pub fn entry_path(&self, canonical_filename: &str) -> PathBuf {
        self.dir.join(canonical_filename.replace(['/', '\\'], "__"))
    }

    /// Load a cached schema, if present and parseable.
    pub fn load(&self, canonical_filename: &str) -> Option<(Value, PathBuf)> {
        let path = self.entry_path(canonical_filename);
        let bytes = std::fs::read(&path).ok()?;
        match serde_json::from_slice(&bytes) {
            Ok(value) => Some((value, path)),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "ignoring corrupt cached schema");
                None
            }
        }
    }

    /// Persist a fetched schema.
    pub fn store(&self, canonical_filename: &str, schema: &Value) {
        if let Err(err) = self.try_store(canonical_filename, schema) {
            warn!(
                dir = %self.dir.display(),
                schema = canonical_filename,
                error = %err,
                "failed to write schema cache entry"
            );
        }
    }

    fn try_store(&self, canonical_filename: &str, schema: &Value) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let target = self.entry_path(canonical_filename);
        if target.exists() {
            return Ok(());
        }
        let bytes = serde_json::to_vec_pretty(schema).map_err(std::io::Error::other)?;
        let tmp = self.dir.join(format!(
            ".{}.{}.tmp",
            target
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
            std::process::id()
        ));
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(&tmp, &target).inspect_err(|_| {
            let _ = std::fs::remove_file(&tmp);
        })
    }
}
