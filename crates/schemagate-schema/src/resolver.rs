use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::canonical::{parse_marker, SchemaRef};
use crate::config::ResolverConfig;
use crate::error::{Result, SchemaError};
use crate::fetch::{HttpFetcher, SchemaCache, SchemaFetcher};
use crate::guard;

/// Where a resolved schema came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaSource {
    /// A file under the schemas root.
    Local(PathBuf),
    /// A cached copy of an earlier download.
    Cache(PathBuf),
    /// Fetched over the network from this URL.
    Remote(String),
}

impl SchemaSource {
    /// Filesystem location, if the schema came from the schemas root.
    pub fn local_path(&self) -> Option<&Path> {
        match self {
            Self::Local(path) => Some(path),
            Self::Cache(_) | Self::Remote(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedSchema {
    pub schema: Value,
    pub source: SchemaSource,
    pub reference: SchemaRef,
}

/// Maps `$schema` markers to schema documents.
///
/// Lookup order: schemas root, on-disk cache, canonical URL, and finally
/// the URL the asset asked for when it differs from the canonical one.
/// A local schema always wins over anything remote.
#[derive(Clone)]
pub struct SchemaResolver {
    config: ResolverConfig,
    fetcher: Arc<dyn SchemaFetcher>,
    cache: Option<SchemaCache>,
}

impl SchemaResolver {
    /// Resolver that fetches over HTTP.
    pub fn new(config: ResolverConfig) -> Result<Self> {
        let fetcher = HttpFetcher::new(config.fetch_timeout)?;
        Ok(Self::with_fetcher(config, Arc::new(fetcher)))
    }

    pub fn with_fetcher(config: ResolverConfig, fetcher: Arc<dyn SchemaFetcher>) -> Self {
        let cache = config.cache_dir.clone().map(SchemaCache::new);
        Self {
            config,
            fetcher,
            cache,
        }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolve a raw `$schema` marker.
    pub fn resolve(&self, marker: &str) -> Result<ResolvedSchema> {
        let reference = parse_marker(marker, &self.config)?;
        self.resolve_reference(reference)
    }

    /// Resolve an already parsed reference.
    pub fn resolve_reference(&self, reference: SchemaRef) -> Result<ResolvedSchema> {
        if let Some(path) = self.local_path(&reference)? {
            let schema = read_schema_file(&path, self.config.max_schema_file_size)?;
            debug!(schema = %reference.canonical_name, path = %path.display(), "resolved local schema");
            return Ok(ResolvedSchema {
                schema,
                source: SchemaSource::Local(path),
                reference,
            });
        }

        if let Some((schema, path)) = self
            .cache
            .as_ref()
            .and_then(|cache| cache.load(&reference.canonical_filename))
        {
            debug!(schema = %reference.canonical_name, path = %path.display(), "resolved cached schema");
            return Ok(ResolvedSchema {
                schema,
                source: SchemaSource::Cache(path),
                reference,
            });
        }

        let canonical_err = match self.fetcher.fetch(&reference.canonical_url) {
            Ok(schema) => return Ok(self.remember(reference.canonical_url.clone(), schema, reference)),
            Err(err) => err,
        };

        if reference.requested_url != reference.canonical_url {
            warn!(
                canonical = %reference.canonical_url,
                requested = %reference.requested_url,
                error = %canonical_err,
                "canonical fetch failed; retrying requested url"
            );
            match self.fetcher.fetch(&reference.requested_url) {
                Ok(schema) => {
                    return Ok(self.remember(reference.requested_url.clone(), schema, reference))
                }
                Err(err) => return Err(SchemaError::Unresolved(err.to_string())),
            }
        }

        Err(SchemaError::Unresolved(canonical_err.to_string()))
    }

    /// Path of the schema under the schemas root, if the file exists.
    ///
    /// Names that escape the root fail even when nothing exists there.
    pub fn local_path(&self, reference: &SchemaRef) -> Result<Option<PathBuf>> {
        let path = guard::resolve(&self.config.schemas_dir, &reference.canonical_filename)?;
        Ok(path.is_file().then_some(path))
    }

    fn remember(&self, url: String, schema: Value, reference: SchemaRef) -> ResolvedSchema {
        if let Some(cache) = &self.cache {
            cache.store(&reference.canonical_filename, &schema);
        }
        debug!(schema = %reference.canonical_name, %url, "resolved remote schema");
        ResolvedSchema {
            schema,
            source: SchemaSource::Remote(url),
            reference,
        }
    }
}

impl std::fmt::Debug for SchemaResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaResolver")
            .field("config", &self.config)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

/// Read and parse a schema file, refusing files over `max_size` bytes.
pub(crate) fn read_schema_file(path: &Path, max_size: usize) -> Result<Value> {
    let load_err = |reason: String| SchemaError::LoadFailed {
        location: path.display().to_string(),
        reason,
    };

    let file = std::fs::File::open(path).map_err(|err| load_err(err.to_string()))?;
    let mut bytes = Vec::new();
    file.take(max_size as u64 + 1)
        .read_to_end(&mut bytes)
        .map_err(|err| load_err(err.to_string()))?;
    if bytes.len() > max_size {
        return Err(load_err(format!("file exceeds {max_size} bytes")));
    }
    serde_json::from_slice(&bytes).map_err(|err| load_err(err.to_string()))
}
