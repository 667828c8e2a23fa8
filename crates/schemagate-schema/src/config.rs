use std::path::PathBuf;
use std::time::Duration;

use schemagate_frame::DEFAULT_MAX_FRAME;

/// Published location of the canonical schemas.
pub const DEFAULT_SCHEMAS_BASE: &str = "https://delk73.github.io/synesthetic-schemas/schema";
/// Schema version assets are expected to target.
pub const DEFAULT_SCHEMAS_VERSION: &str = "0.7.3";
/// Default cap on `validate_many` batch length.
pub const DEFAULT_MAX_BATCH: usize = 100;

/// Controls schema resolution and validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverConfig {
    /// Local schemas root, consulted before any network access.
    pub schemas_dir: PathBuf,
    /// Canonical base URL, without the version segment.
    pub base_url: String,
    /// Canonical schema version.
    pub version: String,
    /// Where downloaded schemas are kept. `None` disables the cache.
    pub cache_dir: Option<PathBuf>,
    /// Timeout for a single remote fetch.
    pub fetch_timeout: Duration,
    /// Maximum serialized asset size accepted for validation.
    pub max_payload_size: usize,
    /// Maximum number of schema files indexed from the schemas root.
    pub max_schemas_from_directory: usize,
    /// Maximum bytes allowed per schema file.
    pub max_schema_file_size: usize,
}

impl ResolverConfig {
    pub fn new(schemas_dir: impl Into<PathBuf>) -> Self {
        Self {
            schemas_dir: schemas_dir.into(),
            ..Self::default()
        }
    }

    /// `base + "/" + version + "/"`, the prefix every canonical marker must start with.
    pub fn canonical_prefix(&self) -> String {
        format!(
            "{}/{}/",
            self.base_url.trim_end_matches('/'),
            self.version.trim_matches('/')
        )
    }

    /// Canonical URL for a schema filename.
    pub fn canonical_url(&self, filename: &str) -> String {
        format!("{}{filename}", self.canonical_prefix())
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            schemas_dir: PathBuf::from("schemas"),
            base_url: DEFAULT_SCHEMAS_BASE.to_string(),
            version: DEFAULT_SCHEMAS_VERSION.to_string(),
            cache_dir: None,
            fetch_timeout: Duration::from_secs(5),
            max_payload_size: DEFAULT_MAX_FRAME,
            max_schemas_from_directory: 256,
            max_schema_file_size: 1024 * 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_prefix_normalizes_slashes() {
        let config = ResolverConfig {
            base_url: "https://example.test/schema/".to_string(),
            version: "/1.2.0/".to_string(),
            ..ResolverConfig::default()
        };
        assert_eq!(config.canonical_prefix(), "https://example.test/schema/1.2.0/");
        assert_eq!(
            config.canonical_url("asset.schema.json"),
            "https://example.test/schema/1.2.0/asset.schema.json"
        );
    }

    #[test]
    fn defaults_point_at_published_schemas() {
        let config = ResolverConfig::new("/srv/schemas");
        assert_eq!(
            config.canonical_prefix(),
            "https://delk73.github.io/synesthetic-schemas/schema/0.7.3/"
        );
        assert_eq!(config.max_payload_size, 1024 * 1024);
        assert!(config.cache_dir.is_none());
    }
}
