use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::SystemTime;

use jsonschema::{Retrieve, Uri};
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;
use walkdir::WalkDir;

use crate::config::ResolverConfig;
use crate::guard;
use crate::resolver::read_schema_file;

/// In-memory index of every schema under the schemas root.
///
/// Each document is reachable by its `$id`, by its canonical URL
/// (prefix + relative path) and by its relative path, so cross-schema
/// `$ref`s resolve without touching the network.
#[derive(Debug, Default)]
pub struct LocalRegistry {
    root: PathBuf,
    prefix: String,
    max_schema_file_size: usize,
    by_uri: HashMap<String, Value>,
    documents: usize,
}

impl LocalRegistry {
    /// Scan the schemas root. A missing or unreadable root yields an empty registry.
    pub fn build(config: &ResolverConfig) -> Self {
        let root = guard::absolute_root(&config.schemas_dir);
        let mut registry = Self {
            prefix: config.canonical_prefix(),
            max_schema_file_size: config.max_schema_file_size,
            root: root.clone(),
            ..Self::default()
        };
        if !root.is_dir() {
            debug!(root = %root.display(), "schemas root missing; registry empty");
            return registry;
        }

        for path in schema_files(&root) {
            if registry.documents >= config.max_schemas_from_directory {
                warn!(
                    root = %root.display(),
                    limit = config.max_schemas_from_directory,
                    "schema directory exceeds limit; remaining files not indexed"
                );
                break;
            }
            let Some(relative) = guard::relative_to(&root, &path) else {
                continue;
            };
            match read_schema_file(&path, config.max_schema_file_size) {
                Ok(schema) => registry.insert(relative, schema),
                Err(err) => warn!(error = %err, "skipping unreadable schema"),
            }
        }

        debug!(root = %root.display(), documents = registry.documents, "schema registry built");
        registry
    }

    fn insert(&mut self, relative: String, schema: Value) {
        if let Some(id) = schema.get("$id").and_then(Value::as_str) {
            self.by_uri.insert(strip_fragment(id).to_string(), schema.clone());
        }
        self.by_uri
            .insert(format!("{}{relative}", self.prefix), schema.clone());
        self.by_uri.insert(relative, schema);
        self.documents += 1;
    }

    /// Number of schema files indexed.
    pub fn len(&self) -> usize {
        self.documents
    }

    pub fn is_empty(&self) -> bool {
        self.documents == 0
    }

    /// Look up a document by URI or relative path.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.by_uri
            .get(key)
            .or_else(|| self.by_uri.get(strip_fragment(key)))
    }

    fn lookup(&self, uri: &str) -> Option<Value> {
        if let Some(schema) = self.get(uri) {
            return Some(schema.clone());
        }

        let bare = strip_fragment(uri);
        if let Some(relative) = bare.strip_prefix(self.prefix.as_str()) {
            if let Some(schema) = self.get(relative) {
                return Some(schema.clone());
            }
        }

        if bare.starts_with("file:") {
            if let Some(schema) = self.read_file_uri(bare) {
                return Some(schema);
            }
        }

        let filename = bare.rsplit('/').next().unwrap_or(bare);
        self.get(filename).cloned()
    }

    /// Read a `file://` reference, but only from inside the schemas root.
    fn read_file_uri(&self, uri: &str) -> Option<Value> {
        let path = Url::parse(uri).ok()?.to_file_path().ok()?;
        let relative = path.strip_prefix(&self.root).ok()?;
        let confined = guard::resolve(&self.root, &relative.to_string_lossy()).ok()?;
        read_schema_file(&confined, self.max_schema_file_size).ok()
    }
}

/// `$ref` retriever backed by a [`LocalRegistry`].
#[derive(Debug, Clone)]
pub struct LocalRetriever {
    registry: Arc<LocalRegistry>,
}

impl LocalRetriever {
    pub fn new(registry: Arc<LocalRegistry>) -> Self {
        Self { registry }
    }
}

impl Retrieve for LocalRetriever {
    fn retrieve(&self, uri: &Uri<&str>) -> Result<Value, Box<dyn std::error::Error + Send + Sync>> {
        let uri = uri.as_str();
        self.registry
            .lookup(uri)
            .ok_or_else(|| format!("unresolved schema reference: {uri}").into())
    }
}

/// Memoizes the registry until the schemas root changes.
///
/// The fingerprint covers file count, total size and newest mtime of the
/// `*.json` files under the root, so adding, removing or editing a schema
/// triggers a rebuild on the next lookup.
#[derive(Debug, Default)]
pub struct RegistryCache {
    slot: Mutex<Option<(Fingerprint, Arc<LocalRegistry>)>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Fingerprint {
    root: PathBuf,
    prefix: String,
    files: usize,
    bytes: u64,
    newest: Option<SystemTime>,
}

impl RegistryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current registry for `config`, rebuilt if the directory changed.
    pub fn get(&self, config: &ResolverConfig) -> Arc<LocalRegistry> {
        let fingerprint = fingerprint(config);
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some((cached, registry)) = slot.as_ref() {
            if *cached == fingerprint {
                return Arc::clone(registry);
            }
        }

        let registry = Arc::new(LocalRegistry::build(config));
        *slot = Some((fingerprint, Arc::clone(&registry)));
        registry
    }
}

fn fingerprint(config: &ResolverConfig) -> Fingerprint {
    let root = guard::absolute_root(&config.schemas_dir);
    let mut print = Fingerprint {
        prefix: config.canonical_prefix(),
        root: root.clone(),
        files: 0,
        bytes: 0,
        newest: None,
    };
    for path in schema_files(&root) {
        let Ok(meta) = std::fs::metadata(&path) else {
            continue;
        };
        print.files += 1;
        print.bytes = print.bytes.saturating_add(meta.len());
        if let Ok(modified) = meta.modified() {
            print.newest = Some(print.newest.map_or(modified, |newest| newest.max(modified)));
        }
    }
    print
}

/// Regular `*.json` files under `root`, sorted, symlinks skipped.
fn schema_files(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
        })
        .map(|entry| entry.into_path())
        .collect();
    files.sort();
    files
}

fn strip_fragment(uri: &str) -> &str {
    uri.split('#').next().unwrap_or(uri)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    const PREFIX: &str = "https://delk73.github.io/synesthetic-schemas/schema/0.7.3/";

    fn write(dir: &Path, name: &str, value: &Value) {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, serde_json::to_vec(value).unwrap()).unwrap();
    }

    fn seeded() -> (tempfile::TempDir, ResolverConfig) {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "shader.schema.json",
            &json!({"$id": "https://other.example/shader", "type": "object"}),
        );
        write(dir.path(), "sub/control.schema.json", &json!({"type": "array"}));
        std::fs::write(dir.path().join("broken.schema.json"), b"{nope").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();
        let config = ResolverConfig::new(dir.path());
        (dir, config)
    }

    #[test]
    fn registers_id_canonical_url_and_relative_path() {
        let (_dir, config) = seeded();
        let registry = LocalRegistry::build(&config);

        assert_eq!(registry.len(), 2);
        assert!(registry.get("https://other.example/shader").is_some());
        assert!(registry.get(&format!("{PREFIX}shader.schema.json")).is_some());
        assert!(registry.get("sub/control.schema.json").is_some());
        assert!(registry.get(&format!("{PREFIX}sub/control.schema.json#/items")).is_some());
    }

    #[test]
    fn missing_root_is_empty_not_an_error() {
        let registry = LocalRegistry::build(&ResolverConfig::new("/definitely/not/here"));
        assert!(registry.is_empty());
        assert!(registry.lookup(&format!("{PREFIX}x.schema.json")).is_none());
    }

    #[test]
    fn directory_limit_stops_indexing() {
        let (_dir, config) = seeded();
        let config = ResolverConfig {
            max_schemas_from_directory: 1,
            ..config
        };
        assert_eq!(LocalRegistry::build(&config).len(), 1);
    }

    #[test]
    fn lookup_falls_back_to_filename_and_file_uri() {
        let (dir, config) = seeded();
        let registry = LocalRegistry::build(&config);

        let foreign = registry.lookup("https://mirror.example/any/shader.schema.json");
        assert_eq!(foreign.unwrap()["type"], "object");

        let root = dir.path().canonicalize().unwrap();
        let file_uri = Url::from_file_path(root.join("sub/control.schema.json")).unwrap();
        assert_eq!(registry.lookup(file_uri.as_str()).unwrap()["type"], "array");
    }

    #[cfg(unix)]
    #[test]
    fn file_uri_outside_root_is_refused() {
        let (_dir, config) = seeded();
        let outside = tempfile::tempdir().unwrap();
        write(outside.path(), "secret.json", &json!({"secret": true}));
        let registry = LocalRegistry::build(&config);

        let uri = Url::from_file_path(outside.path().canonicalize().unwrap().join("secret.json"))
            .unwrap();
        assert!(registry.read_file_uri(uri.as_str()).is_none());
    }

    #[test]
    fn cache_reuses_until_directory_changes() {
        let (dir, config) = seeded();
        let cache = RegistryCache::new();

        let first = cache.get(&config);
        let second = cache.get(&config);
        assert!(Arc::ptr_eq(&first, &second));

        write(dir.path(), "extra.schema.json", &json!({"type": "null"}));
        let third = cache.get(&config);
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(third.len(), 3);
    }
}
