use std::io::Write;
use std::sync::Arc;

use schemagate_frame::{ErrorEntry, Outcome, Reason};
use serde_json::{json, Value};
use tracing::{debug, warn};
use url::Url;

use crate::config::{ResolverConfig, DEFAULT_MAX_BATCH};
use crate::error::{Result, SchemaError};
use crate::registry::{LocalRetriever, RegistryCache};
use crate::resolver::{ResolvedSchema, SchemaResolver, SchemaSource};

const LEGACY_KEYS: [&str; 2] = ["schema", "$schemaRef"];

/// Validates assets against the schema their `$schema` marker names.
#[derive(Debug)]
pub struct ValidationEngine {
    resolver: SchemaResolver,
    registries: RegistryCache,
    max_batch: usize,
}

impl ValidationEngine {
    /// Engine with an HTTP-backed resolver and the default batch cap.
    pub fn new(config: ResolverConfig) -> Result<Self> {
        Ok(Self::with_resolver(SchemaResolver::new(config)?))
    }

    pub fn with_resolver(resolver: SchemaResolver) -> Self {
        Self {
            resolver,
            registries: RegistryCache::new(),
            max_batch: DEFAULT_MAX_BATCH,
        }
    }

    pub fn with_max_batch(mut self, max_batch: usize) -> Self {
        self.max_batch = max_batch.max(1);
        self
    }

    pub fn resolver(&self) -> &SchemaResolver {
        &self.resolver
    }

    pub fn config(&self) -> &ResolverConfig {
        self.resolver.config()
    }

    pub fn max_batch(&self) -> usize {
        self.max_batch
    }

    /// Validate one asset.
    ///
    /// Success always carries an empty `errors` list. Every failure path
    /// returns an outcome; nothing here is surfaced as an `Err`.
    pub fn validate_asset(&self, asset: &Value) -> Outcome {
        if exceeds_size(asset, self.config().max_payload_size) {
            return Outcome::payload_too_large();
        }

        let Some(object) = asset.as_object() else {
            return Outcome::invalid("/", "asset_must_be_object");
        };

        let marker = match object.get("$schema") {
            Some(Value::String(marker)) if !marker.trim().is_empty() => marker,
            _ => return Outcome::invalid("/$schema", "missing_schema"),
        };

        let legacy: Vec<&str> = LEGACY_KEYS
            .into_iter()
            .filter(|key| object.contains_key(*key))
            .collect();
        if !legacy.is_empty() {
            return Outcome::invalid("/", format!("legacy_schema_keys: {}", legacy.join(", ")));
        }

        let resolved = match self.resolver.resolve(marker) {
            Ok(resolved) => resolved,
            Err(err) => return resolution_failure(err),
        };

        let mut instance = asset.clone();
        if let Value::Object(map) = &mut instance {
            map.remove("$schema");
        }

        match self.check(&resolved, &instance) {
            Ok(errors) if errors.is_empty() => Outcome::success().with_errors(Vec::new()),
            Ok(errors) => Outcome::validation_failed(errors),
            Err(err) => resolution_failure(err),
        }
    }

    /// Validate each asset independently.
    ///
    /// Batches over the cap are refused without validating anything.
    /// Top-level `ok` is true only when every item passed.
    pub fn validate_many(&self, assets: &[Value]) -> Outcome {
        if assets.len() > self.max_batch {
            return Outcome::unsupported("batch_too_large").with("limit", self.max_batch);
        }

        let mut all_ok = true;
        let results: Vec<Value> = assets
            .iter()
            .map(|asset| {
                let outcome = self.validate_asset(asset);
                all_ok &= outcome.ok;
                item_result(&outcome)
            })
            .collect();

        let outcome = if all_ok {
            Outcome::success()
        } else {
            Outcome::failure(Reason::ValidationFailed)
        };
        outcome.with("results", results)
    }

    fn check(&self, resolved: &ResolvedSchema, instance: &Value) -> Result<Vec<ErrorEntry>> {
        let mut schema = resolved.schema.clone();
        if let (SchemaSource::Local(path), Value::Object(map)) = (&resolved.source, &mut schema) {
            if !map.contains_key("$id") {
                if let Ok(base) = Url::from_file_path(path) {
                    map.insert("$id".to_string(), Value::String(base.to_string()));
                }
            }
        }

        let registry = self.registries.get(self.config());
        let mut options = jsonschema::options();
        options.with_draft(jsonschema::Draft::Draft202012);
        options.with_retriever(LocalRetriever::new(Arc::clone(&registry)));
        let validator = options
            .build(&schema)
            .map_err(|err| SchemaError::CompileFailed(err.to_string()))?;

        let mut errors: Vec<ErrorEntry> = validator
            .iter_errors(instance)
            .map(|err| {
                let path = err.instance_path.to_string();
                let path = if path.is_empty() { "/".to_string() } else { path };
                ErrorEntry::new(path, err.to_string())
            })
            .collect();
        errors.sort();
        debug!(
            schema = %resolved.reference.canonical_name,
            errors = errors.len(),
            "asset validated"
        );
        Ok(errors)
    }
}

fn resolution_failure(err: SchemaError) -> Outcome {
    match err {
        SchemaError::InvalidMarker(_) => Outcome::invalid("/$schema", "invalid_schema_marker"),
        SchemaError::NotCanonical(_) => Outcome::invalid("/$schema", "schema_not_canonical"),
        SchemaError::OutsideRoot(_) => {
            Outcome::invalid("/$schema", "schema_outside_configured_root")
        }
        other => {
            warn!(error = %other, "schema resolution failed");
            Outcome::failure(Reason::SchemaResolutionFailed).with_detail(other.to_string())
        }
    }
}

fn item_result(outcome: &Outcome) -> Value {
    let mut item = json!({ "ok": outcome.ok });
    if !outcome.ok {
        if let Some(reason) = outcome.reason {
            item["reason"] = json!(reason.as_str());
        }
        if let Some(errors) = &outcome.errors {
            item["errors"] = json!(errors
                .iter()
                .map(|entry| json!({ "path": entry.path, "msg": entry.msg }))
                .collect::<Vec<_>>());
        }
        if let Some(detail) = &outcome.detail {
            item["detail"] = json!(detail);
        }
    }
    item
}

/// True when the compact JSON encoding of `value` is longer than `limit` bytes.
pub fn exceeds_size(value: &Value, limit: usize) -> bool {
    let mut counter = ByteCounter { written: 0, limit };
    serde_json::to_writer(&mut counter, value).is_err() || counter.written > limit
}

/// Counts bytes and gives up as soon as the limit is passed.
struct ByteCounter {
    written: usize,
    limit: usize,
}

impl Write for ByteCounter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.written = self.written.saturating_add(buf.len());
        if self.written > self.limit {
            return Err(std::io::Error::other("limit exceeded"));
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::fetch::OfflineFetcher;

    const PREFIX: &str = "https://delk73.github.io/synesthetic-schemas/schema/0.7.3/";

    fn write(dir: &Path, name: &str, value: Value) {
        std::fs::write(dir.join(name), serde_json::to_vec(&value).unwrap()).unwrap();
    }

    fn engine() -> (tempfile::TempDir, ValidationEngine) {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "synesthetic-asset.schema.json",
            json!({
                "$schema": "https://json-schema.org/draft/2020-12/schema",
                "type": "object",
                "required": ["name"],
                "properties": {
                    "name": {"type": "string"},
                    "shader": {"$ref": "shader.schema.json"},
                    "a/b": {"type": "integer"}
                }
            }),
        );
        write(
            dir.path(),
            "shader.schema.json",
            json!({
                "$id": format!("{PREFIX}shader.schema.json"),
                "type": "object",
                "required": ["code"],
                "properties": {"code": {"type": "string"}}
            }),
        );
        write(dir.path(), "bad.schema.json", json!({"type": 12}));
        let resolver =
            SchemaResolver::with_fetcher(ResolverConfig::new(dir.path()), Arc::new(OfflineFetcher));
        (dir, ValidationEngine::with_resolver(resolver))
    }

    fn asset(extra: Value) -> Value {
        let mut base = json!({"$schema": format!("{PREFIX}synesthetic-asset.schema.json")});
        if let (Value::Object(map), Value::Object(more)) = (&mut base, extra) {
            map.extend(more);
        }
        base
    }

    fn errors(outcome: &Outcome) -> Vec<(String, String)> {
        outcome
            .errors
            .clone()
            .unwrap_or_default()
            .into_iter()
            .map(|entry| (entry.path, entry.msg))
            .collect()
    }

    #[test]
    fn valid_asset_has_empty_errors() {
        let (_dir, engine) = engine();
        let outcome = engine.validate_asset(&asset(json!({"name": "demo"})));
        assert!(outcome.ok, "{outcome:?}");
        assert_eq!(outcome.errors, Some(Vec::new()));
        assert!(outcome.reason.is_none());
    }

    #[test]
    fn violations_are_sorted_and_pointer_escaped() {
        let (_dir, engine) = engine();
        let outcome = engine.validate_asset(&asset(json!({"name": 5, "a/b": "x"})));
        assert_eq!(outcome.reason, Some(Reason::ValidationFailed));
        let paths: Vec<String> = errors(&outcome).into_iter().map(|(path, _)| path).collect();
        assert_eq!(paths, vec!["/a~1b".to_string(), "/name".to_string()]);
    }

    #[test]
    fn root_level_violation_uses_slash() {
        let (_dir, engine) = engine();
        let outcome = engine.validate_asset(&asset(json!({})));
        assert_eq!(errors(&outcome)[0].0, "/");
    }

    #[test]
    fn cross_schema_ref_resolves_locally() {
        let (_dir, engine) = engine();
        let outcome = engine.validate_asset(&asset(json!({"name": "x", "shader": {}})));
        assert!(!outcome.ok);
        assert_eq!(errors(&outcome)[0].0, "/shader");

        let fine = engine.validate_asset(&asset(json!({"name": "x", "shader": {"code": "void"}})));
        assert!(fine.ok, "{fine:?}");
    }

    #[test]
    fn missing_or_blank_schema_marker() {
        let (_dir, engine) = engine();
        for doc in [json!({"name": "x"}), json!({"$schema": "  "}), json!({"$schema": 7})] {
            let outcome = engine.validate_asset(&doc);
            assert_eq!(errors(&outcome), vec![("/$schema".into(), "missing_schema".into())]);
        }
    }

    #[test]
    fn non_object_asset_is_rejected() {
        let (_dir, engine) = engine();
        let outcome = engine.validate_asset(&json!([1, 2]));
        assert_eq!(errors(&outcome), vec![("/".into(), "asset_must_be_object".into())]);
    }

    #[test]
    fn legacy_keys_are_reported_together() {
        let (_dir, engine) = engine();
        let outcome = engine.validate_asset(&asset(json!({"schema": "x", "$schemaRef": "y"})));
        assert_eq!(
            errors(&outcome),
            vec![("/".into(), "legacy_schema_keys: schema, $schemaRef".into())]
        );
    }

    #[test]
    fn marker_problems_map_to_schema_pointer() {
        let (_dir, engine) = engine();
        let cases = [
            ("not a url", "invalid_schema_marker"),
            ("https://example.com/asset.schema.json", "schema_not_canonical"),
            (
                "https://delk73.github.io/synesthetic-schemas/schema/0.7.3/../asset.schema.json",
                "schema_outside_configured_root",
            ),
        ];
        for (marker, msg) in cases {
            let outcome = engine.validate_asset(&json!({"$schema": marker}));
            assert_eq!(errors(&outcome), vec![("/$schema".into(), msg.into())], "{marker}");
        }
    }

    #[test]
    fn unresolvable_and_uncompilable_schemas() {
        let (_dir, engine) = engine();
        let missing = engine.validate_asset(&json!({"$schema": format!("{PREFIX}missing.schema.json")}));
        assert_eq!(missing.reason, Some(Reason::SchemaResolutionFailed));
        assert!(missing.detail.is_some());

        let bad = engine.validate_asset(&json!({"$schema": format!("{PREFIX}bad.schema.json")}));
        assert_eq!(bad.reason, Some(Reason::SchemaResolutionFailed));
    }

    #[test]
    fn oversized_asset_short_circuits() {
        let (_dir, engine) = engine();
        let blob = "x".repeat(1024 * 1024);
        let outcome = engine.validate_asset(&json!({"blob": blob}));
        assert_eq!(errors(&outcome), vec![("".into(), "payload_too_large".into())]);
    }

    #[test]
    fn batch_isolates_items() {
        let (_dir, engine) = engine();
        let outcome = engine.validate_many(&[
            asset(json!({"name": "ok"})),
            json!({"name": "no marker"}),
            asset(json!({"name": "also ok"})),
        ]);
        assert!(!outcome.ok);
        let results = outcome.field("results").unwrap().as_array().unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0], json!({"ok": true}));
        assert_eq!(results[1]["reason"], "validation_failed");
        assert_eq!(results[2], json!({"ok": true}));
    }

    #[test]
    fn batch_over_limit_validates_nothing() {
        let (_dir, engine) = engine();
        let engine = engine.with_max_batch(2);
        let outcome = engine.validate_many(&[json!({}), json!({}), json!({})]);
        assert_eq!(outcome.reason, Some(Reason::Unsupported));
        assert_eq!(outcome.detail.as_deref(), Some("batch_too_large"));
        assert_eq!(outcome.field("limit"), Some(&json!(2)));
        assert!(outcome.field("results").is_none());
    }

    #[test]
    fn size_check_counts_compact_encoding() {
        assert!(!exceeds_size(&json!({"a": 1}), 7));
        assert!(exceeds_size(&json!({"a": 1}), 6));
    }
}
