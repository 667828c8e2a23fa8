use schemagate_frame::Outcome;
use schemagate_schema::{parse_marker, ValidationEngine};
use serde_json::json;
use tracing::debug;

use crate::catalog::Catalog;

/// Transports this build can serve.
pub const TRANSPORTS: [&str; 3] = ["stdio", "socket", "tcp"];

/// Check that every example names a schema available under the schemas root.
///
/// Only local files count; nothing is fetched. Examples without a usable
/// `$schema` marker are reported as missing too.
pub fn governance_audit(catalog: &Catalog, engine: &ValidationEngine) -> Outcome {
    let config = engine.config();
    let examples = catalog.scan_examples();

    let mut missing: Vec<String> = examples
        .iter()
        .filter(|doc| {
            let available = doc
                .marker
                .as_deref()
                .and_then(|marker| parse_marker(marker, config).ok())
                .and_then(|reference| engine.resolver().local_path(&reference).ok().flatten())
                .is_some();
            !available
        })
        .map(|doc| doc.relative.clone())
        .collect();
    missing.sort();

    let status = if missing.is_empty() { "ok" } else { "degraded" };
    debug!(
        examples = examples.len(),
        missing = missing.len(),
        status,
        "governance audit"
    );

    Outcome::success()
        .with("schemasBase", config.base_url.clone())
        .with("schemaVersion", config.version.clone())
        .with("examplesChecked", examples.len())
        .with("missingSchema", missing)
        .with("transports", json!(TRANSPORTS))
        .with("status", status)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use schemagate_schema::{OfflineFetcher, ResolverConfig, SchemaResolver};

    use super::*;

    const PREFIX: &str = "https://delk73.github.io/synesthetic-schemas/schema/0.7.3/";

    #[test]
    fn reports_examples_without_local_schema() {
        let schemas = tempfile::tempdir().unwrap();
        let examples = tempfile::tempdir().unwrap();
        std::fs::write(schemas.path().join("shader.schema.json"), "{}").unwrap();
        std::fs::write(
            examples.path().join("good.json"),
            json!({"$schema": format!("{PREFIX}shader.schema.json")}).to_string(),
        )
        .unwrap();
        std::fs::write(
            examples.path().join("orphan.json"),
            json!({"$schema": format!("{PREFIX}tone.schema.json")}).to_string(),
        )
        .unwrap();
        std::fs::write(examples.path().join("plain.json"), "{}").unwrap();

        let catalog = Catalog::new(schemas.path(), examples.path(), 1 << 20);
        let engine = ValidationEngine::with_resolver(SchemaResolver::with_fetcher(
            ResolverConfig::new(schemas.path()),
            Arc::new(OfflineFetcher),
        ));

        let outcome = governance_audit(&catalog, &engine);
        assert!(outcome.ok);
        assert_eq!(outcome.field("examplesChecked"), Some(&json!(3)));
        assert_eq!(
            outcome.field("missingSchema"),
            Some(&json!(["orphan.json", "plain.json"]))
        );
        assert_eq!(outcome.field("status"), Some(&json!("degraded")));
        assert_eq!(outcome.field("schemaVersion"), Some(&json!("0.7.3")));
        assert_eq!(
            outcome.field("transports"),
            Some(&json!(["stdio", "socket", "tcp"]))
        );
    }

    #[test]
    fn empty_examples_are_ok() {
        let schemas = tempfile::tempdir().unwrap();
        let catalog = Catalog::new(schemas.path(), schemas.path().join("none"), 1 << 20);
        let engine = ValidationEngine::with_resolver(SchemaResolver::with_fetcher(
            ResolverConfig::new(schemas.path()),
            Arc::new(OfflineFetcher),
        ));
        let outcome = governance_audit(&catalog, &engine);
        assert_eq!(outcome.field("status"), Some(&json!("ok")));
        assert_eq!(outcome.field("missingSchema"), Some(&json!([])));
    }
}
