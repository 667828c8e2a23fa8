use url::Url;

use crate::config::ResolverConfig;
use crate::error::{Result, SchemaError};

/// Deprecated schema names and their canonical replacements.
pub const ALIASES: &[(&str, &str)] = &[("nested-synesthetic-asset", "synesthetic-asset")];

const SUFFIXES: [&str; 2] = [".schema.json", ".json"];

/// Canonical identity of the schema an asset asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaRef {
    /// Name after suffix stripping and aliasing, e.g. `synesthetic-asset`.
    pub canonical_name: String,
    /// `{canonical_name}.schema.json`, relative to the schemas root.
    pub canonical_filename: String,
    /// The marker exactly as the asset supplied it.
    pub requested_url: String,
    /// Canonical prefix + canonical filename.
    pub canonical_url: String,
}

/// Interpret a `$schema` marker.
///
/// The prefix check runs on the raw marker rather than on a parsed URL so
/// `..` segments survive to the path guard instead of being folded away.
pub fn parse_marker(marker: &str, config: &ResolverConfig) -> Result<SchemaRef> {
    let marker = marker.trim();
    if marker.is_empty() {
        return Err(SchemaError::InvalidMarker("empty".to_string()));
    }

    let parsed = Url::parse(marker).map_err(|err| SchemaError::InvalidMarker(err.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(SchemaError::InvalidMarker(format!(
            "unsupported scheme {}",
            parsed.scheme()
        )));
    }

    let prefix = config.canonical_prefix();
    let Some(rest) = marker.strip_prefix(prefix.as_str()) else {
        return Err(SchemaError::NotCanonical(marker.to_string()));
    };
    let relative = rest.split(['?', '#']).next().unwrap_or_default();
    if relative.is_empty() {
        return Err(SchemaError::InvalidMarker(marker.to_string()));
    }

    let name = canonical_name(relative);
    let canonical_filename = format!("{name}.schema.json");
    Ok(SchemaRef {
        canonical_url: config.canonical_url(&canonical_filename),
        canonical_name: name,
        canonical_filename,
        requested_url: marker.to_string(),
    })
}

/// Strip a recognized suffix and apply the alias table.
pub fn canonical_name(filename: &str) -> String {
    let stem = SUFFIXES
        .iter()
        .find_map(|suffix| filename.strip_suffix(suffix))
        .unwrap_or(filename);
    ALIASES
        .iter()
        .find(|(legacy, _)| *legacy == stem)
        .map_or(stem, |(_, canonical)| *canonical)
        .to_string()
}
