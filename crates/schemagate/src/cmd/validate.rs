use std::io;
use std::path::Path;

use schemagate_frame::{ErrorEntry, Outcome, Reason};
use schemagate_schema::{parse_marker, ResolverConfig, ValidationEngine};
use serde_json::Value;

use crate::cmd::{ServiceArgs, ValidateArgs};
use crate::exit::{CliError, CliResult, FAILURE, INPUT_ERROR, INTERNAL, SUCCESS};
use crate::output::print_json;

pub fn run(args: ValidateArgs, service: &ServiceArgs) -> CliResult<i32> {
    let asset = match load_asset(&args.file) {
        Ok(asset) => asset,
        Err(outcome) => {
            print_json(&outcome);
            return Ok(INPUT_ERROR);
        }
    };

    let config = service.resolver_config();
    let schema = infer_schema_name(&args.file, &asset, &config);
    let engine = ValidationEngine::new(config)
        .map_err(|err| CliError::new(INTERNAL, format!("validator setup failed: {err}")))?;

    let mut outcome = engine.validate_asset(&asset);
    if outcome.field("schema").is_none() {
        outcome = outcome.with("schema", schema);
    }
    print_json(&outcome);
    Ok(if outcome.is_ok() { SUCCESS } else { FAILURE })
}

fn load_asset(path: &Path) -> Result<Value, Outcome> {
    let contents = std::fs::read_to_string(path).map_err(|err| {
        let msg = if err.kind() == io::ErrorKind::NotFound {
            format!("file_not_found: {}", path.display())
        } else {
            format!("read_failed: {err}")
        };
        Outcome::failure(Reason::IoError).with_errors(vec![ErrorEntry::new("/", msg)])
    })?;

    serde_json::from_str(&contents).map_err(|err| {
        Outcome::failure(Reason::ParseError).with_errors(vec![ErrorEntry::new(
            "/",
            format!("json_decode_error: line {} column {}", err.line(), err.column()),
        )])
    })
}

/// Canonical name from the asset's `$schema`, else the file stem up to the first dot.
fn infer_schema_name(path: &Path, asset: &Value, config: &ResolverConfig) -> String {
    asset
        .get("$schema")
        .and_then(Value::as_str)
        .and_then(|marker| parse_marker(marker, config).ok())
        .map(|reference| reference.canonical_name)
        .unwrap_or_else(|| {
            path.file_name()
                .and_then(|name| name.to_str())
                .and_then(|name| name.split('.').next())
                .unwrap_or_default()
                .to_string()
        })
}
