//! Read-only views over the schemas and examples directories.

use std::io::Read;
use std::path::{Path, PathBuf};

use schemagate_frame::{Outcome, Reason};
use schemagate_schema::canonical::canonical_name;
use schemagate_schema::guard;
use schemagate_schema::ValidationEngine;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use walkdir::WalkDir;

const SCHEMA_SUFFIXES: [&str; 2] = [".schema.json", ".json"];

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct SchemaEntry {
    pub name: String,
    pub version: Option<String>,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct ExampleEntry {
    pub component: String,
    pub path: String,
}

/// Schemas and examples available to clients.
#[derive(Debug, Clone)]
pub struct Catalog {
    schemas_dir: PathBuf,
    examples_dir: PathBuf,
    max_file_size: usize,
}

impl Catalog {
    pub fn new(
        schemas_dir: impl Into<PathBuf>,
        examples_dir: impl Into<PathBuf>,
        max_file_size: usize,
    ) -> Self {
        Self {
            schemas_dir: schemas_dir.into(),
            examples_dir: examples_dir.into(),
            max_file_size,
        }
    }

    pub fn schemas_dir(&self) -> &Path {
        &self.schemas_dir
    }

    pub fn examples_dir(&self) -> &Path {
        &self.examples_dir
    }

    /// Every parseable schema under the schemas root, sorted.
    pub fn list_schemas(&self) -> Vec<SchemaEntry> {
        let mut entries: Vec<SchemaEntry> = json_files(&self.schemas_dir)
            .into_iter()
            .filter_map(|(relative, path)| {
                let schema = read_json(&path, self.max_file_size).ok()?;
                Some(SchemaEntry {
                    name: strip_schema_suffix(file_name(&relative)).to_string(),
                    version: schema_version(&schema),
                    path: relative,
                })
            })
            .collect();
        entries.sort();
        entries
    }

    /// Look a schema up by name, optionally pinning its version.
    pub fn get_schema(&self, name: &str, version: Option<&str>) -> Outcome {
        let mut candidates = Vec::with_capacity(SCHEMA_SUFFIXES.len());
        for suffix in SCHEMA_SUFFIXES {
            match guard::resolve(&self.schemas_dir, &format!("{name}{suffix}")) {
                Ok(path) => candidates.push(path),
                Err(_) => return Outcome::invalid("/name", "invalid_path"),
            }
        }

        let found = match candidates.into_iter().find(|path| path.is_file()) {
            Some(path) => match read_json(&path, self.max_file_size) {
                Ok(schema) => Some((path, schema)),
                Err(failure) => return failure.into_outcome(),
            },
            None => self.find_by_title(name),
        };
        let Some((path, schema)) = found else {
            return Outcome::not_found(format!("schema not found: {name}"));
        };

        let schema_version = schema_version(&schema);
        if let (Some(wanted), Some(actual)) = (version, schema_version.as_deref()) {
            if wanted != actual {
                return Outcome::not_found("version_mismatch")
                    .with("requested", wanted)
                    .with("available", actual);
            }
        }

        Outcome::success()
            .with("name", name)
            .with("version", schema_version)
            .with("path", self.relative_schema_path(&path))
            .with("schema", schema)
    }

    fn find_by_title(&self, title: &str) -> Option<(PathBuf, Value)> {
        json_files(&self.schemas_dir).into_iter().find_map(|(_, path)| {
            let schema = read_json(&path, self.max_file_size).ok()?;
            (schema.get("title").and_then(Value::as_str) == Some(title)).then_some((path, schema))
        })
    }

    fn relative_schema_path(&self, path: &Path) -> String {
        guard::relative_to(&self.schemas_dir, path)
            .unwrap_or_else(|| path.display().to_string())
    }

    /// Examples under the examples root, filtered by component.
    ///
    /// `None`, `"all"` and `"*"` select everything; any other filter matches
    /// the component name or the relative path, case-insensitively.
    pub fn list_examples(&self, component: Option<&str>) -> Vec<ExampleEntry> {
        let filter = component
            .map(str::trim)
            .filter(|filter| !filter.is_empty() && *filter != "all" && *filter != "*")
            .map(str::to_lowercase);

        let mut entries: Vec<ExampleEntry> = self
            .scan_examples()
            .into_iter()
            .map(|doc| ExampleEntry {
                component: doc.component,
                path: doc.relative,
            })
            .filter(|entry| match &filter {
                None => true,
                Some(filter) => {
                    entry.component.to_lowercase() == *filter
                        || entry.path.to_lowercase().contains(filter.as_str())
                }
            })
            .collect();
        entries.sort();
        entries
    }

    /// Load one example and report whether it validates.
    pub fn get_example(&self, path: &str, engine: &ValidationEngine) -> Outcome {
        let Ok(resolved) = guard::resolve(&self.examples_dir, path) else {
            return Outcome::invalid("/path", "invalid_path");
        };
        if !resolved.is_file() {
            return Outcome::not_found(format!("example not found: {path}"));
        }
        let example = match read_json(&resolved, self.max_file_size) {
            Ok(example) => example,
            Err(failure) => return failure.into_outcome(),
        };

        let component = example_component(&example, file_name(path));
        let validated = example.get("$schema").is_some() && engine.validate_asset(&example).ok;
        debug!(path, component = %component, validated, "example loaded");

        Outcome::success()
            .with("path", path)
            .with("schema", component)
            .with("validated", validated)
            .with("example", example)
    }

    /// Every example with its `$schema` marker, if it has one.
    pub fn scan_examples(&self) -> Vec<ExampleDoc> {
        json_files(&self.examples_dir)
            .into_iter()
            .map(|(relative, path)| {
                let doc = read_json(&path, self.max_file_size).ok();
                let marker = doc
                    .as_ref()
                    .and_then(|doc| doc.get("$schema"))
                    .and_then(Value::as_str)
                    .map(str::to_string);
                let component = match &doc {
                    Some(doc) => example_component(doc, file_name(&relative)),
                    None => stem_component(file_name(&relative)),
                };
                ExampleDoc {
                    relative,
                    component,
                    marker,
                }
            })
            .collect()
    }
}

/// One file found under the examples root.
#[derive(Debug, Clone)]
pub struct ExampleDoc {
    pub relative: String,
    pub component: String,
    pub marker: Option<String>,
}

#[derive(Debug)]
pub(crate) enum ReadFailure {
    Io(String),
    Parse(String),
}

impl ReadFailure {
    pub(crate) fn into_outcome(self) -> Outcome {
        match self {
            ReadFailure::Io(detail) => Outcome::failure(Reason::IoError).with_detail(detail),
            ReadFailure::Parse(detail) => Outcome::failure(Reason::ParseError).with_detail(detail),
        }
    }
}

pub(crate) fn read_json(path: &Path, max_size: usize) -> Result<Value, ReadFailure> {
    let file = std::fs::File::open(path).map_err(|err| ReadFailure::Io(err.to_string()))?;
    let mut bytes = Vec::new();
    file.take(max_size as u64 + 1)
        .read_to_end(&mut bytes)
        .map_err(|err| ReadFailure::Io(err.to_string()))?;
    if bytes.len() > max_size {
        return Err(ReadFailure::Io(format!("file exceeds {max_size} bytes")));
    }
    serde_json::from_slice(&bytes).map_err(|err| {
        ReadFailure::Parse(format!(
            "json_decode_error: line {} column {}",
            err.line(),
            err.column()
        ))
    })
}

/// Declared version of a schema, from its fields or its `$id`.
pub fn schema_version(schema: &Value) -> Option<String> {
    for key in ["version", "$version", "x-version"] {
        match schema.get(key) {
            Some(Value::String(version)) if !version.is_empty() => return Some(version.clone()),
            Some(Value::Number(version)) => return Some(version.to_string()),
            _ => {}
        }
    }

    let id = schema.get("$id")?.as_str()?;
    let id = id.split(['#', '?']).next().unwrap_or(id);
    id.split('/')
        .rev()
        .skip(1)
        .find(|segment| looks_like_version(segment))
        .map(|segment| segment.trim_start_matches('v').to_string())
}

fn looks_like_version(segment: &str) -> bool {
    let digits = segment.strip_prefix('v').unwrap_or(segment);
    digits.starts_with(|c: char| c.is_ascii_digit())
        && digits.contains('.')
        && digits.chars().all(|c| c.is_ascii_digit() || c == '.')
}

fn example_component(example: &Value, filename: &str) -> String {
    match example.get("$schema").and_then(Value::as_str) {
        Some(marker) if !marker.trim().is_empty() => {
            let bare = marker.split(['#', '?']).next().unwrap_or(marker);
            let last = bare.trim_end_matches('/').rsplit('/').next().unwrap_or(bare);
            canonical_name(last)
        }
        _ => stem_component(filename),
    }
}

fn stem_component(filename: &str) -> String {
    filename.split('.').next().unwrap_or(filename).to_string()
}

fn strip_schema_suffix(filename: &str) -> &str {
    SCHEMA_SUFFIXES
        .iter()
        .find_map(|suffix| filename.strip_suffix(suffix))
        .unwrap_or(filename)
}

fn file_name(relative: &str) -> &str {
    relative.rsplit('/').next().unwrap_or(relative)
}

/// `(relative path, absolute path)` of regular `*.json` files under `root`.
fn json_files(root: &Path) -> Vec<(String, PathBuf)> {
    let root = guard::absolute_root(root);
    if !root.is_dir() {
        return Vec::new();
    }
    let mut files: Vec<(String, PathBuf)> = WalkDir::new(&root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
        })
        .filter_map(|entry| {
            let path = entry.into_path();
            guard::relative_to(&root, &path).map(|relative| (relative, path))
        })
        .collect();
    files.sort();
    files
}
