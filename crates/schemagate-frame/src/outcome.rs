use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Why an operation did not succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reason {
    ValidationFailed,
    NotFound,
    Unsupported,
    SchemaResolutionFailed,
    IoError,
    ParseError,
    InternalError,
    BackendError,
}

impl Reason {
    pub fn as_str(self) -> &'static str {
        match self {
            Reason::ValidationFailed => "validation_failed",
            Reason::NotFound => "not_found",
            Reason::Unsupported => "unsupported",
            Reason::SchemaResolutionFailed => "schema_resolution_failed",
            Reason::IoError => "io_error",
            Reason::ParseError => "parse_error",
            Reason::InternalError => "internal_error",
            Reason::BackendError => "backend_error",
        }
    }
}

impl std::fmt::Display for Reason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One violation, addressed by a JSON Pointer into the offending document.
///
/// Field order matters: the derived `Ord` sorts by `(path, msg)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ErrorEntry {
    pub path: String,
    pub msg: String,
}

impl ErrorEntry {
    pub fn new(path: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            msg: msg.into(),
        }
    }
}

/// Result payload of every operation.
///
/// `ok == false` always carries a `reason`. Operation-specific fields
/// (`schemas`, `patch`, `results`, ...) are flattened next to the common ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<Reason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<ErrorEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Outcome {
    /// A successful outcome with no extra fields.
    pub fn success() -> Self {
        Self {
            ok: true,
            reason: None,
            errors: None,
            detail: None,
            fields: Map::new(),
        }
    }

    /// A failed outcome tagged with `reason`.
    pub fn failure(reason: Reason) -> Self {
        Self {
            ok: false,
            reason: Some(reason),
            ..Self::success()
        }
    }

    /// `validation_failed` carrying the given entries, sorted by `(path, msg)`.
    pub fn validation_failed(mut errors: Vec<ErrorEntry>) -> Self {
        errors.sort();
        Self::failure(Reason::ValidationFailed).with_errors(errors)
    }

    /// `validation_failed` for a single entry.
    pub fn invalid(path: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::validation_failed(vec![ErrorEntry::new(path, msg)])
    }

    /// The fixed result for input larger than the frame/payload limit.
    pub fn payload_too_large() -> Self {
        Self::invalid("", "payload_too_large")
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::failure(Reason::NotFound).with_detail(detail)
    }

    pub fn unsupported(detail: impl Into<String>) -> Self {
        Self::failure(Reason::Unsupported).with_detail(detail)
    }

    pub fn with_errors(mut self, errors: Vec<ErrorEntry>) -> Self {
        self.errors = Some(errors);
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Attach an operation-specific field.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    pub fn is_ok(&self) -> bool {
        self.ok
    }

    /// Look up an operation-specific field.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }
}
