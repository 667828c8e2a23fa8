use std::panic::{catch_unwind, AssertUnwindSafe};

use schemagate_diff::diff;
use schemagate_frame::{
    decode_request, Line, Outcome, Rejection, Request, Response, INTERNAL_ERROR,
};
use schemagate_schema::ValidationEngine;
use serde_json::{Map, Value};
use tracing::{debug, error, warn};

use crate::audit::governance_audit;
use crate::backend::BackendClient;
use crate::catalog::Catalog;
use crate::config::ServiceConfig;
use crate::error::{Result, ServiceError};

/// Operations served by [`Dispatcher::call`].
pub const METHODS: [&str; 9] = [
    "list_schemas",
    "get_schema",
    "list_examples",
    "get_example",
    "validate_asset",
    "validate_many",
    "diff_assets",
    "governance_audit",
    "populate_backend",
];

/// Deprecated name for `validate_asset`.
pub const DEPRECATED_VALIDATE: &str = "validate";

/// Routes decoded requests to operations.
///
/// Holds no per-request state, so one instance is shared by every
/// connection and worker.
#[derive(Debug)]
pub struct Dispatcher {
    catalog: Catalog,
    engine: ValidationEngine,
    backend: Option<BackendClient>,
    max_frame: usize,
}

impl Dispatcher {
    /// Build a dispatcher with HTTP schema fetching and the configured backend.
    pub fn new(config: &ServiceConfig) -> Result<Self> {
        config.validate()?;
        let engine = ValidationEngine::new(config.resolver.clone())?.with_max_batch(config.max_batch);
        let backend = config.backend.as_ref().map(BackendClient::new).transpose()?;
        Ok(Self::from_parts(config, engine, backend))
    }

    /// Assemble a dispatcher around an existing engine.
    pub fn from_parts(
        config: &ServiceConfig,
        engine: ValidationEngine,
        backend: Option<BackendClient>,
    ) -> Self {
        Self {
            catalog: Catalog::new(
                config.resolver.schemas_dir.clone(),
                config.examples_dir.clone(),
                config.resolver.max_schema_file_size,
            ),
            engine,
            backend,
            max_frame: config.resolver.max_payload_size,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn engine(&self) -> &ValidationEngine {
        &self.engine
    }

    /// Turn one framed line into exactly one response.
    pub fn handle(&self, line: Line) -> Response {
        match line {
            Line::Oversized => {
                debug!(limit = self.max_frame, "oversized frame");
                Rejection::Oversized.into_response()
            }
            Line::Frame(bytes) => self.handle_bytes(&bytes),
        }
    }

    /// Decode and dispatch one line of bytes.
    pub fn handle_bytes(&self, line: &[u8]) -> Response {
        match decode_request(line, self.max_frame) {
            Ok(request) => self.dispatch(request),
            Err(rejection) => {
                if let Rejection::Malformed(detail) = &rejection {
                    debug!(%detail, "rejecting malformed frame");
                }
                rejection.into_response()
            }
        }
    }

    /// Run a decoded request, containing panics and internal failures.
    pub fn dispatch(&self, request: Request) -> Response {
        let Request { id, method, params } = request;
        let outcome = guarded(&method, || self.call(&method, &params));
        match outcome {
            Some(outcome) => Response::result(id, outcome),
            None => Response::error(id, INTERNAL_ERROR, "internal_error"),
        }
    }

    /// Execute a named operation.
    pub fn call(&self, method: &str, params: &Map<String, Value>) -> Result<Outcome> {
        let outcome = match method {
            "list_schemas" => Outcome::success().with(
                "schemas",
                to_value(method, &self.catalog.list_schemas())?,
            ),
            "get_schema" => {
                let name = match required_str(params, "name") {
                    Ok(name) => name,
                    Err(outcome) => return Ok(outcome),
                };
                let version = match optional_str(params, "version") {
                    Ok(version) => version,
                    Err(outcome) => return Ok(outcome),
                };
                self.catalog.get_schema(name, version)
            }
            "list_examples" => {
                let component = match optional_str(params, "component") {
                    Ok(component) => component,
                    Err(outcome) => return Ok(outcome),
                };
                Outcome::success().with(
                    "examples",
                    to_value(method, &self.catalog.list_examples(component))?,
                )
            }
            "get_example" => match required_str(params, "path") {
                Ok(path) => self.catalog.get_example(path, &self.engine),
                Err(outcome) => outcome,
            },
            "validate_asset" | DEPRECATED_VALIDATE => {
                if method == DEPRECATED_VALIDATE {
                    warn!(method, replacement = "validate_asset", "deprecated_alias");
                }
                self.engine
                    .validate_asset(params.get("asset").unwrap_or(&Value::Null))
            }
            "validate_many" => match params.get("assets") {
                Some(Value::Array(assets)) => self.engine.validate_many(assets),
                _ => Outcome::invalid("/assets", "must_be_array"),
            },
            "diff_assets" => {
                let (Some(base), Some(new)) = (params.get("base"), params.get("new")) else {
                    let path = if params.contains_key("base") { "/new" } else { "/base" };
                    return Ok(Outcome::invalid(path, "required"));
                };
                Outcome::success().with("patch", to_value(method, &diff(base, new))?)
            }
            "governance_audit" => governance_audit(&self.catalog, &self.engine),
            "populate_backend" => {
                let Some(backend) = &self.backend else {
                    return Ok(Outcome::unsupported("backend_disabled"));
                };
                let validate_first = match params.get("validateFirst") {
                    None | Some(Value::Null) => true,
                    Some(Value::Bool(flag)) => *flag,
                    Some(_) => return Ok(Outcome::invalid("/validateFirst", "must_be_boolean")),
                };
                backend.populate(
                    params.get("asset").unwrap_or(&Value::Null),
                    validate_first,
                    &self.engine,
                )
            }
            _ => Outcome::unsupported("tool not implemented"),
        };
        Ok(outcome)
    }
}

/// Run an operation, converting panics and `Err` into `None` after logging them.
pub(crate) fn guarded<F>(method: &str, operation: F) -> Option<Outcome>
where
    F: FnOnce() -> Result<Outcome>,
{
    match catch_unwind(AssertUnwindSafe(operation)) {
        Ok(Ok(outcome)) => Some(outcome),
        Ok(Err(err)) => {
            error!(method, error = %err, "operation failed");
            None
        }
        Err(panic) => {
            let detail = panic
                .downcast_ref::<&str>()
                .map(|text| (*text).to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".to_string());
            error!(method, %detail, "operation panicked");
            None
        }
    }
}

fn to_value<T: serde::Serialize>(method: &str, value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(|err| ServiceError::Internal {
        method: method.to_string(),
        detail: err.to_string(),
    })
}

fn required_str<'a>(params: &'a Map<String, Value>, key: &str) -> std::result::Result<&'a str, Outcome> {
    match params.get(key) {
        Some(Value::String(value)) => Ok(value),
        Some(_) => Err(Outcome::invalid(format!("/{key}"), "must_be_string")),
        None => Err(Outcome::invalid(format!("/{key}"), "required")),
    }
}

fn optional_str<'a>(
    params: &'a Map<String, Value>,
    key: &str,
) -> std::result::Result<Option<&'a str>, Outcome> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => Ok(Some(value)),
        Some(_) => Err(Outcome::invalid(format!("/{key}"), "must_be_string")),
    }
}
