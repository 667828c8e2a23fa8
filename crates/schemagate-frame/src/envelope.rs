use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::outcome::Outcome;

/// The only protocol version this service speaks.
pub const PROTOCOL_VERSION: &str = "2.0";

/// Input was not valid JSON (or not UTF-8).
pub const PARSE_ERROR: i64 = -32700;
/// Valid JSON that is not a request object.
pub const INVALID_REQUEST: i64 = -32600;
/// An unexpected fault while dispatching.
pub const INTERNAL_ERROR: i64 = -32603;

/// A decoded request that passed every envelope check.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub id: Value,
    pub method: String,
    pub params: Map<String, Value>,
}

/// Why a line did not become a [`Request`].
#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    /// The line exceeded the frame size limit; nothing was parsed.
    Oversized,
    /// Not UTF-8 or not JSON.
    Malformed(String),
    /// JSON, but not an object.
    NotARequest,
    /// A request object whose envelope fields are invalid.
    Invalid { id: Value, outcome: Outcome },
}

impl Rejection {
    /// The response frame sent back for this rejection.
    pub fn into_response(self) -> Response {
        match self {
            Rejection::Oversized => Response::result(Value::Null, Outcome::payload_too_large()),
            Rejection::Malformed(_) => Response::error(Value::Null, PARSE_ERROR, "parse_error"),
            Rejection::NotARequest => {
                Response::error(Value::Null, INVALID_REQUEST, "invalid_request")
            }
            Rejection::Invalid { id, outcome } => Response::result(id, outcome),
        }
    }
}

/// Decode one line into a request.
///
/// The length check runs before the bytes are looked at, so oversized
/// lines never reach the JSON parser. `jsonrpc` is accepted in place of
/// `protocolVersion`; an absent version is tolerated, a different one is not.
pub fn decode_request(line: &[u8], max_len: usize) -> std::result::Result<Request, Rejection> {
    if line.len() > max_len {
        return Err(Rejection::Oversized);
    }

    let text =
        std::str::from_utf8(line).map_err(|err| Rejection::Malformed(format!("decode_error: {err}")))?;
    let value: Value =
        serde_json::from_str(text).map_err(|err| Rejection::Malformed(err.to_string()))?;
    let Value::Object(mut map) = value else {
        return Err(Rejection::NotARequest);
    };

    let id = map.remove("id").unwrap_or(Value::Null);
    let invalid = |path: &str, msg: &str| Rejection::Invalid {
        id: id.clone(),
        outcome: Outcome::invalid(path, msg),
    };

    let version = map.get("protocolVersion").or_else(|| map.get("jsonrpc"));
    match version {
        None | Some(Value::Null) => {}
        Some(Value::String(v)) if v == PROTOCOL_VERSION => {}
        Some(_) => return Err(invalid("/protocolVersion", "unsupported_protocol_version")),
    }

    let method = match map.remove("method") {
        Some(Value::String(method)) if !method.is_empty() => method,
        _ => return Err(invalid("/method", "method_required")),
    };

    let params = match map.remove("params") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(params)) => params,
        Some(_) => return Err(invalid("/params", "params_must_be_object")),
    };

    Ok(Request { id, method, params })
}

/// Protocol-level error object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolError {
    pub code: i64,
    pub message: String,
}

/// Exactly one of `result` / `error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseBody {
    Result(Outcome),
    Error(ProtocolError),
}

/// A response frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    pub id: Value,
    #[serde(flatten)]
    pub body: ResponseBody,
}

impl Response {
    pub fn result(id: Value, outcome: Outcome) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION.to_string(),
            id,
            body: ResponseBody::Result(outcome),
        }
    }

    pub fn error(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION.to_string(),
            id,
            body: ResponseBody::Error(ProtocolError {
                code,
                message: message.into(),
            }),
        }
    }

    /// The carried outcome, if this is a result frame.
    pub fn outcome(&self) -> Option<&Outcome> {
        match &self.body {
            ResponseBody::Result(outcome) => Some(outcome),
            ResponseBody::Error(_) => None,
        }
    }
}
