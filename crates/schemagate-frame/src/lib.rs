//! Newline-delimited JSON-RPC framing for schemagate.
//!
//! Every message is one JSON document terminated by `\n`:
//! - Requests carry `protocolVersion`, `id`, `method` and object `params`
//! - Responses echo the `id` and carry exactly one of `result` / `error`
//!
//! Oversized lines are reported before any JSON parsing happens. Domain
//! outcomes always travel in `result` as an [`Outcome`]; the protocol-level
//! `error` slot is reserved for undecodable input and internal faults.

pub mod codec;
pub mod envelope;
pub mod error;
pub mod outcome;
pub mod reader;
pub mod writer;

pub use codec::{encode_response, FrameConfig, Line, LineDecoder, DEFAULT_MAX_FRAME};
pub use envelope::{
    decode_request, ProtocolError, Rejection, Request, Response, ResponseBody, INTERNAL_ERROR,
    INVALID_REQUEST, PARSE_ERROR, PROTOCOL_VERSION,
};
pub use error::{FrameError, Result};
pub use outcome::{ErrorEntry, Outcome, Reason};
pub use reader::LineReader;
pub use writer::LineWriter;
