//! Envelope validation
//!
//! Turns the raw text of one WebSocket message into a validated [`Envelope`],
//! or into an [`EnvelopeError`] that knows which error code to send back.
//!
//! Validation runs in two steps:
//!
//! 1. **Parse**: the text must be syntactically valid JSON. Anything else is
//!    `EnvelopeError::Malformed`.
//! 2. **Verify**: the parsed value must look like a JSON-RPC 2.0 request:
//!    - it is an object
//!    - `method` is present and is a string
//!    - `params`, if present, is an array or an object
//!    - `id`, if present, is a string, a number, or null
//!    - `jsonrpc`, if present, is exactly `"2.0"`
//!
//!    Any violation is `EnvelopeError::Invalid`.
//!
//! Neither failure is fatal to a session: the caller answers with
//! [`gen_err`] and keeps reading.
//!
//! # Examples
//!
//! ```rust
//! use mink_core::envelope;
//! use mink_core::ErrorCode;
//!
//! let env = envelope::parse(r#"{"method":"ping","id":1}"#).unwrap();
//! assert_eq!(env.method, "ping");
//!
//! let err = envelope::parse("not json").unwrap_err();
//! assert_eq!(err.code(), ErrorCode::PARSE_ERROR);
//! ```

use crate::error::{ErrorCode, RpcError};
use crate::types::{Envelope, Id, Response};
use serde_json::{Map, Value};
use thiserror::Error;

/// Why a message could not be turned into an envelope
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EnvelopeError {
    /// The text is not valid JSON
    #[error("malformed input: {0}")]
    Malformed(String),

    /// Valid JSON, but not a valid request envelope
    ///
    /// `id` holds the request id when it could still be recovered, so the
    /// error reply can be correlated by the client.
    #[error("invalid envelope: {reason}")]
    Invalid {
        /// What was wrong with the envelope
        reason: String,
        /// The request id, if present and well-typed
        id: Option<Id>,
    },
}

impl EnvelopeError {
    /// Wire code for this failure
    pub fn code(&self) -> ErrorCode {
        match self {
            EnvelopeError::Malformed(_) => ErrorCode::PARSE_ERROR,
            EnvelopeError::Invalid { .. } => ErrorCode::INVALID_REQUEST,
        }
    }

    /// Id to put in the error reply
    pub fn reply_id(&self) -> Id {
        match self {
            EnvelopeError::Malformed(_) => Id::Null,
            EnvelopeError::Invalid { id, .. } => id.clone().unwrap_or(Id::Null),
        }
    }

    /// Complete error response for this failure
    pub fn to_response(&self) -> Response {
        let error = match self {
            EnvelopeError::Malformed(_) => RpcError::parse_error(),
            EnvelopeError::Invalid { reason, .. } => RpcError::invalid_request(reason.clone()),
        };
        Response::error(error, self.reply_id())
    }
}

/// Parse and verify one message
pub fn parse(raw: &str) -> Result<Envelope, EnvelopeError> {
    let value: Value =
        serde_json::from_str(raw).map_err(|e| EnvelopeError::Malformed(e.to_string()))?;
    verify(value)
}

/// Verify an already-parsed value against the request envelope shape
pub fn verify(value: Value) -> Result<Envelope, EnvelopeError> {
    let mut object = match value {
        Value::Object(object) => object,
        Value::Array(_) => return Err(invalid("batch requests are not supported", None)),
        other => {
            return Err(invalid(
                format!("expected an object, got {}", kind(&other)),
                None,
            ))
        }
    };

    // Recover the id first so every later failure can echo it.
    let id = match object.remove("id") {
        None => None,
        Some(raw) => match Id::from_value(&raw) {
            Some(id) => Some(id),
            None => {
                return Err(invalid(
                    format!("'id' must be a string, number or null, got {}", kind(&raw)),
                    None,
                ))
            }
        },
    };

    check_version(&object, &id)?;

    let method = match object.remove("method") {
        Some(Value::String(method)) => method,
        Some(other) => {
            return Err(invalid(
                format!("'method' must be a string, got {}", kind(&other)),
                id,
            ))
        }
        None => return Err(invalid("missing 'method'", id)),
    };

    let params = match object.remove("params") {
        None => None,
        Some(params @ (Value::Array(_) | Value::Object(_))) => Some(params),
        Some(other) => {
            return Err(invalid(
                format!("'params' must be an array or object, got {}", kind(&other)),
                id,
            ))
        }
    };

    Ok(Envelope { method, params, id })
}

/// Build a complete error envelope for `code`
///
/// ```rust
/// use mink_core::{envelope, ErrorCode, Id};
///
/// let reply = envelope::gen_err(ErrorCode::NOT_DISPATCHED, Id::from(1i64));
/// let json = serde_json::to_value(&reply).unwrap();
/// assert_eq!(json["error"]["code"], 999);
/// assert_eq!(json["id"], 1);
/// ```
pub fn gen_err(code: impl Into<ErrorCode>, id: Id) -> Response {
    Response::from_code(code, id)
}

fn check_version(object: &Map<String, Value>, id: &Option<Id>) -> Result<(), EnvelopeError> {
    match object.get("jsonrpc") {
        None => Ok(()),
        Some(Value::String(v)) if v == "2.0" => Ok(()),
        Some(other) => Err(invalid(
            format!("unsupported 'jsonrpc' version {}", other),
            id.clone(),
        )),
    }
}

fn invalid(reason: impl Into<String>, id: Option<Id>) -> EnvelopeError {
    EnvelopeError::Invalid {
        reason: reason.into(),
        id,
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
