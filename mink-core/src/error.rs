//! Error types for mink
//!
//! Three layers of errors live here:
//!
//! - **ErrorCode**: the signed integer carried on the wire inside an error envelope
//! - **RpcError**: the wire-format error object (`{code, message, data?}`)
//! - **Error**: application-level errors used as the crate-wide `Result` error
//!
//! # Error Codes
//!
//! mink keeps the sentinel codes of the session protocol it serves:
//! - `-1`: malformed input, used both for text that is not JSON and for JSON
//!   that is not a valid request envelope (the message tells them apart)
//! - `999`: the request was accepted but no method was dispatched
//!
//! Dispatchers that actually route methods use the JSON-RPC 2.0 reserved range:
//! - `-32601`: Method not found
//! - `-32602`: Invalid params
//! - `-32603`: Internal error
//!
//! # Examples
//!
//! ```rust
//! use mink_core::{ErrorCode, RpcError};
//!
//! let error = RpcError::parse_error();
//! assert_eq!(error.code, ErrorCode::PARSE_ERROR);
//! assert_eq!(error.code.value(), -1);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type for mink operations
pub type Result<T> = std::result::Result<T, Error>;

/// Signed integer identifying a failure class on the wire
///
/// Serializes transparently as the bare integer, so an `RpcError` encodes as
/// `{"code": -1, "message": "..."}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorCode(pub i32);

impl ErrorCode {
    /// Text that is not syntactically valid JSON
    pub const PARSE_ERROR: ErrorCode = ErrorCode(-1);
    /// Valid JSON that is not a valid request envelope
    pub const INVALID_REQUEST: ErrorCode = ErrorCode(-1);
    /// Request accepted, but no method was dispatched
    pub const NOT_DISPATCHED: ErrorCode = ErrorCode(999);
    /// The method does not exist / is not available
    pub const METHOD_NOT_FOUND: ErrorCode = ErrorCode(-32601);
    /// Invalid method parameter(s)
    pub const INVALID_PARAMS: ErrorCode = ErrorCode(-32602);
    /// Internal JSON-RPC error
    pub const INTERNAL_ERROR: ErrorCode = ErrorCode(-32603);

    /// The raw integer value
    pub fn value(self) -> i32 {
        self.0
    }

    /// Default human-readable message for this code
    ///
    /// `PARSE_ERROR` and `INVALID_REQUEST` share a value, so this returns the
    /// parse message for both; callers that know which one they mean should use
    /// the dedicated `RpcError` constructors.
    pub fn message(self) -> &'static str {
        match self.0 {
            -1 => "Parse error",
            999 => "Accepted but not dispatched",
            -32601 => "Method not found",
            -32602 => "Invalid params",
            -32603 => "Internal error",
            _ => "Server error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for ErrorCode {
    fn from(code: i32) -> Self {
        ErrorCode(code)
    }
}

/// JSON-RPC error object, exactly as it appears in the `error` member of a
/// response envelope
///
/// # Examples
///
/// ```rust
/// use mink_core::RpcError;
/// use serde_json::json;
///
/// let error = RpcError::method_not_found("calculate");
/// assert_eq!(error.code.value(), -32601);
///
/// let custom = RpcError::with_data(1001, "Insufficient funds", json!({"balance": 50}));
/// assert!(custom.data.is_some());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    /// Numeric failure class
    pub code: ErrorCode,

    /// Short human-readable description
    pub message: String,

    /// Optional structured detail
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl RpcError {
    /// Create an error with code and message
    pub fn new(code: impl Into<ErrorCode>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            data: None,
        }
    }

    /// Create an error carrying additional data
    pub fn with_data(
        code: impl Into<ErrorCode>,
        message: impl Into<String>,
        data: serde_json::Value,
    ) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            data: Some(data),
        }
    }

    /// Build an error from a code alone, using the code's default message
    pub fn from_code(code: impl Into<ErrorCode>) -> Self {
        let code = code.into();
        Self::new(code, code.message())
    }

    /// Malformed input (-1)
    pub fn parse_error() -> Self {
        Self::new(ErrorCode::PARSE_ERROR, "Parse error")
    }

    /// Envelope shape violation (-1)
    ///
    /// The reason ends up in `data` so the message stays stable.
    pub fn invalid_request(reason: impl Into<String>) -> Self {
        Self::with_data(
            ErrorCode::INVALID_REQUEST,
            "Invalid request",
            serde_json::Value::String(reason.into()),
        )
    }

    /// Accepted but not dispatched (999)
    pub fn not_dispatched() -> Self {
        Self::from_code(ErrorCode::NOT_DISPATCHED)
    }

    /// Method not found (-32601)
    ///
    /// ```rust
    /// use mink_core::RpcError;
    ///
    /// let error = RpcError::method_not_found("calculateFoo");
    /// assert_eq!(error.message, "Method not found: calculateFoo");
    /// ```
    pub fn method_not_found(method: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::METHOD_NOT_FOUND,
            format!("Method not found: {}", method.into()),
        )
    }

    /// Invalid params (-32602)
    pub fn invalid_params(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::INVALID_PARAMS, msg)
    }

    /// Internal error (-32603)
    pub fn internal_error(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::INTERNAL_ERROR, msg)
    }
}

impl fmt::Display for RpcError {
    /// Formats as "[code] message", e.g. "[-32601] Method not found: foo"
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for RpcError {}

/// Application-level error type for mink operations
///
/// Handlers return this type; the router turns it into an `RpcError` for the
/// wire via `From<Error> for RpcError`.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Already in wire format
    #[error("JSON-RPC error: {0}")]
    Rpc(#[from] RpcError),

    /// Serialization or deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Method not found in the registry
    #[error("Method not found: {0}")]
    MethodNotFound(String),

    /// The method exists but the parameters are wrong
    #[error("Invalid params: {0}")]
    InvalidParams(String),

    /// Unexpected failure while executing a method
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<Error> for RpcError {
    fn from(err: Error) -> Self {
        match err {
            Error::Rpc(e) => e,
            Error::MethodNotFound(method) => RpcError::method_not_found(method),
            Error::InvalidParams(msg) => RpcError::invalid_params(msg),
            other => RpcError::internal_error(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_code_serializes_as_integer() {
        let json = serde_json::to_string(&ErrorCode::NOT_DISPATCHED).unwrap();
        assert_eq!(json, "999");

        let code: ErrorCode = serde_json::from_str("-32601").unwrap();
        assert_eq!(code, ErrorCode::METHOD_NOT_FOUND);
    }

    #[test]
    fn test_sentinel_codes_share_value() {
        assert_eq!(ErrorCode::PARSE_ERROR, ErrorCode::INVALID_REQUEST);
        assert_ne!(ErrorCode::PARSE_ERROR, ErrorCode::NOT_DISPATCHED);
    }

    #[test]
    fn test_parse_and_invalid_request_messages_differ() {
        let parse = RpcError::parse_error();
        let invalid = RpcError::invalid_request("missing 'method'");

        assert_eq!(parse.code, invalid.code);
        assert_ne!(parse.message, invalid.message);
        assert_eq!(invalid.data, Some(json!("missing 'method'")));
    }

    #[test]
    fn test_from_code_uses_default_message() {
        let error = RpcError::from_code(999);
        assert_eq!(error.message, "Accepted but not dispatched");

        let unknown = RpcError::from_code(-32001);
        assert_eq!(unknown.message, "Server error");
    }

    #[test]
    fn test_rpc_error_display() {
        let error = RpcError::method_not_found("unknownMethod");
        assert_eq!(error.to_string(), "[-32601] Method not found: unknownMethod");
    }

    #[test]
    fn test_rpc_error_wire_shape() {
        let serialized = serde_json::to_value(RpcError::not_dispatched()).unwrap();
        assert_eq!(
            serialized,
            json!({"code": 999, "message": "Accepted but not dispatched"})
        );
    }

    #[test]
    fn test_error_into_rpc_error() {
        let not_found: RpcError = Error::MethodNotFound("foo".into()).into();
        assert_eq!(not_found.code, ErrorCode::METHOD_NOT_FOUND);

        let params: RpcError = Error::InvalidParams("expected object".into()).into();
        assert_eq!(params.code, ErrorCode::INVALID_PARAMS);

        let internal: RpcError = Error::Internal("pool exhausted".into()).into();
        assert_eq!(internal.code, ErrorCode::INTERNAL_ERROR);
        assert!(internal.message.contains("pool exhausted"));

        let encoding: RpcError = Error::Serialization("key must be a string".into()).into();
        assert_eq!(encoding.code, ErrorCode::INTERNAL_ERROR);

        let passthrough: RpcError = Error::Rpc(RpcError::new(42, "custom")).into();
        assert_eq!(passthrough.code.value(), 42);
    }
}
