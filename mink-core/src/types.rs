//! JSON-RPC 2.0 envelope types
//!
//! mink only ever receives requests and only ever sends responses, so this
//! module has exactly those two shapes plus the request identifier:
//!
//! - **Envelope**: a validated inbound request (`method`, `params?`, `id?`)
//! - **Response**: an outbound reply carrying either `result` or `error`
//! - **Id**: string, number, or null, echoed from request to response
//!
//! Envelopes are built by the validator in [`crate::envelope`], never by
//! deserializing straight into the struct, so every field has been checked
//! before a dispatcher sees it.

use crate::error::{ErrorCode, RpcError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// JSON-RPC 2.0 request identifier
///
/// Numbers keep their JSON representation (`serde_json::Number`) so that an id
/// such as `1.5` or `18446744073709551615` is echoed back byte-for-byte rather
/// than squeezed into an `i64`.
///
/// ```rust
/// use mink_core::Id;
///
/// let id1: Id = "req-123".into();
/// let id2: Id = 42i64.into();
///
/// assert_eq!(id1.to_string(), "\"req-123\"");
/// assert_eq!(id2.to_string(), "42");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Id {
    /// String identifier
    String(String),
    /// Numeric identifier, integer or fractional
    Number(serde_json::Number),
    /// Explicit null
    Null,
}

impl Id {
    /// Convert a JSON value into an id, if it has one of the allowed types
    pub fn from_value(value: &Value) -> Option<Id> {
        match value {
            Value::String(s) => Some(Id::String(s.clone())),
            Value::Number(n) => Some(Id::Number(n.clone())),
            Value::Null => Some(Id::Null),
            _ => None,
        }
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Id::String(s) => write!(f, "\"{}\"", s),
            Id::Number(n) => write!(f, "{}", n),
            Id::Null => write!(f, "null"),
        }
    }
}

impl From<String> for Id {
    fn from(s: String) -> Self {
        Id::String(s)
    }
}

impl From<&str> for Id {
    fn from(s: &str) -> Self {
        Id::String(s.to_string())
    }
}

impl From<i64> for Id {
    fn from(n: i64) -> Self {
        Id::Number(n.into())
    }
}

impl From<u64> for Id {
    fn from(n: u64) -> Self {
        Id::Number(n.into())
    }
}

/// A validated JSON-RPC request envelope
///
/// `id` is `None` when the member was absent and `Some(Id::Null)` when it was
/// present as `null`. Both are answered with `"id": null`.
///
/// # Examples
///
/// ```rust
/// use mink_core::{Envelope, Id};
/// use serde_json::json;
///
/// let envelope = Envelope::new("subtract", Some(json!([42, 23])), Some(Id::from(1i64)));
/// assert_eq!(envelope.method, "subtract");
/// assert_eq!(envelope.reply_id(), Id::from(1i64));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Name of the method to invoke
    pub method: String,
    /// Positional (array) or named (object) parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    /// Correlation id, if the client sent one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Id>,
}

impl Envelope {
    /// Create an envelope directly (mostly useful in tests and dispatchers)
    pub fn new(method: impl Into<String>, params: Option<Value>, id: Option<Id>) -> Self {
        Self {
            method: method.into(),
            params,
            id,
        }
    }

    /// The id a response to this envelope must carry
    pub fn reply_id(&self) -> Id {
        self.id.clone().unwrap_or(Id::Null)
    }
}

/// JSON-RPC 2.0 response envelope
///
/// Exactly one of `result` and `error` is set; the constructors enforce it.
///
/// ```rust
/// use mink_core::{Response, RpcError, Id};
/// use serde_json::json;
///
/// let ok = Response::success(json!({"value": 42}), Id::from(1i64));
/// assert!(ok.is_success());
///
/// let failed = Response::error(RpcError::method_not_found("nope"), Id::Null);
/// assert!(failed.is_error());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Always "2.0"
    pub jsonrpc: String,
    /// Method result, present only on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error object, present only on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
    /// Id of the request being answered, `null` when it is unknown
    pub id: Id,
}

impl Response {
    /// Successful response
    pub fn success(result: Value, id: Id) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    /// Error response
    pub fn error(error: RpcError, id: Id) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(error),
            id,
        }
    }

    /// Error response built from a bare code and its default message
    pub fn from_code(code: impl Into<ErrorCode>, id: Id) -> Self {
        Self::error(RpcError::from_code(code), id)
    }

    /// Whether `result` is present
    pub fn is_success(&self) -> bool {
        self.result.is_some()
    }

    /// Whether `error` is present
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// The error code, if this is an error response
    pub fn error_code(&self) -> Option<ErrorCode> {
        self.error.as_ref().map(|e| e.code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_id_display() {
        assert_eq!(Id::String("test".to_string()).to_string(), "\"test\"");
        assert_eq!(Id::from(42i64).to_string(), "42");
        assert_eq!(Id::Null.to_string(), "null");
    }

    #[test]
    fn test_id_from_value() {
        assert_eq!(Id::from_value(&json!("a")), Some(Id::from("a")));
        assert_eq!(Id::from_value(&json!(7)), Some(Id::from(7i64)));
        assert_eq!(Id::from_value(&json!(null)), Some(Id::Null));
        assert_eq!(Id::from_value(&json!([1])), None);
        assert_eq!(Id::from_value(&json!({"id": 1})), None);
        assert_eq!(Id::from_value(&json!(true)), None);
    }

    #[test]
    fn test_fractional_id_is_preserved() {
        let id = Id::from_value(&json!(1.5)).unwrap();
        let response = Response::from_code(ErrorCode::NOT_DISPATCHED, id);
        let encoded = serde_json::to_value(&response).unwrap();
        assert_eq!(encoded["id"], json!(1.5));
    }

    #[test]
    fn test_reply_id_defaults_to_null() {
        let envelope = Envelope::new("ping", None, None);
        assert_eq!(envelope.reply_id(), Id::Null);

        let envelope = Envelope::new("ping", None, Some(Id::from("abc")));
        assert_eq!(envelope.reply_id(), Id::from("abc"));
    }

    #[test]
    fn test_response_error_shape() {
        let resp = Response::error(RpcError::parse_error(), Id::Null);
        let value = serde_json::to_value(&resp).unwrap();

        assert_eq!(value["jsonrpc"], "2.0");
        assert_eq!(value["error"]["code"], -1);
        assert_eq!(value["id"], Value::Null);
        assert!(value.get("result").is_none());
    }

    #[test]
    fn test_response_success_shape() {
        let resp = Response::success(json!({"status": "ok"}), Id::from(1i64));
        assert!(resp.is_success());
        assert!(!resp.is_error());
        assert_eq!(resp.error_code(), None);

        let value = serde_json::to_value(&resp).unwrap();
        assert!(value.get("error").is_none());
        assert_eq!(value["result"]["status"], "ok");
    }
}
