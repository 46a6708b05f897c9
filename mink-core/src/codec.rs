//! Codec for response envelopes
//!
//! The inbound direction goes through the validator in [`crate::envelope`],
//! which has its own failure type. This module covers the outbound direction
//! (response → text frame) plus decoding of responses, which clients and tests
//! need to read what the server sent.
//!
//! Serialization failures map to `Error::Serialization`.
//!
//! ```rust
//! use mink_core::{codec, Response, Id, RpcError};
//!
//! let reply = Response::error(RpcError::not_dispatched(), Id::from(1i64));
//! let text = codec::encode_response(&reply).unwrap();
//! let back = codec::decode_response(&text).unwrap();
//! assert_eq!(back.error_code(), reply.error_code());
//! ```

use crate::error::{Error, Result};
use crate::types::Response;
use serde::{Deserialize, Serialize};

/// Encode any serializable message to a JSON string
pub fn encode<T: Serialize>(msg: &T) -> Result<String> {
    serde_json::to_string(msg).map_err(|e| Error::Serialization(e.to_string()))
}

/// Decode a JSON string into a specific type
pub fn decode_as<'de, T: Deserialize<'de>>(data: &'de str) -> Result<T> {
    serde_json::from_str(data).map_err(|e| Error::Serialization(e.to_string()))
}

/// Encode a response envelope for the wire
pub fn encode_response(resp: &Response) -> Result<String> {
    encode(resp)
}

/// Decode a response envelope received from a server
pub fn decode_response(data: &str) -> Result<Response> {
    decode_as(data)
}
