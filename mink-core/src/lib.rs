//! Core JSON-RPC 2.0 types, validation and codec for mink
//!
//! This crate holds everything about the wire format and nothing about the
//! transport:
//!
//! - **Types**: the request [`Envelope`], the [`Response`] and the request [`Id`]
//! - **Envelope validation**: raw text → validated envelope or [`EnvelopeError`]
//! - **Codec**: response (de)serialization
//! - **Error handling**: wire error codes, the wire error object, the crate `Error`
//! - **Observability**: `tracing` subscriber and OpenTelemetry export setup
//!
//! The `mink-server` crate builds the WebSocket listener and sessions on top of it.
//!
//! # Example
//!
//! ```rust
//! use mink_core::{codec, envelope, ErrorCode, Id};
//!
//! // A well-formed request
//! let env = envelope::parse(r#"{"jsonrpc":"2.0","method":"ping","id":1}"#).unwrap();
//! assert_eq!(env.method, "ping");
//!
//! // Malformed input gets an error envelope with the parse code
//! let err = envelope::parse("not json").unwrap_err();
//! let reply = codec::encode_response(&err.to_response()).unwrap();
//! assert!(reply.contains("\"code\":-1"));
//!
//! // The placeholder outcome for accepted requests
//! let reply = envelope::gen_err(ErrorCode::NOT_DISPATCHED, env.reply_id());
//! assert_eq!(reply.id, Id::from(1i64));
//! ```

pub mod codec;
pub mod envelope;
pub mod error;
pub mod observability;
pub mod types;

pub use envelope::EnvelopeError;
pub use error::{Error, ErrorCode, Result, RpcError};
pub use observability::{init_observability, ObservabilityConfig, ObservabilityGuard};
pub use types::{Envelope, Id, Response};
