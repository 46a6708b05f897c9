//! The dispatch seam between a session and the method implementations
//!
//! A session validates each message and hands the resulting [`Envelope`] to a
//! [`Dispatcher`]. Whatever the dispatcher returns becomes the reply, with the
//! request id echoed back. Two implementations ship with the crate:
//!
//! - [`PlaceholderDispatcher`]: answers everything with code 999, "accepted but
//!   not dispatched". This is the default.
//! - [`Router`](crate::Router): routes by method name to registered handlers.
//!
//! # Examples
//!
//! ```rust
//! use async_trait::async_trait;
//! use mink_core::{Envelope, RpcError};
//! use mink_server::Dispatcher;
//! use serde_json::{json, Value};
//!
//! struct Echo;
//!
//! #[async_trait]
//! impl Dispatcher for Echo {
//!     async fn dispatch(&self, envelope: &Envelope) -> Result<Value, RpcError> {
//!         Ok(json!({"method": envelope.method, "params": envelope.params}))
//!     }
//! }
//! ```

use async_trait::async_trait;
use mink_core::{Envelope, Response, RpcError};
use serde_json::Value;
use std::sync::Arc;

/// Turns a validated request into a result or a wire error
#[async_trait]
pub trait Dispatcher: Send + Sync {
    /// Handle one request
    async fn dispatch(&self, envelope: &Envelope) -> Result<Value, RpcError>;
}

#[async_trait]
impl<D: Dispatcher + ?Sized> Dispatcher for Arc<D> {
    async fn dispatch(&self, envelope: &Envelope) -> Result<Value, RpcError> {
        (**self).dispatch(envelope).await
    }
}

/// Accepts every request without running anything
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderDispatcher;

#[async_trait]
impl Dispatcher for PlaceholderDispatcher {
    async fn dispatch(&self, _envelope: &Envelope) -> Result<Value, RpcError> {
        Err(RpcError::not_dispatched())
    }
}

/// Dispatch and wrap the outcome in a response carrying the request id
pub async fn respond(dispatcher: &dyn Dispatcher, envelope: &Envelope) -> Response {
    match dispatcher.dispatch(envelope).await {
        Ok(result) => Response::success(result, envelope.reply_id()),
        Err(error) => Response::error(error, envelope.reply_id()),
    }
}
