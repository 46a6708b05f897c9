//! JSON-RPC 2.0 session server over WebSocket
//!
//! A [`Listener`] accepts TCP connections and runs one [`Session`] per
//! connection on its own task. Each session upgrades the connection to
//! WebSocket, then loops: read one text message, validate it as a JSON-RPC
//! request, hand it to the [`Dispatcher`], write exactly one reply, read again.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use mink_server::{from_typed_fn, Listener};
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct AddParams { a: i64, b: i64 }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let listener = Listener::builder()
//!         .bind_str("127.0.0.1:8080")?
//!         .handler("add", from_typed_fn(|p: AddParams| async move { Ok(p.a + p.b) }))
//!         .build()
//!         .await?;
//!
//!     listener.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! Without any handler the listener answers every well-formed request with
//! error code 999 ("accepted but not dispatched").
//!
//! # Replies
//!
//! | inbound text                  | reply                                   |
//! |-------------------------------|-----------------------------------------|
//! | not JSON                      | error `-1` "Parse error", `id: null`    |
//! | JSON, not a request envelope  | error `-1` "Invalid request"            |
//! | valid request                 | whatever the dispatcher produced        |
//!
//! Non-text frames get a close frame with status 1000 and end the session.
//!
//! # Concurrency
//!
//! Sessions share nothing mutable: the dispatcher, the session config and the
//! metrics are behind `Arc`s. Within a session, reads and writes strictly
//! alternate.

mod builder;
mod config;
pub mod diagnostics;
mod dispatch;
mod handler;
mod listener;
mod metrics;
mod router;
mod session;

pub use builder::{BuildError, ServerBuilder};
pub use config::{
    ListenerConfig, SessionConfig, DEFAULT_BACKLOG, DEFAULT_HANDSHAKE_TIMEOUT,
    DEFAULT_IDLE_TIMEOUT, DEFAULT_MAX_MESSAGE_SIZE,
};
pub use diagnostics::Failure;
pub use dispatch::{respond, Dispatcher, PlaceholderDispatcher};
pub use handler::{from_fn, from_typed_fn, Handler, HandlerResult};
pub use listener::{BindError, Listener, ListenerError};
pub use metrics::ServerMetrics;
pub use router::{Router, RouterBuilder};
pub use session::{CloseReason, Session, SessionState};
