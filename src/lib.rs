//! mink: JSON-RPC 2.0 sessions over WebSocket
//!
//! Convenience crate re-exporting the workspace:
//!
//! - **mink-core**: envelope types, validation, codec, errors, observability
//! - **mink-server**: listener, sessions, dispatchers, router, metrics
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use mink::server::from_fn;
//! use mink::Listener;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let listener = Listener::builder()
//!         .bind_str("127.0.0.1:8080")?
//!         .handler("ping", from_fn(|_| async { Ok(serde_json::json!("pong")) }))
//!         .build()
//!         .await?;
//!
//!     listener.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! The `mink-server` binary runs a listener with the placeholder dispatcher,
//! configured from the environment.

pub use mink_core as core;
pub use mink_server as server;

pub use mink_core::{Envelope, ErrorCode, Id, Response, RpcError};
pub use mink_server::{Listener, ListenerConfig, SessionConfig};
