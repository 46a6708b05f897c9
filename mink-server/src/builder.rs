//! Fluent construction of a [`Listener`]
//!
//! The builder collects the endpoint, the dispatcher (or the handlers for a
//! [`Router`]), session timeouts and observability, then binds in one step.
//!
//! Dispatcher selection, in order:
//! 1. an explicit [`ServerBuilder::dispatcher`]
//! 2. the router, if any handler was registered
//! 3. the placeholder dispatcher (every request answered with code 999)
//!
//! ```rust,no_run
//! use mink_server::{from_fn, Listener};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let listener = Listener::builder()
//!     .bind_str("127.0.0.1:8080")?
//!     .handler("ping", from_fn(|_| async { Ok(serde_json::json!("pong")) }))
//!     .idle_timeout(Duration::from_secs(60))
//!     .with_default_observability()
//!     .build()
//!     .await?;
//!
//! listener.run().await?;
//! # Ok(())
//! # }
//! ```

use crate::config::{ListenerConfig, SessionConfig, DEFAULT_BACKLOG};
use crate::dispatch::{Dispatcher, PlaceholderDispatcher};
use crate::handler::Handler;
use crate::listener::{BindError, Listener};
use crate::metrics::ServerMetrics;
use crate::router::Router;
use mink_core::ObservabilityConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Why [`ServerBuilder::build`] failed
#[derive(Debug, Error)]
pub enum BuildError {
    /// `bind` was never called
    #[error("no bind address specified")]
    MissingAddress,

    /// `bind_str` got something that is not `ip:port`
    #[error("invalid bind address '{input}': {reason}")]
    InvalidAddress { input: String, reason: String },

    /// Observability could not be installed
    #[error("failed to initialize observability: {0}")]
    Observability(String),

    /// The endpoint could not be bound
    #[error(transparent)]
    Bind(#[from] BindError),
}

/// Builder for a [`Listener`]
pub struct ServerBuilder {
    addr: Option<SocketAddr>,
    dispatcher: Option<Arc<dyn Dispatcher>>,
    router: Router,
    backlog: u32,
    session: SessionConfig,
    observability_config: Option<ObservabilityConfig>,
    service_name: Option<String>,
}

impl ServerBuilder {
    /// Builder with default settings and no address
    pub fn new() -> Self {
        Self {
            addr: None,
            dispatcher: None,
            router: Router::new(),
            backlog: DEFAULT_BACKLOG,
            session: SessionConfig::default(),
            observability_config: None,
            service_name: None,
        }
    }

    /// Endpoint to bind
    pub fn bind(mut self, addr: impl Into<SocketAddr>) -> Self {
        self.addr = Some(addr.into());
        self
    }

    /// Endpoint to bind, parsed from e.g. "127.0.0.1:8080"
    pub fn bind_str(mut self, addr: &str) -> Result<Self, BuildError> {
        let parsed = addr
            .parse::<SocketAddr>()
            .map_err(|e| BuildError::InvalidAddress {
                input: addr.to_string(),
                reason: e.to_string(),
            })?;
        self.addr = Some(parsed);
        Ok(self)
    }

    /// Use a custom dispatcher; registered handlers are then ignored
    pub fn dispatcher(mut self, dispatcher: impl Dispatcher + 'static) -> Self {
        self.dispatcher = Some(Arc::new(dispatcher));
        self
    }

    /// Register a handler on the builder's router
    pub fn handler(mut self, method: impl Into<String>, handler: Box<dyn Handler>) -> Self {
        self.router.register(method, handler);
        self
    }

    /// Replace the router, dropping handlers registered so far
    pub fn router(mut self, router: Router) -> Self {
        self.router = router;
        self
    }

    /// Pending-connection backlog
    pub fn backlog(mut self, backlog: u32) -> Self {
        self.backlog = backlog;
        self
    }

    /// Product name in the `Server` upgrade header
    pub fn server_name(mut self, name: impl Into<String>) -> Self {
        self.session.server_name = name.into();
        self
    }

    /// Time allowed for the WebSocket upgrade
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.session.handshake_timeout = timeout;
        self
    }

    /// Close sessions that stay silent this long
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.session.idle_timeout = Some(timeout);
        self
    }

    /// Never close sessions for inactivity
    pub fn no_idle_timeout(mut self) -> Self {
        self.session.idle_timeout = None;
        self
    }

    /// Largest accepted message in bytes
    pub fn max_message_size(mut self, bytes: usize) -> Self {
        self.session.max_message_size = Some(bytes);
        self
    }

    /// Install observability with a custom configuration on build
    pub fn with_observability(mut self, config: ObservabilityConfig) -> Self {
        self.observability_config = Some(config);
        self
    }

    /// Install observability with the default configuration on build
    pub fn with_default_observability(mut self) -> Self {
        self.observability_config = Some(ObservabilityConfig::default());
        self
    }

    /// Service name for observability (only used if observability is enabled)
    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = Some(name.into());
        self
    }

    fn select_dispatcher(&mut self) -> Arc<dyn Dispatcher> {
        if let Some(dispatcher) = self.dispatcher.take() {
            return dispatcher;
        }
        if self.router.is_empty() {
            Arc::new(PlaceholderDispatcher)
        } else {
            Arc::new(std::mem::take(&mut self.router))
        }
    }

    /// Install observability if requested, then bind
    pub async fn build(mut self) -> Result<Listener, BuildError> {
        let addr = self.addr.ok_or(BuildError::MissingAddress)?;

        let (guard, metrics) = match self.observability_config.take() {
            Some(mut config) => {
                if let Some(name) = self.service_name.take() {
                    config.service_name = name;
                }
                let guard = mink_core::init_observability(config.clone())
                    .map_err(|e| BuildError::Observability(e.to_string()))?;
                let metrics = Arc::new(ServerMetrics::new(config.service_name));
                (Some(guard), Some(metrics))
            }
            None => (None, None),
        };

        let dispatcher = self.select_dispatcher();
        let config = ListenerConfig {
            addr,
            backlog: self.backlog,
            session: self.session,
        };

        let listener = Listener::bind_with(config, dispatcher)?
            .with_metrics(metrics)
            .with_observability(guard);
        Ok(listener)
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
