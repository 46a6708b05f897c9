//! Accept loop
//!
//! A [`Listener`] binds one endpoint and turns every accepted connection into
//! a [`Session`] running on its own task. The loop goes straight back to
//! accepting, so a slow handshake or a long-lived session never holds up the
//! next client.
//!
//! Binding is done step by step (open, set address reuse, bind, listen) so
//! that a failure names the step that failed; see [`BindError`].

use crate::builder::ServerBuilder;
use crate::config::{ListenerConfig, SessionConfig};
use crate::diagnostics::{self, Failure};
use crate::dispatch::{Dispatcher, PlaceholderDispatcher};
use crate::metrics::ServerMetrics;
use crate::session::Session;
use mink_core::ObservabilityGuard;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::{TcpListener, TcpSocket, TcpStream};

/// Pause after an accept error that is not tied to a single connection
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// Failure to set up the listening socket
#[derive(Debug, Error)]
pub enum BindError {
    /// The socket could not be created
    #[error("failed to open socket for {addr}: {source}")]
    Open {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// Address reuse could not be enabled
    #[error("failed to set SO_REUSEADDR on {addr}: {source}")]
    SetOption {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// The address could not be bound (in use, not local, no permission)
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// The bound socket could not start listening
    #[error("failed to listen on {addr}: {source}")]
    Listen {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
}

impl BindError {
    /// The step that failed
    pub fn failure(&self) -> Failure {
        match self {
            BindError::Open { .. } => Failure::Open,
            BindError::SetOption { .. } => Failure::SetOption,
            BindError::Bind { .. } => Failure::Bind,
            BindError::Listen { .. } => Failure::Listen,
        }
    }

    /// The endpoint that could not be bound
    pub fn addr(&self) -> SocketAddr {
        match self {
            BindError::Open { addr, .. }
            | BindError::SetOption { addr, .. }
            | BindError::Bind { addr, .. }
            | BindError::Listen { addr, .. } => *addr,
        }
    }

    /// The underlying I/O error
    pub fn io_error(&self) -> &io::Error {
        match self {
            BindError::Open { source, .. }
            | BindError::SetOption { source, .. }
            | BindError::Bind { source, .. }
            | BindError::Listen { source, .. } => source,
        }
    }
}

/// Failure that stops the accept loop
#[derive(Debug, Error)]
pub enum ListenerError {
    /// The listening socket itself is no longer usable
    #[error("accept failed on {addr}: {source}")]
    Accept {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
}

/// Bound endpoint plus everything sessions need
///
/// ```rust,no_run
/// use mink_server::{Listener, ListenerConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let listener = Listener::bind(ListenerConfig::new("127.0.0.1:8080".parse()?))?;
/// listener
///     .run_until(async {
///         let _ = tokio::signal::ctrl_c().await;
///     })
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct Listener {
    listener: TcpListener,
    local_addr: SocketAddr,
    dispatcher: Arc<dyn Dispatcher>,
    session_config: Arc<SessionConfig>,
    metrics: Option<Arc<ServerMetrics>>,
    next_session_id: AtomicU64,
    // Flushed when the listener is dropped.
    _observability: Option<ObservabilityGuard>,
}

impl Listener {
    /// Builder with handlers, timeouts and observability
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// Bind with the placeholder dispatcher
    ///
    /// Must be called from within a Tokio runtime.
    pub fn bind(config: ListenerConfig) -> Result<Self, BindError> {
        Self::bind_with(config, Arc::new(PlaceholderDispatcher))
    }

    /// Bind with a specific dispatcher
    pub fn bind_with(
        config: ListenerConfig,
        dispatcher: Arc<dyn Dispatcher>,
    ) -> Result<Self, BindError> {
        let (listener, local_addr) = open(config.addr, config.backlog).map_err(|e| {
            diagnostics::report(e.failure(), &e, None);
            e
        })?;

        tracing::info!(addr = %local_addr, backlog = config.backlog, "Listening");

        Ok(Self {
            listener,
            local_addr,
            dispatcher,
            session_config: Arc::new(config.session),
            metrics: None,
            next_session_id: AtomicU64::new(0),
            _observability: None,
        })
    }

    pub(crate) fn with_metrics(mut self, metrics: Option<Arc<ServerMetrics>>) -> Self {
        self.metrics = metrics;
        self
    }

    pub(crate) fn with_observability(mut self, guard: Option<ObservabilityGuard>) -> Self {
        self._observability = guard;
        self
    }

    /// The bound address, with the real port when bound to port 0
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Settings every session is started with
    pub fn session_config(&self) -> &SessionConfig {
        &self.session_config
    }

    /// Accept connections forever
    ///
    /// Returns only if the listening socket stops working.
    pub async fn run(&self) -> Result<(), ListenerError> {
        self.run_until(std::future::pending()).await
    }

    /// Accept connections until `shutdown` completes
    ///
    /// Sessions already running are left to finish on their own.
    #[tracing::instrument(name = "listener.run", skip_all, fields(addr = %self.local_addr))]
    pub async fn run_until<F>(&self, shutdown: F) -> Result<(), ListenerError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("Shutting down listener");
                    return Ok(());
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => self.spawn_session(stream, peer),
                    Err(e) => self.accept_failed(e).await?,
                },
            }
        }
    }

    fn spawn_session(&self, stream: TcpStream, peer: SocketAddr) {
        let id = self.next_session_id.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(session_id = id, peer = %peer, "Connection accepted");

        let session = Session::new(
            id,
            stream,
            Arc::clone(&self.dispatcher),
            Arc::clone(&self.session_config),
        )
        .with_peer(peer)
        .with_metrics(self.metrics.clone());

        tokio::spawn(session.run());
    }

    async fn accept_failed(&self, error: io::Error) -> Result<(), ListenerError> {
        diagnostics::report(Failure::Accept, &error, self.metrics.as_deref());

        match error.kind() {
            io::ErrorKind::InvalidInput => Err(ListenerError::Accept {
                addr: self.local_addr,
                source: error,
            }),
            io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::Interrupted => Ok(()),
            // Usually descriptor exhaustion; spinning would not free any.
            _ => {
                tokio::time::sleep(ACCEPT_BACKOFF).await;
                Ok(())
            }
        }
    }
}

impl std::fmt::Debug for Listener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listener")
            .field("local_addr", &self.local_addr)
            .field("session_config", &self.session_config)
            .finish_non_exhaustive()
    }
}

/// Listening socket and the address it actually bound (port 0 resolved)
fn open(addr: SocketAddr, backlog: u32) -> Result<(TcpListener, SocketAddr), BindError> {
    let socket = match addr {
        SocketAddr::V4(_) => TcpSocket::new_v4(),
        SocketAddr::V6(_) => TcpSocket::new_v6(),
    }
    .map_err(|source| BindError::Open { addr, source })?;

    socket
        .set_reuseaddr(true)
        .map_err(|source| BindError::SetOption { addr, source })?;
    socket
        .bind(addr)
        .map_err(|source| BindError::Bind { addr, source })?;
    let listener = socket
        .listen(backlog)
        .map_err(|source| BindError::Listen { addr, source })?;
    let local_addr = listener
        .local_addr()
        .map_err(|source| BindError::Listen { addr, source })?;
    Ok((listener, local_addr))
}
