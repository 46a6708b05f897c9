//! Listener and session configuration
//!
//! Defaults follow the usual server-side WebSocket suggestions: the upgrade
//! must finish within 30 seconds, a session with no inbound frame for 5
//! minutes is closed, and the server never sends keep-alive pings.

use std::net::SocketAddr;
use std::time::Duration;

/// Default pending-connection backlog
pub const DEFAULT_BACKLOG: u32 = 1024;

/// Default time allowed for the WebSocket upgrade
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);

/// Default time a session may stay silent before it is closed
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(300);

/// Default largest accepted message, in bytes
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 64 << 20;

/// Per-session settings, shared read-only by every session of a listener
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Product name sent in the `Server` header of the upgrade response
    pub server_name: String,
    /// Upgrade must complete within this duration
    pub handshake_timeout: Duration,
    /// Close the session after this long without an inbound frame; `None` waits forever
    pub idle_timeout: Option<Duration>,
    /// Largest message the transport will assemble; `None` for no limit
    pub max_message_size: Option<usize>,
}

impl SessionConfig {
    /// Value of the `Server` header, e.g. `mink/0.1.0 websocket-server-async`
    pub fn server_header(&self) -> String {
        format!(
            "{}/{} websocket-server-async",
            self.server_name,
            env!("CARGO_PKG_VERSION")
        )
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            server_name: "mink".to_string(),
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            idle_timeout: Some(DEFAULT_IDLE_TIMEOUT),
            max_message_size: Some(DEFAULT_MAX_MESSAGE_SIZE),
        }
    }
}

/// Everything needed to bind a listener
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerConfig {
    /// Endpoint to bind; port 0 picks a free port
    pub addr: SocketAddr,
    /// Maximum number of pending connections
    pub backlog: u32,
    /// Settings handed to every session
    pub session: SessionConfig,
}

impl ListenerConfig {
    /// Defaults for everything but the address
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            backlog: DEFAULT_BACKLOG,
            session: SessionConfig::default(),
        }
    }
}
