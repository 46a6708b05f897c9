//! Diagnostic sink for transport failures
//!
//! Every failure that is not answered at the protocol level ends up here:
//! one `tracing` event with a `category` field naming the step that failed and
//! an `error` field with the cause. Listener-level failures are logged at
//! `error`, per-session failures at `warn` since they only end one session.

use crate::metrics::ServerMetrics;
use std::fmt;

/// The step that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Failure {
    /// Opening the listening socket
    Open,
    /// Setting a socket option (address reuse)
    SetOption,
    /// Binding the endpoint
    Bind,
    /// Starting to listen
    Listen,
    /// Accepting a connection
    Accept,
    /// WebSocket upgrade
    Handshake,
    /// Reading a message
    Read,
    /// Writing a reply or close frame
    Write,
}

impl Failure {
    /// Category name used in log fields and metric attributes
    pub fn as_str(self) -> &'static str {
        match self {
            Failure::Open => "open",
            Failure::SetOption => "set_option",
            Failure::Bind => "bind",
            Failure::Listen => "listen",
            Failure::Accept => "accept",
            Failure::Handshake => "handshake",
            Failure::Read => "read",
            Failure::Write => "write",
        }
    }

    /// Whether the failure ends only a single session
    pub fn is_session_scoped(self) -> bool {
        matches!(self, Failure::Handshake | Failure::Read | Failure::Write)
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Report a failure
pub fn report(failure: Failure, error: &dyn fmt::Display, metrics: Option<&ServerMetrics>) {
    if failure.is_session_scoped() {
        tracing::warn!(category = failure.as_str(), error = %error, "Session failure");
    } else {
        tracing::error!(category = failure.as_str(), error = %error, "Listener failure");
    }

    if let Some(m) = metrics {
        m.record_error(failure.as_str());
    }
}
