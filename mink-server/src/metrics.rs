//! Server metrics
//!
//! OpenTelemetry instruments for sessions and messages. They are only created
//! when observability is enabled on the builder, and are exported through
//! whatever meter provider `mink_core::init_observability` installed.
//!
//! # Metrics Collected
//!
//! - **mink.server.sessions.active**: sessions currently open (gauge)
//! - **mink.server.sessions.total**: sessions accepted since startup (counter)
//! - **mink.server.messages.total**: text messages answered, by `outcome` (counter)
//! - **mink.server.message.duration**: time from read to reply, in seconds (histogram)
//! - **mink.server.errors.total**: reported failures, by `category` (counter)
//! - **mink.server.closes.total**: finished sessions, by `reason` (counter)
//!
//! ```rust,no_run
//! use mink_server::ServerMetrics;
//!
//! let metrics = ServerMetrics::new("my-service");
//! metrics.session_opened();
//! metrics.record_message("ok", 0.002);
//! metrics.session_closed("peer");
//! ```

use opentelemetry::{
    global,
    metrics::{Counter, Gauge, Histogram, Meter},
    KeyValue,
};
use std::sync::atomic::{AtomicI64, Ordering};

/// Metric instruments shared by a listener and all of its sessions
pub struct ServerMetrics {
    /// Number of open sessions
    pub sessions_active: Gauge<i64>,
    /// Sessions accepted (cumulative)
    pub sessions_total: Counter<u64>,
    /// Messages answered
    pub messages_total: Counter<u64>,
    /// Read-to-reply latency in seconds
    pub message_duration: Histogram<f64>,
    /// Failures reported to the diagnostic sink
    pub errors_total: Counter<u64>,
    /// Sessions closed
    pub closes_total: Counter<u64>,
    active: AtomicI64,
}

impl ServerMetrics {
    /// Instruments on the global meter named after the service
    pub fn new(service_name: impl Into<String>) -> Self {
        let name: &'static str = Box::leak(service_name.into().into_boxed_str());
        let meter = global::meter(name);
        Self::new_with_meter(&meter)
    }

    /// Instruments on a specific meter
    pub fn new_with_meter(meter: &Meter) -> Self {
        Self {
            sessions_active: meter
                .i64_gauge("mink.server.sessions.active")
                .with_description("Number of open WebSocket sessions")
                .build(),
            sessions_total: meter
                .u64_counter("mink.server.sessions.total")
                .with_description("Total number of sessions accepted")
                .build(),
            messages_total: meter
                .u64_counter("mink.server.messages.total")
                .with_description("Total number of messages answered")
                .build(),
            message_duration: meter
                .f64_histogram("mink.server.message.duration")
                .with_description("Time from message read to reply sent, in seconds")
                .build(),
            errors_total: meter
                .u64_counter("mink.server.errors.total")
                .with_description("Total number of reported failures")
                .build(),
            closes_total: meter
                .u64_counter("mink.server.closes.total")
                .with_description("Total number of sessions closed")
                .build(),
            active: AtomicI64::new(0),
        }
    }

    /// A session was accepted
    pub fn session_opened(&self) {
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.sessions_active.record(active, &[]);
        self.sessions_total.add(1, &[]);
    }

    /// A session finished
    pub fn session_closed(&self, reason: &str) {
        let active = self.active.fetch_sub(1, Ordering::SeqCst) - 1;
        self.sessions_active.record(active, &[]);
        self.closes_total
            .add(1, &[KeyValue::new("reason", reason.to_string())]);
    }

    /// Sessions currently open, as seen by this instance
    pub fn active_sessions(&self) -> i64 {
        self.active.load(Ordering::SeqCst)
    }

    /// A message was answered
    pub fn record_message(&self, outcome: &str, duration_secs: f64) {
        let attributes = &[KeyValue::new("outcome", outcome.to_string())];
        self.messages_total.add(1, attributes);
        self.message_duration.record(duration_secs, attributes);
    }

    /// A failure was reported
    pub fn record_error(&self, category: &str) {
        self.errors_total
            .add(1, &[KeyValue::new("category", category.to_string())]);
    }
}

impl std::fmt::Debug for ServerMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerMetrics")
            .field("active", &self.active_sessions())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = ServerMetrics::new("test-server");

        metrics.session_opened();
        metrics.record_message("ok", 0.1);
        metrics.record_message("malformed", 0.001);
        metrics.record_error("read");
        metrics.session_closed("peer");
    }

    #[test]
    fn test_active_session_tracking() {
        let metrics = ServerMetrics::new("test-server-sessions");

        metrics.session_opened();
        metrics.session_opened();
        metrics.session_opened();
        assert_eq!(metrics.active_sessions(), 3);

        metrics.session_closed("peer");
        metrics.session_closed("non_text");
        assert_eq!(metrics.active_sessions(), 1);

        metrics.session_closed("idle_timeout");
        assert_eq!(metrics.active_sessions(), 0);
    }
}
