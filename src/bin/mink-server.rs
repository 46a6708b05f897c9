//! mink server binary
//!
//! Runs a listener with the placeholder dispatcher: every well-formed request
//! is answered with code 999, malformed input with code -1.
//!
//! # Configuration
//!
//! - `MINK_BIND_ADDRESS`: endpoint to bind (default `127.0.0.1:8080`)
//! - `MINK_HANDSHAKE_TIMEOUT_SECS`: upgrade deadline (default 30)
//! - `MINK_IDLE_TIMEOUT_SECS`: close silent sessions after this long, `0` to
//!   disable (default 300)
//! - `MINK_MAX_MESSAGE_SIZE`: largest accepted message in bytes (default 64 MiB)
//! - `RUST_LOG`: log filter (default `info`)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: enables OTLP export of traces and metrics
//!
//! ```bash
//! MINK_BIND_ADDRESS=0.0.0.0:9000 RUST_LOG=mink_server=debug cargo run --bin mink-server
//! ```
//!
//! Stops accepting on Ctrl-C. A bind failure exits with a non-zero status.

use anyhow::Context;
use mink::core::ObservabilityConfig;
use mink::server::{
    DEFAULT_HANDSHAKE_TIMEOUT, DEFAULT_IDLE_TIMEOUT, DEFAULT_MAX_MESSAGE_SIZE,
};
use mink::Listener;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:8080";

#[derive(Debug, PartialEq)]
struct Settings {
    bind: SocketAddr,
    handshake_timeout: Duration,
    idle_timeout: Option<Duration>,
    max_message_size: usize,
}

impl Settings {
    fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let bind = lookup("MINK_BIND_ADDRESS").unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());
        let bind = bind
            .parse::<SocketAddr>()
            .with_context(|| format!("MINK_BIND_ADDRESS: invalid address '{}'", bind))?;

        let handshake_secs: u64 = parse_or(
            &lookup,
            "MINK_HANDSHAKE_TIMEOUT_SECS",
            DEFAULT_HANDSHAKE_TIMEOUT.as_secs(),
        )?;
        let idle_secs: u64 =
            parse_or(&lookup, "MINK_IDLE_TIMEOUT_SECS", DEFAULT_IDLE_TIMEOUT.as_secs())?;
        let max_message_size: usize =
            parse_or(&lookup, "MINK_MAX_MESSAGE_SIZE", DEFAULT_MAX_MESSAGE_SIZE)?;

        Ok(Self {
            bind,
            handshake_timeout: Duration::from_secs(handshake_secs),
            idle_timeout: (idle_secs > 0).then(|| Duration::from_secs(idle_secs)),
            max_message_size,
        })
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{}: invalid value '{}'", key, raw)),
        None => Ok(default),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::from_env()?;

    let mut builder = Listener::builder()
        .bind(settings.bind)
        .handshake_timeout(settings.handshake_timeout)
        .max_message_size(settings.max_message_size)
        .with_observability(ObservabilityConfig::new("mink-server"));
    builder = match settings.idle_timeout {
        Some(idle) => builder.idle_timeout(idle),
        None => builder.no_idle_timeout(),
    };

    let listener = builder
        .build()
        .await
        .with_context(|| format!("failed to start listener on {}", settings.bind))?;

    tracing::info!(addr = %listener.local_addr(), "mink server ready");

    listener
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        })
        .await?;

    tracing::info!("mink server stopped");
    Ok(())
}
