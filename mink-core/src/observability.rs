//! Logging and OpenTelemetry setup
//!
//! Every diagnostic in mink goes through the `tracing` facade. This module
//! installs the subscriber that decides where those events end up:
//!
//! - an `EnvFilter` built from `RUST_LOG` or the configured level
//! - a local `fmt` layer, plain text or JSON
//! - optionally, OTLP export of spans and metrics when an endpoint is configured
//!
//! Call [`init_observability`] once at startup and keep the returned
//! [`ObservabilityGuard`] alive until shutdown; dropping it flushes pending
//! telemetry.
//!
//! ```rust,no_run
//! use mink_core::ObservabilityConfig;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ObservabilityConfig::new("mink")
//!         .with_endpoint("http://localhost:4317")
//!         .with_log_level("debug");
//!
//!     let _guard = mink_core::init_observability(config).expect("observability");
//!     tracing::info!("ready");
//! }
//! ```
//!
//! # Environment Variables
//!
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: collector endpoint; OTLP export is off when unset
//! - `RUST_LOG`: log level filter (e.g. "info", "mink_server=debug")

use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::trace::SdkTracerProvider;
use opentelemetry_sdk::Resource;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Observability configuration
///
/// Defaults:
/// - service name "mink", version of this crate
/// - OTLP endpoint from `OTEL_EXPORTER_OTLP_ENDPOINT`, otherwise none (no export)
/// - traces and metrics exported when an endpoint is set
/// - local logs on, plain text, level from `RUST_LOG` or "info"
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    /// Service name attached to every span and metric
    pub service_name: String,

    /// Service version attached to every span and metric
    pub service_version: String,

    /// OTLP/gRPC collector endpoint, `None` to keep telemetry local
    pub otlp_endpoint: Option<String>,

    /// Export spans over OTLP
    pub enable_traces: bool,

    /// Export metrics over OTLP
    pub enable_metrics: bool,

    /// Write log events locally (stdout)
    pub enable_logs: bool,

    /// Emit local logs as JSON lines instead of plain text
    pub json_logs: bool,

    /// Filter directive used when `RUST_LOG` is not set
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            service_name: "mink".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            otlp_endpoint: std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok(),
            enable_traces: true,
            enable_metrics: true,
            enable_logs: true,
            json_logs: false,
            log_level: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        }
    }
}

impl ObservabilityConfig {
    /// Defaults with a custom service name
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            ..Default::default()
        }
    }

    /// Set the OTLP collector endpoint (e.g. "http://collector:4317")
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.otlp_endpoint = Some(endpoint.into());
        self
    }

    /// Keep all telemetry local
    pub fn without_export(mut self) -> Self {
        self.otlp_endpoint = None;
        self
    }

    /// Set the fallback log filter
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Set the service version
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.service_version = version.into();
        self
    }

    /// Enable or disable span export
    pub fn with_traces(mut self, enable: bool) -> Self {
        self.enable_traces = enable;
        self
    }

    /// Enable or disable metric export
    pub fn with_metrics(mut self, enable: bool) -> Self {
        self.enable_metrics = enable;
        self
    }

    /// Enable or disable local log output
    pub fn with_logs(mut self, enable: bool) -> Self {
        self.enable_logs = enable;
        self
    }

    /// Switch local logs between JSON and plain text
    pub fn with_json_logs(mut self, enable: bool) -> Self {
        self.json_logs = enable;
        self
    }

    fn exports_traces(&self) -> bool {
        self.enable_traces && self.otlp_endpoint.is_some()
    }

    fn exports_metrics(&self) -> bool {
        self.enable_metrics && self.otlp_endpoint.is_some()
    }

    fn resource(&self) -> Resource {
        Resource::builder_empty()
            .with_attributes(vec![
                KeyValue::new(
                    opentelemetry_semantic_conventions::resource::SERVICE_NAME,
                    self.service_name.clone(),
                ),
                KeyValue::new(
                    opentelemetry_semantic_conventions::resource::SERVICE_VERSION,
                    self.service_version.clone(),
                ),
            ])
            .build()
    }
}

/// Keeps the telemetry providers alive; flushes them on shutdown or drop
#[derive(Debug, Default)]
pub struct ObservabilityGuard {
    tracer_provider: Option<SdkTracerProvider>,
    meter_provider: Option<SdkMeterProvider>,
}

impl ObservabilityGuard {
    /// Whether spans are being exported
    pub fn exports_traces(&self) -> bool {
        self.tracer_provider.is_some()
    }

    /// Whether metrics are being exported
    pub fn exports_metrics(&self) -> bool {
        self.meter_provider.is_some()
    }

    /// Flush and shut down the providers. Safe to call more than once.
    pub fn shutdown(&mut self) {
        if let Some(provider) = self.tracer_provider.take() {
            if let Err(e) = provider.shutdown() {
                tracing::warn!(error = %e, "Tracer provider shutdown failed");
            }
        }
        if let Some(provider) = self.meter_provider.take() {
            if let Err(e) = provider.shutdown() {
                tracing::warn!(error = %e, "Meter provider shutdown failed");
            }
        }
    }
}

impl Drop for ObservabilityGuard {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Install the global subscriber and, if configured, the OTLP providers
///
/// Fails if a global subscriber is already installed or an exporter cannot be
/// built.
pub fn init_observability(config: ObservabilityConfig) -> Result<ObservabilityGuard, BoxError> {
    let mut guard = ObservabilityGuard::default();

    let tracer = if config.exports_traces() {
        let provider = init_tracer_provider(&config)?;
        use opentelemetry::trace::TracerProvider as _;
        let tracer = provider.tracer(config.service_name.clone());
        global::set_tracer_provider(provider.clone());
        guard.tracer_provider = Some(provider);
        Some(tracer)
    } else {
        None
    };

    if config.exports_metrics() {
        let provider = init_meter_provider(&config)?;
        global::set_meter_provider(provider.clone());
        guard.meter_provider = Some(provider);
    }

    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.log_level))?;

    let fmt_layer = if !config.enable_logs {
        None
    } else if config.json_logs {
        Some(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_line_number(true)
                .json()
                .boxed(),
        )
    } else {
        Some(tracing_subscriber::fmt::layer().with_target(true).boxed())
    };

    tracing_subscriber::registry()
        .with(tracer.map(|tracer| tracing_opentelemetry::layer().with_tracer(tracer)))
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    tracing::info!(
        service_name = %config.service_name,
        otlp_endpoint = config.otlp_endpoint.as_deref().unwrap_or("none"),
        traces = guard.exports_traces(),
        metrics = guard.exports_metrics(),
        "Observability initialized"
    );

    Ok(guard)
}

fn init_tracer_provider(config: &ObservabilityConfig) -> Result<SdkTracerProvider, BoxError> {
    use opentelemetry_sdk::trace::{RandomIdGenerator, Sampler};

    let endpoint = config.otlp_endpoint.clone().unwrap_or_default();
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()?;

    Ok(SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(config.resource())
        .with_sampler(Sampler::AlwaysOn)
        .with_id_generator(RandomIdGenerator::default())
        .build())
}

fn init_meter_provider(config: &ObservabilityConfig) -> Result<SdkMeterProvider, BoxError> {
    let endpoint = config.otlp_endpoint.clone().unwrap_or_default();
    let exporter = opentelemetry_otlp::MetricExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()?;

    let reader = opentelemetry_sdk::metrics::PeriodicReader::builder(exporter)
        .with_interval(Duration::from_secs(30))
        .build();

    Ok(SdkMeterProvider::builder()
        .with_reader(reader)
        .with_resource(config.resource())
        .build())
}
