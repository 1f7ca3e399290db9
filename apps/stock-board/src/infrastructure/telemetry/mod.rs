//! Logging and OpenTelemetry Tracing
//!
//! Installs the global `tracing` subscriber: an `EnvFilter`, a fmt layer and,
//! when enabled, an OTLP span exporter.
//!
//! # Environment Variables
//!
//! - `OTEL_ENABLED`: Set to "false" to disable OTLP export (default: true)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (default: http://localhost:4317)
//! - `OTEL_SERVICE_NAME`: Service name for traces (default: stock-board)
//! - `RUST_LOG`: Extra filter directives

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const DEFAULT_SERVICE_NAME: &str = "stock-board";

const DEFAULT_OTLP_ENDPOINT: &str = "http://localhost:4317";

/// Directives applied on top of `RUST_LOG`.
const DEFAULT_DIRECTIVES: &[&str] = &["stock_board=info", "hyper=warn", "reqwest=warn", "tungstenite=warn"];

/// Shuts down the tracer provider when dropped. Keep it alive for the
/// lifetime of the process.
pub struct TelemetryGuard {
    tracer_provider: Option<SdkTracerProvider>,
}

impl TelemetryGuard {
    /// Whether spans are exported over OTLP.
    #[must_use]
    pub const fn is_exporting(&self) -> bool {
        self.tracer_provider.is_some()
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.tracer_provider.take()
            && let Err(e) = provider.shutdown()
        {
            eprintln!("Failed to shutdown OpenTelemetry tracer provider: {e}");
        }
    }
}

/// Telemetry configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Whether OTLP export is enabled.
    pub enabled: bool,
    /// OTLP exporter endpoint.
    pub otlp_endpoint: String,
    /// Service name for traces.
    pub service_name: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            otlp_endpoint: DEFAULT_OTLP_ENDPOINT.to_string(),
            service_name: DEFAULT_SERVICE_NAME.to_string(),
        }
    }
}

impl TelemetryConfig {
    /// Read configuration from the environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            enabled: lookup("OTEL_ENABLED").is_none_or(|v| !v.eq_ignore_ascii_case("false")),
            otlp_endpoint: lookup("OTEL_EXPORTER_OTLP_ENDPOINT").unwrap_or(defaults.otlp_endpoint),
            service_name: lookup("OTEL_SERVICE_NAME").unwrap_or(defaults.service_name),
        }
    }
}

/// Initialize telemetry from the environment.
#[must_use]
pub fn init() -> TelemetryGuard {
    init_with_config(&TelemetryConfig::from_env())
}

/// Initialize telemetry with the given configuration.
///
/// If the OTLP exporter cannot be built, logging still comes up and the
/// failure is reported through it.
#[must_use]
pub fn init_with_config(config: &TelemetryConfig) -> TelemetryGuard {
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    let exporter = if config.enabled {
        Some(
            opentelemetry_otlp::SpanExporter::builder()
                .with_tonic()
                .with_endpoint(&config.otlp_endpoint)
                .build(),
        )
    } else {
        None
    };

    match exporter {
        Some(Ok(exporter)) => {
            let tracer_provider = SdkTracerProvider::builder()
                .with_batch_exporter(exporter)
                .with_resource(
                    opentelemetry_sdk::Resource::builder()
                        .with_service_name(config.service_name.clone())
                        .build(),
                )
                .build();
            let tracer = tracer_provider.tracer(config.service_name.clone());

            tracing_subscriber::registry()
                .with(env_filter())
                .with(fmt_layer)
                .with(tracing_opentelemetry::layer().with_tracer(tracer))
                .init();

            tracing::info!(endpoint = %config.otlp_endpoint, "OTLP trace export enabled");
            TelemetryGuard {
                tracer_provider: Some(tracer_provider),
            }
        }
        other => {
            tracing_subscriber::registry()
                .with(env_filter())
                .with(fmt_layer)
                .init();

            if let Some(Err(e)) = other {
                tracing::warn!(error = %e, "OTLP exporter unavailable, logging only");
            }
            TelemetryGuard {
                tracer_provider: None,
            }
        }
    }
}

fn env_filter() -> EnvFilter {
    DEFAULT_DIRECTIVES
        .iter()
        .filter_map(|d| d.parse().ok())
        .fold(EnvFilter::from_default_env(), EnvFilter::add_directive)
}
