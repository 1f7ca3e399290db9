//! Infrastructure Layer - Adapters and external integrations.
//!
//! Concrete implementations of the application ports, plus the HTTP surface
//! and process-wide observability.

/// Environment configuration.
pub mod config;

/// Board HTTP endpoints, health checks and metrics scrape.
pub mod http;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// WebSocket realtime price stream.
pub mod realtime;

/// HTTP company-list snapshot loader.
pub mod snapshot;

/// Logging and OpenTelemetry tracing.
pub mod telemetry;
