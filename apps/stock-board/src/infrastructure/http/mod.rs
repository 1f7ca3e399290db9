//! Board HTTP Server
//!
//! Serves the live board alongside health checks and Prometheus metrics.
//!
//! # Endpoints
//!
//! - `GET /api/stocks` - windowed board view, criteria from the query string
//! - `GET /health` - JSON health status
//! - `GET /healthz` - liveness (simple OK)
//! - `GET /readyz` - readiness (snapshot loaded)
//! - `GET /metrics` - Prometheus metrics in text format

mod server;

pub use server::{
    BoardServer, BoardServerState, HealthResponse, HealthStatus, HttpServerError, StocksQuery,
    router,
};
