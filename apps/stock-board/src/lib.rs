#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::needless_collect,
        clippy::option_if_let_else,
        clippy::default_trait_access,
        clippy::items_after_statements,
        clippy::or_fun_call
    )
)]

//! Stock Board - Live KRX Instrument Board
//!
//! Loads the full KOSPI/KOSDAQ company list once, keeps it current with
//! realtime price deltas while the regular session is open, and serves a
//! filtered, searched, sorted and windowed view of it.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Pure board logic
//!   - `instrument`: Records, price deltas and the merge-only book
//!   - `market_hours`: KRX regular-session gate
//!   - `view`: Filter, search, stable sort and projection
//!   - `window`: Viewport windowing over the projection
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: Snapshot source, price stream, market clock, session metrics
//!   - `services`: Board session lifecycle, market gate watcher, search debouncing
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `snapshot`: HTTP company-list loader
//!   - `realtime`: WebSocket price stream client
//!   - `http`: Board, health and metrics endpoints
//!   - `config`: Environment configuration
//!   - `metrics` / `telemetry`: Prometheus and tracing
//!
//! # Data Flow
//!
//! ```text
//! GET /api/all-companies ──► snapshot ──┐
//!                                       ├──► BoardSession ──► ViewModel ──► window ──► /api/stocks
//! WS /ws/realtime-price ──► deltas ─────┘   (gated by market hours)
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Board types and pure functions, no I/O.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::instrument::{InstrumentBook, InstrumentRecord, Market, MergeOutcome, PriceDelta};
pub use domain::market_hours::is_market_open;
pub use domain::view::{
    MarketFilter, SortDirection, SortKey, SortSpec, ViewModel, ViewState, compute_projection,
};
pub use domain::window::{RowSizing, VirtualRow, VisibleWindow, WindowRequest, compute_window};

// Session
pub use application::ports::{
    FixedClock, LoadOutcome, MarketClock, NoopMetrics, PriceStream, SessionMetrics, SnapshotError,
    SnapshotSource, StreamEvent, SystemClock,
};
pub use application::services::{
    BoardRow, BoardSession, BoardWindow, DEFAULT_GATE_CHECK_INTERVAL, LoadState, SessionConfig,
    StreamStatus, run_market_gate,
};

// Infrastructure config
pub use infrastructure::config::{BoardConfig, ConfigError};

// Adapters
pub use infrastructure::http::{BoardServer, BoardServerState, HttpServerError, router};
pub use infrastructure::realtime::{PriceStreamClient, PriceStreamClientConfig};
pub use infrastructure::snapshot::{HttpSnapshotSource, HttpSnapshotSourceConfig};

// Metrics
pub use infrastructure::metrics::{PrometheusSessionMetrics, init_metrics};

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
