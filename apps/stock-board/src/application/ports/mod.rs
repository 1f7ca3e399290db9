//! Application Ports (Driven)
//!
//! Interfaces the board session depends on. Infrastructure provides the
//! production adapters; tests substitute fakes.
//!
//! - `SnapshotSource`: one-shot load of the instrument list
//! - `PriceStream`: realtime price deltas for a mounted session
//! - `MarketClock`: the current instant, for the trading-session gate
//! - `SessionMetrics`: outcomes reported by a running session

mod market_clock_port;
mod price_stream_port;
mod session_metrics_port;
mod snapshot_source_port;

pub use market_clock_port::{FixedClock, MarketClock, SystemClock};
pub use price_stream_port::{PriceStream, StreamEvent};
pub use session_metrics_port::{LoadOutcome, NoopMetrics, SessionMetrics};
pub use snapshot_source_port::{SnapshotError, SnapshotSource};

#[cfg(test)]
pub use snapshot_source_port::MockSnapshotSource;
