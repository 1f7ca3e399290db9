//! Prometheus Metrics
//!
//! Board metrics exposed in Prometheus text format at `/metrics`.
//!
//! - `stock_board_snapshot_loads_total{outcome}`
//! - `stock_board_instruments`
//! - `stock_board_deltas_total{outcome}`
//! - `stock_board_malformed_messages_total`
//! - `stock_board_stream_connections_total{outcome}`
//! - `stock_board_projection_seconds`
//!
//! [`PrometheusSessionMetrics`] is the session's
//! [`SessionMetrics`](crate::application::ports::SessionMetrics) adapter.
//! Recording before [`init_metrics`] is a no-op.

use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

use crate::application::ports::{LoadOutcome, SessionMetrics};
use crate::domain::instrument::MergeOutcome;

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder, once per process.
///
/// # Errors
///
/// Returns an error if another global recorder is already installed.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    describe_metrics();
    Ok(PROMETHEUS_HANDLE.get_or_init(|| handle).clone())
}

/// Prometheus handle, if metrics were initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

fn describe_metrics() {
    describe_counter!(
        "stock_board_snapshot_loads_total",
        "Snapshot load attempts by outcome"
    );
    describe_gauge!(
        "stock_board_instruments",
        "Instruments in the loaded snapshot"
    );
    describe_counter!(
        "stock_board_deltas_total",
        "Price deltas received, by merge outcome"
    );
    describe_counter!(
        "stock_board_malformed_messages_total",
        "Realtime frames or messages that could not be decoded"
    );
    describe_counter!(
        "stock_board_stream_connections_total",
        "Realtime stream connection attempts by outcome"
    );
    describe_histogram!(
        "stock_board_projection_seconds",
        "Time spent recomputing the board projection"
    );
}

// =============================================================================
// Labels
// =============================================================================

/// Outcome label for stream connection attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Succeeded.
    Success,
    /// Failed.
    Failure,
}

impl Outcome {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }
}

const fn load_label(outcome: LoadOutcome) -> &'static str {
    match outcome {
        LoadOutcome::Success => "success",
        LoadOutcome::Failure => "failure",
        LoadOutcome::Discarded => "discarded",
    }
}

const fn merge_label(outcome: MergeOutcome) -> &'static str {
    match outcome {
        MergeOutcome::Applied => "applied",
        MergeOutcome::UnknownCode => "unknown_code",
    }
}

// =============================================================================
// Recording
// =============================================================================

/// Record a snapshot load attempt.
pub fn record_snapshot_load(outcome: LoadOutcome) {
    counter!("stock_board_snapshot_loads_total", "outcome" => load_label(outcome)).increment(1);
}

/// Set the loaded instrument count.
#[allow(clippy::cast_precision_loss)]
pub fn set_instruments(count: usize) {
    gauge!("stock_board_instruments").set(count as f64);
}

/// Record a delta merge.
pub fn record_delta(outcome: MergeOutcome) {
    counter!("stock_board_deltas_total", "outcome" => merge_label(outcome)).increment(1);
}

/// Record a frame, or one message inside a frame, the codec rejected.
pub fn record_malformed_message() {
    counter!("stock_board_malformed_messages_total").increment(1);
}

/// Record a stream connection attempt.
pub fn record_stream_connection(outcome: Outcome) {
    counter!("stock_board_stream_connections_total", "outcome" => outcome.as_str())
        .increment(1);
}

/// Record one projection recompute.
pub fn record_projection_duration(duration: Duration) {
    histogram!("stock_board_projection_seconds").record(duration.as_secs_f64());
}

// =============================================================================
// Session Adapter
// =============================================================================

/// Records session outcomes into the Prometheus recorder.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrometheusSessionMetrics;

impl SessionMetrics for PrometheusSessionMetrics {
    fn snapshot_load(&self, outcome: LoadOutcome) {
        record_snapshot_load(outcome);
    }

    fn instruments(&self, count: usize) {
        set_instruments(count);
    }

    fn delta(&self, outcome: MergeOutcome) {
        record_delta(outcome);
    }

    fn projection(&self, elapsed: Duration) {
        record_projection_duration(elapsed);
    }
}
