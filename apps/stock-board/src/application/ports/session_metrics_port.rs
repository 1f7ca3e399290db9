//! Session Metrics Port (Driven Port)
//!
//! Outcomes the board session reports while it runs. The Prometheus adapter
//! lives in infrastructure; sessions without one use [`NoopMetrics`].

use std::time::Duration;

use crate::domain::instrument::MergeOutcome;

/// How a snapshot load ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Snapshot applied.
    Success,
    /// Source returned an error.
    Failure,
    /// Result arrived after unmount or a newer reload and was dropped.
    Discarded,
}

/// Sink for session outcomes.
pub trait SessionMetrics: Send + Sync + std::fmt::Debug {
    /// A snapshot load finished.
    fn snapshot_load(&self, outcome: LoadOutcome);

    /// Instruments now on the board.
    fn instruments(&self, count: usize);

    /// A delta was merged or dropped.
    fn delta(&self, outcome: MergeOutcome);

    /// A view mutation, including its projection recompute, took `elapsed`.
    fn projection(&self, elapsed: Duration);
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl SessionMetrics for NoopMetrics {
    fn snapshot_load(&self, _outcome: LoadOutcome) {}

    fn instruments(&self, _count: usize) {}

    fn delta(&self, _outcome: MergeOutcome) {}

    fn projection(&self, _elapsed: Duration) {}
}
