//! Market Gate Watcher
//!
//! Periodically re-checks the market-hours gate for a long-lived session so a
//! board mounted outside trading hours goes live when the market opens.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::session::BoardSession;
use crate::application::ports::MarketClock;

/// Default interval between gate checks.
pub const DEFAULT_GATE_CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// Check the gate every `period` until `cancel` fires or the session is
/// unmounted.
pub async fn run_market_gate(
    session: Arc<BoardSession>,
    clock: Arc<dyn MarketClock>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(period.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {
                if !session.is_mounted() {
                    break;
                }
                session.observe_market(clock.now());
            }
        }
    }

    tracing::debug!("Market gate watcher stopped");
}
