//! Market Clock Port
//!
//! Source of "now" for the trading-session gate.

use chrono::{DateTime, Utc};

/// Supplies the current instant.
pub trait MarketClock: Send + Sync {
    /// Current UTC instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl MarketClock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock frozen at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl MarketClock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
