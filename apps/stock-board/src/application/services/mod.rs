//! Application Services
//!
//! - `BoardSession`: one mounted board and its background tasks
//! - `Debouncer`: trailing-edge debouncing for search input
//! - `run_market_gate`: re-checks market hours for a long-lived session

mod debounce;
mod market_gate;
mod session;

pub use debounce::{DEFAULT_QUIET_PERIOD, Debouncer, run_debounced};
pub use market_gate::{DEFAULT_GATE_CHECK_INTERVAL, run_market_gate};
pub use session::{BoardRow, BoardSession, BoardWindow, LoadState, SessionConfig, StreamStatus};
