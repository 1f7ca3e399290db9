//! Domain Layer - Instrument book, board projection and viewport windowing.
//!
//! Pure types and functions with no I/O. Everything the board shows is
//! derived here from a snapshot plus a sequence of price deltas.

/// Instrument records, price deltas and the merge-only book.
pub mod instrument;

/// KRX regular-session gate.
pub mod market_hours;

/// Filter, search and sort criteria and the derived projection.
pub mod view;

/// Viewport windowing over a projection.
pub mod window;
