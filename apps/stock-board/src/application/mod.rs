//! Application Layer - Board session and port definitions.
//!
//! Orchestrates the domain against the snapshot source, the realtime stream
//! and the clock, all reached through ports.

/// Port interfaces for the snapshot source, price stream and clock.
pub mod ports;

/// Board session lifecycle and search debouncing.
pub mod services;
