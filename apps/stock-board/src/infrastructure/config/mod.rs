//! Configuration Module
//!
//! Environment-driven configuration for the board service.

mod settings;

pub use settings::{
    ApiSettings, BoardConfig, ConfigError, REALTIME_PATH, ServerSettings, StreamSettings,
    ViewSettings, derive_realtime_url,
};
