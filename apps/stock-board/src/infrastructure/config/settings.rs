//! Board Configuration Settings
//!
//! Configuration for the stock board, loaded from environment variables.
//! Unparseable optional values fall back to their defaults.

use std::time::Duration;

use reqwest::Url;

use crate::application::services::DEFAULT_GATE_CHECK_INTERVAL;

/// Path of the realtime price WebSocket endpoint.
pub const REALTIME_PATH: &str = "/ws/realtime-price";

/// Upstream API settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiSettings {
    /// Base URL of the snapshot API, without trailing slash.
    pub snapshot_base_url: String,
    /// Full WebSocket URL of the realtime stream.
    pub realtime_url: String,
    /// Snapshot endpoint path.
    pub snapshot_path: String,
    /// `limit` query parameter sent with the snapshot request.
    pub snapshot_limit: u32,
    /// Snapshot request timeout.
    pub http_timeout: Duration,
}

impl ApiSettings {
    /// Full snapshot URL, without the query string.
    #[must_use]
    pub fn snapshot_url(&self) -> String {
        format!("{}{}", self.snapshot_base_url, self.snapshot_path)
    }
}

/// Realtime stream settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSettings {
    /// Capacity of the event channel between the stream and the session.
    pub event_capacity: usize,
    /// How often the market-hours gate is re-checked.
    pub gate_check_interval: Duration,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            event_capacity: 1024,
            gate_check_interval: DEFAULT_GATE_CHECK_INTERVAL,
        }
    }
}

/// Board view defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewSettings {
    /// Estimated row height in pixels.
    pub row_height: f64,
    /// Rows rendered beyond each edge of the viewport.
    pub overscan: usize,
    /// Viewport height used when a request does not give one.
    pub viewport_height: f64,
    /// Quiet period for search input.
    pub search_debounce: Duration,
}

impl Default for ViewSettings {
    fn default() -> Self {
        Self {
            row_height: 52.0,
            overscan: 10,
            viewport_height: 520.0,
            search_debounce: Duration::from_millis(300),
        }
    }
}

/// Server port settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    /// HTTP port for the board API, health and metrics.
    pub http_port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { http_port: 8083 }
    }
}

/// Complete board configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct BoardConfig {
    /// Upstream API settings.
    pub api: ApiSettings,
    /// Realtime stream settings.
    pub stream: StreamSettings,
    /// View defaults.
    pub view: ViewSettings,
    /// Server settings.
    pub server: ServerSettings,
}

impl BoardConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if `STOCK_API_URL` is missing or either base URL is
    /// not an http(s)/ws(s) URL.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// See [`BoardConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let snapshot_base = lookup("STOCK_API_URL")
            .ok_or_else(|| ConfigError::MissingEnvVar("STOCK_API_URL".to_string()))?;
        let snapshot_base = snapshot_base.trim();
        if snapshot_base.is_empty() {
            return Err(ConfigError::EmptyValue("STOCK_API_URL".to_string()));
        }
        let snapshot_base_url = http_base_url("STOCK_API_URL", snapshot_base)?;

        let realtime_base = lookup("REALTIME_API_URL")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
        let realtime_url = match realtime_base {
            Some(base) => derive_realtime_url("REALTIME_API_URL", &base)?,
            None => derive_realtime_url("STOCK_API_URL", snapshot_base)?,
        };

        let view_defaults = ViewSettings::default();

        Ok(Self {
            api: ApiSettings {
                snapshot_base_url,
                realtime_url,
                snapshot_path: normalize_path(
                    lookup("STOCK_BOARD_SNAPSHOT_PATH").as_deref(),
                    "/api/all-companies",
                ),
                snapshot_limit: parse_or(&lookup, "STOCK_BOARD_SNAPSHOT_LIMIT", 1500),
                http_timeout: Duration::from_secs(parse_or(
                    &lookup,
                    "STOCK_BOARD_HTTP_TIMEOUT_SECS",
                    10,
                )),
            },
            stream: StreamSettings {
                event_capacity: parse_or(
                    &lookup,
                    "STOCK_BOARD_EVENT_CAPACITY",
                    StreamSettings::default().event_capacity,
                ),
                gate_check_interval: lookup("STOCK_BOARD_GATE_CHECK_SECS")
                    .and_then(|v| v.trim().parse::<u64>().ok())
                    .filter(|secs| *secs > 0)
                    .map_or(StreamSettings::default().gate_check_interval, Duration::from_secs),
            },
            view: ViewSettings {
                row_height: parse_or(&lookup, "STOCK_BOARD_ROW_HEIGHT", view_defaults.row_height),
                overscan: parse_or(&lookup, "STOCK_BOARD_OVERSCAN", view_defaults.overscan),
                viewport_height: parse_or(
                    &lookup,
                    "STOCK_BOARD_VIEWPORT_HEIGHT",
                    view_defaults.viewport_height,
                ),
                search_debounce: lookup("STOCK_BOARD_SEARCH_DEBOUNCE_MS")
                    .and_then(|v| v.trim().parse::<u64>().ok())
                    .map_or(view_defaults.search_debounce, Duration::from_millis),
            },
            server: ServerSettings {
                http_port: parse_or(
                    &lookup,
                    "STOCK_BOARD_HTTP_PORT",
                    ServerSettings::default().http_port,
                ),
            },
        })
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
    /// Value is not a usable URL.
    #[error("environment variable {key} is not a valid URL: {value}")]
    InvalidUrl {
        /// Variable name.
        key: String,
        /// Offending value.
        value: String,
    },
}

/// Derive the realtime WebSocket URL from an API base URL.
///
/// `http` becomes `ws`, `https` becomes `wss`; `ws`/`wss` are kept.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidUrl`] for any other scheme or an unparseable
/// URL.
pub fn derive_realtime_url(key: &str, base: &str) -> Result<String, ConfigError> {
    let invalid = || ConfigError::InvalidUrl {
        key: key.to_string(),
        value: base.to_string(),
    };

    let mut url = Url::parse(base.trim()).map_err(|_| invalid())?;
    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        _ => return Err(invalid()),
    };
    url.set_scheme(scheme).map_err(|()| invalid())?;

    Ok(format!("{}{REALTIME_PATH}", url.as_str().trim_end_matches('/')))
}

fn http_base_url(key: &str, base: &str) -> Result<String, ConfigError> {
    match Url::parse(base) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {
            Ok(base.trim_end_matches('/').to_string())
        }
        _ => Err(ConfigError::InvalidUrl {
            key: key.to_string(),
            value: base.to_string(),
        }),
    }
}

fn normalize_path(value: Option<&str>, default: &str) -> String {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(path) if path.starts_with('/') => path.to_string(),
        Some(path) => format!("/{path}"),
        None => default.to_string(),
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
