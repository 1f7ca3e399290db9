//! HTTP snapshot adapter.

use std::time::Duration;

use async_trait::async_trait;

use super::wire::parse_snapshot_body;
use crate::application::ports::{SnapshotError, SnapshotSource};
use crate::domain::instrument::InstrumentRecord;
use crate::infrastructure::config::ApiSettings;

/// Settings for [`HttpSnapshotSource`].
#[derive(Debug, Clone)]
pub struct HttpSnapshotSourceConfig {
    /// Full snapshot URL, without query string.
    pub url: String,
    /// `limit` query parameter.
    pub limit: u32,
    /// Request timeout.
    pub timeout: Duration,
}

impl From<&ApiSettings> for HttpSnapshotSourceConfig {
    fn from(api: &ApiSettings) -> Self {
        Self {
            url: api.snapshot_url(),
            limit: api.snapshot_limit,
            timeout: api.http_timeout,
        }
    }
}

/// Loads the company list over HTTP.
///
/// One GET per [`SnapshotSource::load`] call; no retries.
#[derive(Debug, Clone)]
pub struct HttpSnapshotSource {
    client: reqwest::Client,
    config: HttpSnapshotSourceConfig,
}

impl HttpSnapshotSource {
    /// Create a new snapshot source.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Transport`] if the HTTP client cannot be built.
    pub fn new(config: HttpSnapshotSourceConfig) -> Result<Self, SnapshotError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SnapshotError::Transport {
                message: e.to_string(),
            })?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl SnapshotSource for HttpSnapshotSource {
    async fn load(&self) -> Result<Vec<InstrumentRecord>, SnapshotError> {
        tracing::info!(url = %self.config.url, limit = self.config.limit, "Loading snapshot");

        let response = self
            .client
            .get(&self.config.url)
            .query(&[("limit", self.config.limit)])
            .send()
            .await
            .map_err(|e| SnapshotError::Transport {
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SnapshotError::Status {
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|e| SnapshotError::Transport {
            message: e.to_string(),
        })?;

        parse_snapshot_body(&body)
    }
}
