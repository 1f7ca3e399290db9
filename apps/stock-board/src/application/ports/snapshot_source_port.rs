//! Snapshot Source Port (Driven Port)
//!
//! Loads the full instrument list once per request.

use async_trait::async_trait;

use crate::domain::instrument::InstrumentRecord;

/// Snapshot load error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SnapshotError {
    /// Request could not be sent or the response not read.
    #[error("snapshot transport error: {message}")]
    Transport {
        /// Error details.
        message: String,
    },

    /// Server answered with a non-success status.
    #[error("snapshot request failed with HTTP {status}")]
    Status {
        /// HTTP status code.
        status: u16,
    },

    /// Body was not a record array or a successful envelope.
    #[error("invalid snapshot body: {message}")]
    InvalidBody {
        /// Error details.
        message: String,
    },

    /// Backend reported a failure in its envelope.
    #[error("snapshot backend error: {message}")]
    Backend {
        /// Message from the backend.
        message: String,
    },
}

/// Port for loading the instrument snapshot.
///
/// Implementations perform exactly one request per call and never retry.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Load every listed instrument.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError`] if the request fails or the body is unusable.
    async fn load(&self) -> Result<Vec<InstrumentRecord>, SnapshotError>;
}
