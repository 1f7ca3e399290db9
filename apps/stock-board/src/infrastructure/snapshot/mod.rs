//! Snapshot Loader
//!
//! HTTP adapter for the [`SnapshotSource`](crate::application::ports::SnapshotSource)
//! port: a single GET of the company list.

mod http;
mod wire;

pub use http::{HttpSnapshotSource, HttpSnapshotSourceConfig};
pub use wire::parse_snapshot_body;
