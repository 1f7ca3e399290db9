//! Snapshot body decoding.
//!
//! Accepts a bare array of company rows or the `{success, data, error}`
//! envelope the company API wraps them in.

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::application::ports::SnapshotError;
use crate::domain::instrument::{InstrumentRecord, Market};

/// One company row as served by the company API.
#[derive(Debug, Deserialize)]
struct CompanyRow {
    code: String,
    name: String,
    market: String,
    #[serde(default, rename = "currentPrice", alias = "current_price")]
    current_price: Option<Decimal>,
    #[serde(default, rename = "changeRate", alias = "change_rate")]
    change_rate: Option<Decimal>,
    #[serde(default)]
    volume: Option<u64>,
    #[serde(default, alias = "marketCap")]
    market_cap: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SnapshotBody {
    Rows(Vec<serde_json::Value>),
    Envelope {
        success: bool,
        #[serde(default)]
        data: Option<Vec<serde_json::Value>>,
        #[serde(default)]
        error: Option<String>,
    },
}

/// Decode a snapshot response body.
///
/// Rows that fail to decode or name an unknown market are skipped with a
/// warning; the body as a whole must still be an array or a successful
/// envelope.
///
/// # Errors
///
/// Returns [`SnapshotError::InvalidBody`] for an unusable body and
/// [`SnapshotError::Backend`] for an envelope with `success: false`.
pub fn parse_snapshot_body(body: &str) -> Result<Vec<InstrumentRecord>, SnapshotError> {
    let parsed: SnapshotBody =
        serde_json::from_str(body).map_err(|e| SnapshotError::InvalidBody {
            message: e.to_string(),
        })?;

    let rows = match parsed {
        SnapshotBody::Rows(rows) => rows,
        SnapshotBody::Envelope {
            success: true,
            data: Some(rows),
            ..
        } => rows,
        SnapshotBody::Envelope {
            success: true,
            data: None,
            ..
        } => {
            return Err(SnapshotError::InvalidBody {
                message: "envelope without data".to_string(),
            });
        }
        SnapshotBody::Envelope {
            success: false,
            error,
            ..
        } => {
            return Err(SnapshotError::Backend {
                message: error.unwrap_or_else(|| "unknown error".to_string()),
            });
        }
    };

    let mut records = Vec::with_capacity(rows.len());
    for (position, value) in rows.into_iter().enumerate() {
        let row: CompanyRow = match serde_json::from_value(value) {
            Ok(row) => row,
            Err(e) => {
                tracing::warn!(position, error = %e, "Skipping malformed snapshot row");
                continue;
            }
        };

        let market: Market = match row.market.parse() {
            Ok(market) => market,
            Err(e) => {
                tracing::warn!(code = %row.code, error = %e, "Skipping snapshot row");
                continue;
            }
        };

        records.push(InstrumentRecord {
            code: row.code,
            name: row.name,
            market,
            current_price: row.current_price.unwrap_or_default(),
            change_rate: row.change_rate.unwrap_or_default(),
            volume: row.volume.unwrap_or_default(),
            market_cap: row.market_cap,
        });
    }

    Ok(records)
}
