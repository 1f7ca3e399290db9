//! Instrument Records
//!
//! Domain types for listed instruments and the keyed collection that holds
//! them for the lifetime of a board session.
//!
//! # Design
//!
//! The [`InstrumentBook`] is populated once from a snapshot. After that its
//! key set is frozen: a [`PriceDelta`] can only overwrite fields of a record
//! that already exists. Deltas for unknown codes are discarded.
//!
//! Merging is field-level last-write-wins. There is no sequence or timestamp
//! comparison, so a late stale delta overwrites a newer value.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Serialize;

// =============================================================================
// Market
// =============================================================================

/// Listing venue of an instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Market {
    /// KOSPI main board.
    Kospi,
    /// KOSDAQ board.
    Kosdaq,
}

impl Market {
    /// Get the wire name of the market.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Kospi => "KOSPI",
            Self::Kosdaq => "KOSDAQ",
        }
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a market name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown market: {0}")]
pub struct UnknownMarket(pub String);

impl FromStr for Market {
    type Err = UnknownMarket;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "KOSPI" => Ok(Self::Kospi),
            "KOSDAQ" => Ok(Self::Kosdaq),
            other => Err(UnknownMarket(other.to_string())),
        }
    }
}

// =============================================================================
// Instrument Record
// =============================================================================

/// One tradable instrument.
///
/// `code`, `name`, `market` and `market_cap` are fixed at snapshot load.
/// Price fields are overwritten by deltas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstrumentRecord {
    /// Stock code, unique within a snapshot.
    pub code: String,
    /// Display name.
    pub name: String,
    /// Listing venue.
    pub market: Market,
    /// Last traded price.
    pub current_price: Decimal,
    /// Change versus previous close, in percent.
    pub change_rate: Decimal,
    /// Accumulated volume.
    pub volume: u64,
    /// Market capitalisation, when the snapshot carries it.
    pub market_cap: Option<u64>,
}

impl InstrumentRecord {
    /// Return a copy of this record with the fields present in `delta` applied.
    ///
    /// The delta's code is not checked here; [`InstrumentBook::apply`] routes
    /// deltas by code.
    #[must_use]
    pub fn merged_with(&self, delta: &PriceDelta) -> Self {
        Self {
            current_price: delta.current_price.unwrap_or(self.current_price),
            change_rate: delta.change_rate.unwrap_or(self.change_rate),
            volume: delta.volume.unwrap_or(self.volume),
            ..self.clone()
        }
    }
}

// =============================================================================
// Price Delta
// =============================================================================

/// Partial update to one existing record.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PriceDelta {
    /// Code of the record to update.
    pub code: String,
    /// New price, if present.
    pub current_price: Option<Decimal>,
    /// New change rate, if present.
    pub change_rate: Option<Decimal>,
    /// New volume, if present.
    pub volume: Option<u64>,
}

impl PriceDelta {
    /// Create an empty delta for a code.
    #[must_use]
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            ..Self::default()
        }
    }

    /// Set the price.
    #[must_use]
    pub const fn with_price(mut self, price: Decimal) -> Self {
        self.current_price = Some(price);
        self
    }

    /// Set the change rate.
    #[must_use]
    pub const fn with_change_rate(mut self, rate: Decimal) -> Self {
        self.change_rate = Some(rate);
        self
    }

    /// Set the volume.
    #[must_use]
    pub const fn with_volume(mut self, volume: u64) -> Self {
        self.volume = Some(volume);
        self
    }
}

/// Result of applying a delta to the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The record existed and was replaced by its merged copy.
    Applied,
    /// No record has this code; nothing changed.
    UnknownCode,
}

// =============================================================================
// Instrument Book
// =============================================================================

/// Keyed collection of instruments in snapshot order.
///
/// Records are stored in a `Vec` so projections can refer to them by index;
/// the `index` map resolves codes to positions.
#[derive(Debug, Default, Clone)]
pub struct InstrumentBook {
    records: Vec<InstrumentRecord>,
    index: HashMap<String, usize>,
}

impl InstrumentBook {
    /// Build a book from snapshot records.
    ///
    /// Snapshot order is kept. When a code repeats, the first record wins.
    #[must_use]
    pub fn from_snapshot(snapshot: Vec<InstrumentRecord>) -> Self {
        let mut records = Vec::with_capacity(snapshot.len());
        let mut index = HashMap::with_capacity(snapshot.len());

        for record in snapshot {
            if index.contains_key(&record.code) {
                tracing::warn!(code = %record.code, "Duplicate code in snapshot, keeping first");
                continue;
            }
            index.insert(record.code.clone(), records.len());
            records.push(record);
        }

        Self { records, index }
    }

    /// Merge a delta into the matching record.
    pub fn apply(&mut self, delta: &PriceDelta) -> MergeOutcome {
        let Some(&position) = self.index.get(&delta.code) else {
            return MergeOutcome::UnknownCode;
        };

        let merged = self.records[position].merged_with(delta);
        self.records[position] = merged;
        MergeOutcome::Applied
    }

    /// Look up a record by code.
    #[must_use]
    pub fn get(&self, code: &str) -> Option<&InstrumentRecord> {
        self.index.get(code).map(|&i| &self.records[i])
    }

    /// All records in snapshot order.
    #[must_use]
    pub fn records(&self) -> &[InstrumentRecord] {
        &self.records
    }

    /// Check whether a code is known.
    #[must_use]
    pub fn contains(&self, code: &str) -> bool {
        self.index.contains_key(code)
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if the book has no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate over the codes in snapshot order.
    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.code.as_str())
    }
}

// =============================================================================
// Tests
// =============================================================================
