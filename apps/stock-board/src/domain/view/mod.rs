//! Board View Model
//!
//! Holds the instrument book together with the user's view criteria and the
//! projection derived from them.
//!
//! The projection is a list of indices into [`InstrumentBook::records`]. It is
//! recomputed in full whenever the book or the criteria change:
//!
//! 1. market filter (unless `All`)
//! 2. search term against name or code, case-insensitive
//! 3. stable sort on the sort key; descending reverses the comparison only

use std::cmp::Ordering;
use std::str::FromStr;

use crate::domain::instrument::{
    InstrumentBook, InstrumentRecord, Market, MergeOutcome, PriceDelta,
};
use crate::domain::window::{VirtualRow, VisibleWindow, WindowRequest, compute_window};

// =============================================================================
// View Criteria
// =============================================================================

/// Market filter applied before searching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MarketFilter {
    /// Every market.
    #[default]
    All,
    /// Only one market.
    Only(Market),
}

impl MarketFilter {
    /// Check whether a record passes the filter.
    #[must_use]
    pub fn matches(&self, record: &InstrumentRecord) -> bool {
        match self {
            Self::All => true,
            Self::Only(market) => record.market == *market,
        }
    }

    /// Parse a filter name; anything unrecognised means `All`.
    #[must_use]
    pub fn from_str_lenient(s: &str) -> Self {
        Market::from_str(s).map_or(Self::All, Self::Only)
    }
}

/// Field the projection is ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    /// Stock code, lexicographic.
    Code,
    /// Display name, lexicographic.
    Name,
    /// Current price, numeric.
    CurrentPrice,
    /// Change rate, numeric.
    ChangeRate,
    /// Volume, numeric.
    Volume,
    /// Market capitalisation, numeric. Records without one sort lowest.
    #[default]
    MarketCap,
}

impl SortKey {
    /// Parse a sort key name (`code`, `name`, `price`, `change_rate`, `volume`,
    /// `market_cap`, and their camelCase spellings).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('_', "").as_str() {
            "code" => Some(Self::Code),
            "name" => Some(Self::Name),
            "price" | "currentprice" => Some(Self::CurrentPrice),
            "changerate" | "change" => Some(Self::ChangeRate),
            "volume" => Some(Self::Volume),
            "marketcap" => Some(Self::MarketCap),
            _ => None,
        }
    }

    fn compare(self, a: &InstrumentRecord, b: &InstrumentRecord) -> Ordering {
        match self {
            Self::Code => a.code.cmp(&b.code),
            Self::Name => a.name.cmp(&b.name),
            Self::CurrentPrice => a.current_price.cmp(&b.current_price),
            Self::ChangeRate => a.change_rate.cmp(&b.change_rate),
            Self::Volume => a.volume.cmp(&b.volume),
            Self::MarketCap => a.market_cap.cmp(&b.market_cap),
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    /// Smallest first.
    Ascending,
    /// Largest first.
    #[default]
    Descending,
}

impl SortDirection {
    /// Parse `asc`/`ascending` or `desc`/`descending`.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "asc" | "ascending" => Some(Self::Ascending),
            "desc" | "descending" => Some(Self::Descending),
            _ => None,
        }
    }
}

/// Sort key plus direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SortSpec {
    /// Field to order by.
    pub key: SortKey,
    /// Direction.
    pub direction: SortDirection,
}

impl SortSpec {
    /// Create a sort spec.
    #[must_use]
    pub const fn new(key: SortKey, direction: SortDirection) -> Self {
        Self { key, direction }
    }

    fn compare(self, a: &InstrumentRecord, b: &InstrumentRecord) -> Ordering {
        let ordering = self.key.compare(a, b);
        match self.direction {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    }
}

/// Ephemeral view criteria.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewState {
    /// Committed (already debounced) search term.
    pub search_term: String,
    /// Market filter.
    pub market_filter: MarketFilter,
    /// Ordering.
    pub sort: SortSpec,
}

impl ViewState {
    /// Set the search term, trimming surrounding whitespace.
    #[must_use]
    pub fn with_search(mut self, term: &str) -> Self {
        self.search_term = term.trim().to_string();
        self
    }

    /// Set the market filter.
    #[must_use]
    pub const fn with_market(mut self, filter: MarketFilter) -> Self {
        self.market_filter = filter;
        self
    }

    /// Set the sort.
    #[must_use]
    pub const fn with_sort(mut self, sort: SortSpec) -> Self {
        self.sort = sort;
        self
    }
}

/// Case-insensitive substring match against name or code. `needle` is
/// already lowercased; empty matches everything.
fn matches_search(record: &InstrumentRecord, needle: &str) -> bool {
    needle.is_empty()
        || record.name.to_lowercase().contains(needle)
        || record.code.to_lowercase().contains(needle)
}

// =============================================================================
// Projection
// =============================================================================

/// Compute the ordered projection of `records` under `state`.
///
/// Returns indices into `records`. Pure; equal sort keys keep input order.
#[must_use]
pub fn compute_projection(records: &[InstrumentRecord], state: &ViewState) -> Vec<usize> {
    let needle = state.search_term.to_lowercase();
    let mut projection: Vec<usize> = records
        .iter()
        .enumerate()
        .filter(|(_, r)| state.market_filter.matches(r) && matches_search(r, &needle))
        .map(|(i, _)| i)
        .collect();

    // `sort_by` is stable.
    projection.sort_by(|&a, &b| state.sort.compare(&records[a], &records[b]));
    projection
}

// =============================================================================
// View Model
// =============================================================================

/// Backing collection, criteria and derived projection for one board view.
#[derive(Debug, Default)]
pub struct ViewModel {
    book: InstrumentBook,
    state: ViewState,
    projection: Vec<usize>,
}

impl ViewModel {
    /// Create an empty view model with default criteria.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a view model with the given criteria.
    #[must_use]
    pub fn with_state(state: ViewState) -> Self {
        Self {
            state,
            ..Self::default()
        }
    }

    /// Replace the backing collection with a snapshot.
    pub fn load_snapshot(&mut self, snapshot: Vec<InstrumentRecord>) {
        self.book = InstrumentBook::from_snapshot(snapshot);
        self.recompute();
    }

    /// Merge a delta; recomputes the projection when something changed.
    pub fn apply_delta(&mut self, delta: &PriceDelta) -> MergeOutcome {
        let outcome = self.book.apply(delta);
        if outcome == MergeOutcome::Applied {
            self.recompute();
        }
        outcome
    }

    /// Set the committed search term.
    pub fn set_search_term(&mut self, term: &str) {
        let trimmed = term.trim();
        if self.state.search_term != trimmed {
            self.state.search_term = trimmed.to_string();
            self.recompute();
        }
    }

    /// Set the market filter.
    pub fn set_market_filter(&mut self, filter: MarketFilter) {
        if self.state.market_filter != filter {
            self.state.market_filter = filter;
            self.recompute();
        }
    }

    /// Set the sort.
    pub fn set_sort(&mut self, sort: SortSpec) {
        if self.state.sort != sort {
            self.state.sort = sort;
            self.recompute();
        }
    }

    /// Current criteria.
    #[must_use]
    pub const fn state(&self) -> &ViewState {
        &self.state
    }

    /// Backing collection.
    #[must_use]
    pub const fn book(&self) -> &InstrumentBook {
        &self.book
    }

    /// Projection as indices into the book.
    #[must_use]
    pub fn projection_indices(&self) -> &[usize] {
        &self.projection
    }

    /// Projection as record references, in order.
    pub fn projection(&self) -> impl Iterator<Item = &InstrumentRecord> {
        self.projection.iter().map(|&i| &self.book.records()[i])
    }

    /// Number of rows in the projection.
    #[must_use]
    pub fn projection_len(&self) -> usize {
        self.projection.len()
    }

    /// Rows of the projection materialized for a viewport.
    #[must_use]
    pub fn window(&self, request: &WindowRequest) -> Vec<(VirtualRow, &InstrumentRecord)> {
        let window = compute_window(self.projection.len(), request);
        self.materialize(&window)
    }

    /// Pair each row of a computed window with its record.
    #[must_use]
    pub fn materialize(
        &self,
        window: &VisibleWindow,
    ) -> Vec<(VirtualRow, &InstrumentRecord)> {
        window
            .rows
            .iter()
            .filter_map(|row| {
                self.projection
                    .get(row.index)
                    .map(|&i| (*row, &self.book.records()[i]))
            })
            .collect()
    }

    fn recompute(&mut self) {
        self.projection = compute_projection(self.book.records(), &self.state);
    }
}

// =============================================================================
// Tests
// =============================================================================
