//! Viewport Windowing
//!
//! Decides which rows of a projection must be materialized for a scroll
//! viewport. Only the rows intersecting the viewport plus `overscan` rows on
//! each side are produced; each carries its absolute pixel offset so a
//! renderer can position it inside a container of `total_height`.
//!
//! Everything here is a pure function of its inputs.

use std::collections::HashMap;
use std::ops::RangeInclusive;

/// Smallest size a row may occupy, in pixels.
const MIN_ROW_SIZE: f64 = 1.0;

// =============================================================================
// Inputs
// =============================================================================

/// How row heights are known.
#[derive(Debug, Clone, PartialEq)]
pub enum RowSizing {
    /// Every row has the same estimated height.
    Fixed(f64),
    /// Rows measured after render; unmeasured rows fall back to `estimate`.
    Measured {
        /// Height used for rows without a measurement.
        estimate: f64,
        /// Measured height by projection index.
        sizes: HashMap<usize, f64>,
    },
}

impl RowSizing {
    fn size_of(&self, index: usize) -> f64 {
        let raw = match self {
            Self::Fixed(height) => *height,
            Self::Measured { estimate, sizes } => sizes.get(&index).copied().unwrap_or(*estimate),
        };
        sanitize_size(raw)
    }
}

/// Viewport description for one window computation.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowRequest {
    /// Row heights.
    pub sizing: RowSizing,
    /// Visible height of the scroll container, in pixels.
    pub viewport_height: f64,
    /// Current scroll offset, in pixels.
    pub scroll_offset: f64,
    /// Extra rows rendered on each side of the visible range.
    pub overscan: usize,
}

impl WindowRequest {
    /// Request with a fixed row height.
    #[must_use]
    pub const fn fixed(
        row_height: f64,
        viewport_height: f64,
        scroll_offset: f64,
        overscan: usize,
    ) -> Self {
        Self {
            sizing: RowSizing::Fixed(row_height),
            viewport_height,
            scroll_offset,
            overscan,
        }
    }

    /// Same request scrolled to `offset`.
    #[must_use]
    pub fn scrolled_to(mut self, offset: f64) -> Self {
        self.scroll_offset = offset;
        self
    }
}

// =============================================================================
// Output
// =============================================================================

/// One materialized row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VirtualRow {
    /// Position in the projection.
    pub index: usize,
    /// Absolute pixel offset from the top of the content.
    pub offset: f64,
    /// Row height in pixels.
    pub size: f64,
}

/// Rows to render for a viewport.
#[derive(Debug, Clone, PartialEq)]
pub struct VisibleWindow {
    /// Inclusive range of projection indices, `None` for an empty projection.
    pub range: Option<RangeInclusive<usize>>,
    /// Height of the whole content.
    pub total_height: f64,
    /// Materialized rows, in index order.
    pub rows: Vec<VirtualRow>,
}

impl VisibleWindow {
    /// Window over nothing.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            range: None,
            total_height: 0.0,
            rows: Vec::new(),
        }
    }

    /// First materialized index.
    #[must_use]
    pub fn start(&self) -> Option<usize> {
        self.range.as_ref().map(|r| *r.start())
    }

    /// Last materialized index (inclusive).
    #[must_use]
    pub fn end(&self) -> Option<usize> {
        self.range.as_ref().map(|r| *r.end())
    }

    /// True when nothing is materialized.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// =============================================================================
// Computation
// =============================================================================

/// Compute the window of a projection with `count` rows.
#[must_use]
pub fn compute_window(count: usize, request: &WindowRequest) -> VisibleWindow {
    if count == 0 {
        return VisibleWindow::empty();
    }

    let offsets = row_offsets(count, &request.sizing);
    let total_height = offsets[count - 1] + request.sizing.size_of(count - 1);

    let viewport = sanitize(request.viewport_height);
    let max_scroll = (total_height - viewport).max(0.0);
    let scroll = sanitize(request.scroll_offset).min(max_scroll);
    let bottom = scroll + viewport;

    // First row whose bottom edge lies below the scroll offset.
    let first_visible = offsets
        .partition_point(|&top| top <= scroll)
        .saturating_sub(1)
        .min(count - 1);
    // Last row whose top edge lies above the viewport bottom.
    let last_visible = offsets
        .partition_point(|&top| top < bottom)
        .saturating_sub(1)
        .clamp(first_visible, count - 1);

    let start = first_visible.saturating_sub(request.overscan);
    let end = last_visible.saturating_add(request.overscan).min(count - 1);

    let rows = (start..=end)
        .map(|index| VirtualRow {
            index,
            offset: offsets[index],
            size: request.sizing.size_of(index),
        })
        .collect();

    VisibleWindow {
        range: Some(start..=end),
        total_height,
        rows,
    }
}

/// Absolute top offset of every row.
#[allow(clippy::cast_precision_loss)]
fn row_offsets(count: usize, sizing: &RowSizing) -> Vec<f64> {
    match sizing {
        RowSizing::Fixed(_) => {
            let size = sizing.size_of(0);
            (0..count).map(|i| i as f64 * size).collect()
        }
        RowSizing::Measured { .. } => {
            let mut offsets = Vec::with_capacity(count);
            let mut running = 0.0;
            for index in 0..count {
                offsets.push(running);
                running += sizing.size_of(index);
            }
            offsets
        }
    }
}

fn sanitize(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 { value } else { 0.0 }
}

fn sanitize_size(value: f64) -> f64 {
    if value.is_finite() && value >= MIN_ROW_SIZE {
        value
    } else {
        MIN_ROW_SIZE
    }
}

// =============================================================================
// Tests
// =============================================================================
