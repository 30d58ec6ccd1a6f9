//! Column sort with null handling and direction toggling.
//!
//! Values are compared numerically after [`to_comparable`]. Missing values
//! become [`MISSING_SENTINEL`] so they sort as very low instead of being
//! excluded. The sort is stable: rows with equal keys keep their previous
//! relative order in either direction.

use serde::Serialize;
use std::cmp::{Ordering, Reverse};
use tracing::debug;

use crate::record::{FieldValue, StockField, StockRecord};

/// Stand-in for a missing value during comparison.
pub const MISSING_SENTINEL: f64 = -999_999.0;

/// Comparable number for a field value.
///
/// - missing → `-999999`
/// - number → itself
/// - text → parsed as `f64`, `NaN` when it is not numeric
pub fn to_comparable(value: FieldValue<'_>) -> f64 {
    value.as_number().unwrap_or(MISSING_SENTINEL)
}

fn compare_numbers(a: f64, b: f64) -> Ordering {
    // total_cmp distinguishes -0.0 from 0.0; treat them as equal keys.
    let a = if a == 0.0 { 0.0 } else { a };
    let b = if b == 0.0 { 0.0 } else { b };
    a.total_cmp(&b)
}

// ============================================================================
// Sort State
// ============================================================================

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn toggled(self) -> Self {
        match self {
            Self::Ascending => Self::Descending,
            Self::Descending => Self::Ascending,
        }
    }

    /// Header marker for the active column.
    pub fn arrow(self) -> &'static str {
        match self {
            Self::Ascending => "▲",
            Self::Descending => "▼",
        }
    }
}

/// Which column is sorted, and how.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SortState {
    pub active: Option<StockField>,
    pub direction: SortDirection,
}

impl SortState {
    /// Direction marker for a column header, if it is the active one.
    pub fn marker_for(&self, field: StockField) -> Option<&'static str> {
        (self.active == Some(field)).then(|| self.direction.arrow())
    }
}

// ============================================================================
// Sort Engine
// ============================================================================

/// Stateful sorter for one result set.
#[derive(Debug, Clone, Default)]
pub struct SortEngine {
    state: SortState,
}

impl SortEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SortState {
        self.state
    }

    /// Back to `{none, ascending}`.
    pub fn reset(&mut self) {
        self.state = SortState::default();
    }

    /// Direction the next click on `column` selects.
    ///
    /// A different column always starts descending (largest first); the
    /// active column flips.
    pub fn next_direction(&self, column: StockField) -> SortDirection {
        if self.state.active == Some(column) {
            self.state.direction.toggled()
        } else {
            SortDirection::Descending
        }
    }

    /// Sort `results` in place by `column` and record the new state.
    pub fn sort(&mut self, results: &mut [StockRecord], column: StockField) -> SortState {
        let direction = self.next_direction(column);
        sort_records(results, column, direction);

        self.state = SortState {
            active: Some(column),
            direction,
        };
        debug!(column = %column, ?direction, rows = results.len(), "Sorted results");
        self.state
    }
}

/// Stable sort of records by one column.
pub fn sort_records(results: &mut [StockRecord], column: StockField, direction: SortDirection) {
    match direction {
        SortDirection::Ascending => {
            results.sort_by_cached_key(|record| OrderedKey(to_comparable(column.value(record))))
        }
        SortDirection::Descending => results
            .sort_by_cached_key(|record| Reverse(OrderedKey(to_comparable(column.value(record))))),
    }
}

/// `f64` wrapper ordered by [`compare_numbers`].
#[derive(Debug, Clone, Copy)]
struct OrderedKey(f64);

impl PartialEq for OrderedKey {
    fn eq(&self, other: &Self) -> bool {
        compare_numbers(self.0, other.0) == Ordering::Equal
    }
}

impl Eq for OrderedKey {}

impl PartialOrd for OrderedKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OrderedKey {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_numbers(self.0, other.0)
    }
}
