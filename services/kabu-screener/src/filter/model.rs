//! Filter model: raw UI criteria and their conversion into a `FilterSet`.

use chrono::NaiveDate;
use thiserror::Error;
use tracing::debug;

use super::criteria::{catalog, is_truthy, CriterionKind, FilterCriterion};
use super::set::{FilterSet, TARGET_DATE_KEY};

/// Errors raised while editing criteria.
///
/// Collecting a `FilterSet` never fails; these only reject edits that name
/// something the model does not know.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    #[error("unknown filter criterion: {0}")]
    UnknownCriterion(String),

    #[error("criterion {0} is not a checkbox")]
    NotAFlag(String),

    #[error("invalid screening date {0:?}: expected \"latest\" or YYYY-MM-DD")]
    InvalidDate(String),

    #[error("expected key=value, got {0:?}")]
    MalformedAssignment(String),
}

// ============================================================================
// Date Scope
// ============================================================================

/// Which trading date the screen runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DateScope {
    /// Let the backend pick its most recent date
    #[default]
    Latest,
    /// A specific trading date
    On(NaiveDate),
}

impl DateScope {
    /// Parse `"latest"` (or blank) or an ISO date.
    pub fn parse(input: &str) -> Result<Self, FilterError> {
        let trimmed = input.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("latest") {
            return Ok(Self::Latest);
        }
        NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
            .map(Self::On)
            .map_err(|_| FilterError::InvalidDate(trimmed.to_string()))
    }

    /// Add `target_date` for an explicit date; latest mode leaves the set alone.
    pub fn apply(&self, set: &mut FilterSet) {
        match self {
            Self::Latest => {
                set.remove(TARGET_DATE_KEY);
            }
            Self::On(date) => set.insert(TARGET_DATE_KEY, date.format("%Y-%m-%d").to_string()),
        }
    }
}

impl std::fmt::Display for DateScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Latest => f.write_str("latest"),
            Self::On(date) => write!(f, "{}", date.format("%Y-%m-%d")),
        }
    }
}

// ============================================================================
// Filter Model
// ============================================================================

/// Holds the raw criteria as entered and builds a fresh `FilterSet` per run.
#[derive(Debug, Clone)]
pub struct FilterModel {
    criteria: Vec<FilterCriterion>,
}

impl Default for FilterModel {
    fn default() -> Self {
        Self::new()
    }
}

impl FilterModel {
    /// Create a model over the full criterion catalog, everything empty.
    pub fn new() -> Self {
        Self { criteria: catalog() }
    }

    /// All criteria with their current raw values.
    pub fn criteria(&self) -> &[FilterCriterion] {
        &self.criteria
    }

    fn find_mut(&mut self, key: &str) -> Result<&mut FilterCriterion, FilterError> {
        self.criteria
            .iter_mut()
            .find(|c| c.key == key)
            .ok_or_else(|| FilterError::UnknownCriterion(key.to_string()))
    }

    /// Current raw value of a criterion.
    pub fn raw(&self, key: &str) -> Option<&str> {
        self.criteria
            .iter()
            .find(|c| c.key == key)
            .map(|c| c.raw_value.as_str())
    }

    /// Set the raw value exactly as entered.
    pub fn set(&mut self, key: &str, raw: impl Into<String>) -> Result<(), FilterError> {
        self.find_mut(key)?.raw_value = raw.into();
        Ok(())
    }

    /// Tick or untick a checkbox criterion.
    pub fn set_flag(&mut self, key: &str, checked: bool) -> Result<(), FilterError> {
        let criterion = self.find_mut(key)?;
        if criterion.kind != CriterionKind::Flag {
            return Err(FilterError::NotAFlag(key.to_string()));
        }
        criterion.raw_value = if checked { "true" } else { "" }.to_string();
        Ok(())
    }

    /// Apply a `key=value` assignment; a bare flag key means checked.
    pub fn assign(&mut self, assignment: &str) -> Result<(), FilterError> {
        match assignment.split_once('=') {
            Some((key, value)) => self.set(key.trim(), value),
            None => {
                let key = assignment.trim();
                if key.is_empty() {
                    return Err(FilterError::MalformedAssignment(assignment.to_string()));
                }
                self.set_flag(key, true).map_err(|e| match e {
                    FilterError::NotAFlag(_) => {
                        FilterError::MalformedAssignment(assignment.to_string())
                    }
                    other => other,
                })
            }
        }
    }

    pub fn clear(&mut self, key: &str) -> Result<(), FilterError> {
        self.find_mut(key)?.raw_value.clear();
        Ok(())
    }

    /// Empty every criterion.
    pub fn reset(&mut self) {
        for criterion in &mut self.criteria {
            criterion.raw_value.clear();
        }
    }

    /// Number of criteria with anything entered.
    pub fn active_count(&self) -> usize {
        self.criteria
            .iter()
            .filter(|c| match c.kind {
                CriterionKind::Flag => is_truthy(&c.raw_value),
                _ => !c.is_empty(),
            })
            .count()
    }

    /// Build the query-ready set from the current raw values.
    ///
    /// Empty criteria, unchecked flags and unparsable numbers are omitted.
    /// Ranges are not validated; `min > max` is the backend's concern.
    pub fn collect(&self) -> FilterSet {
        let mut set = FilterSet::new();
        let mut dropped = 0usize;

        for criterion in &self.criteria {
            match criterion.query_value() {
                Some(value) => set.insert(criterion.key.clone(), value),
                None if !criterion.is_empty() && criterion.kind == CriterionKind::NumericBound => {
                    dropped += 1;
                    debug!(key = %criterion.key, raw = %criterion.raw_value, "Dropping unparsable filter input");
                }
                None => {}
            }
        }

        debug!(active = set.len(), dropped, "Collected filter set");
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_model_collects_nothing() {
        let model = FilterModel::new();
        assert!(model.collect().is_empty());
        assert_eq!(model.active_count(), 0);
    }

    #[test]
    fn test_collect_converts_units() {
        let mut model = FilterModel::new();
        model.set("min_shares_issued", "10").unwrap();
        model.set("min_market_cap", "5").unwrap();
        model.set("max_jsf_loan_balance", "2").unwrap();
        model.set("min_per", "8.5").unwrap();

        let set = model.collect();
        assert_eq!(set.get("min_shares_issued"), Some("10000000"));
        assert_eq!(set.get("min_market_cap"), Some("500"));
        assert_eq!(set.get("max_jsf_loan_balance"), Some("2000000"));
        assert_eq!(set.get("min_per"), Some("8.5"));
        assert_eq!(set.len(), 4);
    }

    #[test]
    fn test_collect_omits_empty_unchecked_and_malformed() {
        let mut model = FilterModel::new();
        model.set("min_roe", "").unwrap();
        model.set("max_roe", "ten").unwrap();
        model.set("market", "").unwrap();
        model.set_flag("pattern_upper_shadow", false).unwrap();

        let set = model.collect();
        assert!(set.is_empty());
        assert_eq!(model.active_count(), 1);
    }

    #[test]
    fn test_min_greater_than_max_passes_through() {
        let mut model = FilterModel::new();
        model.set("min_pbr", "3").unwrap();
        model.set("max_pbr", "1").unwrap();

        let set = model.collect();
        assert_eq!(set.get("min_pbr"), Some("3"));
        assert_eq!(set.get("max_pbr"), Some("1"));
    }

    #[test]
    fn test_flags_only_sent_when_true() {
        let mut model = FilterModel::new();
        model.set_flag("margin_lending_only", true).unwrap();
        model.set_flag("pattern_vwap_golden_cross", false).unwrap();

        let set = model.collect();
        assert_eq!(set.get("margin_lending_only"), Some("true"));
        assert!(!set.contains_key("pattern_vwap_golden_cross"));
    }

    #[test]
    fn test_unknown_and_non_flag_keys_rejected() {
        let mut model = FilterModel::new();
        assert_eq!(
            model.set("min_magic", "1"),
            Err(FilterError::UnknownCriterion("min_magic".into()))
        );
        assert_eq!(
            model.set_flag("min_per", true),
            Err(FilterError::NotAFlag("min_per".into()))
        );
    }

    #[test]
    fn test_assign() {
        let mut model = FilterModel::new();
        model.assign("min_market_cap=50").unwrap();
        model.assign("pattern_upper_shadow").unwrap();
        assert!(matches!(
            model.assign("min_per"),
            Err(FilterError::MalformedAssignment(_))
        ));

        let set = model.collect();
        assert_eq!(set.get("min_market_cap"), Some("5000"));
        assert_eq!(set.get("pattern_upper_shadow"), Some("true"));
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut model = FilterModel::new();
        model.set("sector", "輸送用機器").unwrap();
        model.set("min_volume", "100000").unwrap();
        model.reset();
        assert!(model.collect().is_empty());
        assert_eq!(model.raw("sector"), Some(""));
    }

    #[test]
    fn test_date_scope() {
        assert_eq!(DateScope::parse("latest").unwrap(), DateScope::Latest);
        assert_eq!(DateScope::parse("").unwrap(), DateScope::Latest);
        assert!(matches!(DateScope::parse("2025/01/10"), Err(FilterError::InvalidDate(_))));

        let mut set = FilterSet::new();
        DateScope::parse("2025-01-10").unwrap().apply(&mut set);
        assert_eq!(set.get(TARGET_DATE_KEY), Some("2025-01-10"));

        DateScope::Latest.apply(&mut set);
        assert!(!set.contains_key(TARGET_DATE_KEY));
    }
}
