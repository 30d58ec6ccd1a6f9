//! Screening session: the state behind one console.
//!
//! A session owns the filter inputs, date scope, current result set and sort
//! state. Queries run one at a time; while one is outstanding the submit
//! affordance reports disabled and further submissions fail fast.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, info_span, warn, Instrument};
use url::Url;

use kabu_common::logging::generate_query_id;

use crate::client::{ScreeningClient, ScreeningError};
use crate::filter::{DateScope, FilterModel, FilterSet};
use crate::navigation::Navigator;
use crate::record::{StockField, StockRecord};
use crate::render::{RenderedTable, ResultProjector};
use crate::snapshot::{Snapshot, SnapshotStore};
use crate::sort::{SortEngine, SortState};

// ============================================================================
// Submit Affordance
// ============================================================================

/// Shared view of whether a query is in flight.
#[derive(Debug, Clone, Default)]
pub struct SubmitState {
    running: Arc<AtomicBool>,
}

impl SubmitState {
    /// Whether a new submission would be accepted.
    pub fn is_enabled(&self) -> bool {
        !self.running.load(Ordering::Acquire)
    }

    /// Whether a query is in flight; drives the progress indicator.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Disable the affordance until the returned guard is dropped.
    pub fn try_begin(&self) -> Result<SubmitGuard, ScreeningError> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ScreeningError::AlreadyRunning)?;
        Ok(SubmitGuard {
            running: Arc::clone(&self.running),
        })
    }
}

/// Re-enables submission on drop, whichever way the query ends.
#[derive(Debug)]
pub struct SubmitGuard {
    running: Arc<AtomicBool>,
}

impl Drop for SubmitGuard {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

// ============================================================================
// Query Status
// ============================================================================

/// Outcome of the most recent submission.
///
/// A query in flight holds the session mutably, so progress is read from
/// [`SubmitState::is_running`] instead; the status changes only on completion.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum QueryStatus {
    #[default]
    Idle,
    Loaded { count: usize },
    /// The query succeeded with zero matches
    Empty,
    Failed(String),
}

impl QueryStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

// ============================================================================
// Session
// ============================================================================

pub struct ScreeningSession {
    filters: FilterModel,
    date_scope: DateScope,
    results: Vec<StockRecord>,
    sort: SortEngine,
    projector: ResultProjector,
    navigator: Navigator,
    data_date: Option<String>,
    status: QueryStatus,
    submit: SubmitState,
    last_criteria: Option<FilterSet>,
    captured_at: Option<DateTime<Utc>>,
}

impl ScreeningSession {
    pub fn new(navigator: Navigator) -> Self {
        Self {
            filters: FilterModel::new(),
            date_scope: DateScope::Latest,
            results: Vec::new(),
            sort: SortEngine::new(),
            projector: ResultProjector::default(),
            navigator,
            data_date: None,
            status: QueryStatus::Idle,
            submit: SubmitState::default(),
            last_criteria: None,
            captured_at: None,
        }
    }

    /// Use a custom column layout for [`render`](Self::render).
    pub fn with_projector(mut self, projector: ResultProjector) -> Self {
        self.projector = projector;
        self
    }

    pub fn filters(&self) -> &FilterModel {
        &self.filters
    }

    pub fn filters_mut(&mut self) -> &mut FilterModel {
        &mut self.filters
    }

    pub fn date_scope(&self) -> DateScope {
        self.date_scope
    }

    pub fn set_date_scope(&mut self, scope: DateScope) {
        self.date_scope = scope;
    }

    pub fn results(&self) -> &[StockRecord] {
        &self.results
    }

    pub fn status(&self) -> &QueryStatus {
        &self.status
    }

    pub fn sort_state(&self) -> SortState {
        self.sort.state()
    }

    /// Trading date of the current results, as reported by the first row.
    pub fn data_date(&self) -> Option<&str> {
        self.data_date.as_deref()
    }

    /// Criteria sent with the most recent successful query.
    pub fn last_criteria(&self) -> Option<&FilterSet> {
        self.last_criteria.as_ref()
    }

    pub fn submit_state(&self) -> SubmitState {
        self.submit.clone()
    }

    /// Run one query with the current filters and date scope.
    ///
    /// On success the result set is replaced and the sort is reset. On failure
    /// the result set is cleared. Either way the submit affordance is restored.
    pub async fn submit(&mut self, client: &dyn ScreeningClient) -> Result<usize, ScreeningError> {
        let _guard = self.submit.try_begin()?;

        let query_id = generate_query_id();
        let span = info_span!("screening_query", %query_id);

        async move {
            let mut criteria = self.filters.collect();
            self.date_scope.apply(&mut criteria);

            self.sort.reset();
            self.captured_at = None;
            info!(params = criteria.len(), date = %self.date_scope, "Submitting screening query");

            match client.run(&criteria).await {
                Ok(response) => {
                    let count = response.records.len();
                    self.results = response.records;
                    self.data_date = response.data_date;
                    self.last_criteria = Some(criteria);
                    self.status = if count == 0 {
                        QueryStatus::Empty
                    } else {
                        QueryStatus::Loaded { count }
                    };
                    info!(count, data_date = ?self.data_date, "Screening query completed");
                    Ok(count)
                }
                Err(e) => {
                    warn!(error = %e, "Screening query failed");
                    self.results.clear();
                    self.data_date = None;
                    self.status = QueryStatus::Failed(e.to_string());
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Sort the current results by `column`; repeated calls toggle direction.
    pub fn sort_by(&mut self, column: StockField) -> SortState {
        self.sort.sort(&mut self.results, column)
    }

    /// Clear every filter input and the sort state. Results are kept.
    pub fn reset_filters(&mut self) {
        self.filters.reset();
        self.sort.reset();
    }

    pub fn render(&self) -> RenderedTable {
        self.projector.render(&self.results)
    }

    /// Column headers with the sort marker on the active column.
    pub fn headers(&self) -> Vec<String> {
        let state = self.sort.state();
        self.projector
            .columns()
            .iter()
            .map(|field| match state.marker_for(*field) {
                Some(arrow) => format!("{} {}", field.label(), arrow),
                None => field.label().to_string(),
            })
            .collect()
    }

    /// Render the results and, when there is anything to show, capture the
    /// analysis snapshot.
    pub fn present(
        &mut self,
        store: &SnapshotStore,
    ) -> anyhow::Result<(RenderedTable, Option<Snapshot>)> {
        let table = self.render();
        if !table.analysis_enabled {
            return Ok((table, None));
        }

        let snapshot = store.capture(&self.results)?;
        self.captured_at = Some(snapshot.captured_at);
        Ok((table, Some(snapshot)))
    }

    /// Chart link for a code in the current results.
    pub fn chart_link(&self, code: &str) -> Option<Url> {
        self.results
            .iter()
            .any(|r| r.code() == code)
            .then(|| self.navigator.chart_url(code))
    }

    /// Analysis link, available once the current results were captured.
    pub fn analysis_link(&self) -> Option<Url> {
        self.captured_at.map(|_| self.navigator.analysis_url())
    }
}
