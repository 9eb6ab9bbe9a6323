//! Run aggregation: best result, visit counts, failures and timing.

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use ridge_types::{Point, RidgeError, SelectionResult};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;
use tracing::warn;
use uuid::Uuid;

/// Unique run identifier.
pub type RunId = Uuid;

/// Thread-safe aggregate of one search run.
///
/// Workers only touch it through [`RunStats::update_best`],
/// [`RunStats::increment_visited`], [`RunStats::record_failure`] and
/// [`RunStats::record_redundant_evaluation`]. Once the finish time is
/// stamped the run has completed and the values no longer change.
#[derive(Debug)]
pub struct RunStats {
    id: RunId,
    label: String,
    strategy: String,
    started_at: DateTime<Utc>,
    finished_at: OnceLock<DateTime<Utc>>,
    best: Mutex<BestCell>,
    visited: AtomicUsize,
    failures: AtomicUsize,
    redundant_evaluations: AtomicUsize,
    last_error: Mutex<Option<String>>,
}

#[derive(Debug, Default)]
struct BestCell {
    result: Option<SelectionResult>,
    improvements: Vec<f64>,
}

impl RunStats {
    pub fn new(label: impl Into<String>, strategy: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            label: label.into(),
            strategy: strategy.into(),
            started_at: Utc::now(),
            finished_at: OnceLock::new(),
            best: Mutex::new(BestCell::default()),
            visited: AtomicUsize::new(0),
            failures: AtomicUsize::new(0),
            redundant_evaluations: AtomicUsize::new(0),
            last_error: Mutex::new(None),
        }
    }

    /// Replace the best result if `result` is strictly better.
    /// Returns whether it was replaced; ties keep the first-seen result.
    pub fn update_best(&self, result: &SelectionResult) -> bool {
        let mut best = self.best.lock();
        let improved = match &best.result {
            None => true,
            Some(current) => result.improves_on(current),
        };
        if improved {
            best.improvements.push(result.score);
            best.result = Some(result.clone());
        }
        improved
    }

    pub fn increment_visited(&self) -> usize {
        self.visited.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Record a failed task. The failure never aborts the run.
    pub fn record_failure(&self, error: &RidgeError) {
        self.failures.fetch_add(1, Ordering::SeqCst);
        *self.last_error.lock() = Some(error.to_string());
    }

    /// Record an oracle call whose point another worker had already recorded.
    pub fn record_redundant_evaluation(&self) {
        self.redundant_evaluations.fetch_add(1, Ordering::SeqCst);
    }

    /// Stamp the finish time. Only the first call has an effect.
    pub fn set_finish_time(&self) {
        if self.finished_at.set(Utc::now()).is_err() {
            warn!(label = %self.label, "finish time already set, ignoring");
        }
    }

    pub fn id(&self) -> RunId {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn strategy(&self) -> &str {
        &self.strategy
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at.get().copied()
    }

    pub fn is_finished(&self) -> bool {
        self.finished_at.get().is_some()
    }

    pub fn work_time(&self) -> Option<Duration> {
        self.finished_at().map(|end| end - self.started_at)
    }

    pub fn best_result(&self) -> Option<SelectionResult> {
        self.best.lock().result.clone()
    }

    pub fn best_point(&self) -> Option<Point> {
        self.best.lock().result.as_ref().map(|r| r.point.clone())
    }

    pub fn best_score(&self) -> Option<f64> {
        self.best.lock().result.as_ref().map(|r| r.score)
    }

    /// Every best score accepted so far, in acceptance order.
    pub fn improvements(&self) -> Vec<f64> {
        self.best.lock().improvements.clone()
    }

    pub fn visited(&self) -> usize {
        self.visited.load(Ordering::SeqCst)
    }

    pub fn failures(&self) -> usize {
        self.failures.load(Ordering::SeqCst)
    }

    pub fn redundant_evaluations(&self) -> usize {
        self.redundant_evaluations.load(Ordering::SeqCst)
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().clone()
    }

    /// Immutable snapshot for reporting.
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            id: self.id,
            label: self.label.clone(),
            strategy: self.strategy.clone(),
            best: self.best_result(),
            visited: self.visited(),
            failures: self.failures(),
            redundant_evaluations: self.redundant_evaluations(),
            last_error: self.last_error(),
            started_at: self.started_at,
            finished_at: self.finished_at(),
            work_time_ms: self.work_time().map(|d| d.num_milliseconds()),
        }
    }
}

/// Serializable view of a [`RunStats`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub id: RunId,
    pub label: String,
    pub strategy: String,
    pub best: Option<SelectionResult>,
    pub visited: usize,
    pub failures: usize,
    pub redundant_evaluations: usize,
    pub last_error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub work_time_ms: Option<i64>,
}
