//! Sequential hill-climbing and the climber shared with the flat baselines.

use rayon::prelude::*;
use ridge_types::{DatasetHandle, Point, RidgeError, RidgeResult, SearchConfig};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use crate::budget::StopSignal;
use crate::ledger::VisitedLedger;
use crate::oracle::Oracle;
use crate::stats::RunStats;
use crate::strategy::{evaluate_point, SearchRequest, SearchStrategy};

/// Oracle-call allowance shared by every climb of a run.
#[derive(Debug)]
pub(crate) struct ClimbBudget {
    remaining: AtomicUsize,
}

impl ClimbBudget {
    pub(crate) fn new(total: usize) -> Self {
        Self {
            remaining: AtomicUsize::new(total),
        }
    }

    pub(crate) fn try_take(&self) -> bool {
        self.remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |r| r.checked_sub(1))
            .is_ok()
    }

    pub(crate) fn is_spent(&self) -> bool {
        self.remaining.load(Ordering::SeqCst) == 0
    }
}

/// Where a climb ended.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct LocalOptimum {
    pub point: Point,
    pub score: f64,
    pub steps: usize,
}

/// Everything one hill-climb needs.
pub(crate) struct Climber<'a> {
    pub oracle: &'a dyn Oracle,
    pub dataset: &'a DatasetHandle,
    pub delta: f64,
    pub ledger: &'a VisitedLedger,
    pub stats: &'a RunStats,
    pub budget: &'a ClimbBudget,
    pub stop: &'a StopSignal,
    /// Score each step's neighbors on the current rayon pool.
    pub parallel_neighbors: bool,
}

impl Climber<'_> {
    /// Score `point` unless the ledger already has it. Returns the score
    /// only when this call recorded the point.
    fn score_fresh(&self, point: &Point) -> Option<f64> {
        if self.ledger.contains(point) || !self.budget.try_take() {
            return None;
        }
        let result = evaluate_point(self.oracle, self.dataset, point, self.stats)?;
        if !self.ledger.try_record(point, result.score) {
            self.stats.record_redundant_evaluation();
            return None;
        }
        self.stats.increment_visited();
        self.stats.update_best(&result);
        debug!(label = %self.stats.label(), point = %point, score = result.score, "scored point");
        Some(result.score)
    }

    /// Climb from `start` until no newly scored neighbor improves on the
    /// current point. `Ok(None)` when the start itself could not be scored.
    pub(crate) fn climb(&self, start: &Point) -> RidgeResult<Option<LocalOptimum>> {
        let start_score = match self.ledger.score_of(start) {
            Some(score) => score,
            None => match self.score_fresh(start) {
                Some(score) => score,
                None => return Ok(None),
            },
        };

        let mut current = LocalOptimum {
            point: start.clone(),
            score: start_score,
            steps: 0,
        };

        loop {
            if self.stop.is_tripped() {
                return Err(RidgeError::Interrupted(format!(
                    "{} stopped while climbing from {}",
                    self.stats.label(),
                    start
                )));
            }
            if self.budget.is_spent() {
                break;
            }

            let fresh: Vec<Point> = current
                .point
                .neighbors(self.delta)
                .into_iter()
                .filter(|p| !self.ledger.contains(p))
                .collect();

            let scored: Vec<(Point, f64)> = if self.parallel_neighbors {
                fresh
                    .into_par_iter()
                    .filter_map(|p| self.score_fresh(&p).map(|s| (p, s)))
                    .collect()
            } else {
                fresh
                    .into_iter()
                    .filter_map(|p| self.score_fresh(&p).map(|s| (p, s)))
                    .collect()
            };

            // First strictly-best neighbor wins ties.
            let best = scored.into_iter().fold(None::<(Point, f64)>, |best, candidate| match best {
                Some(b) if b.1 >= candidate.1 => Some(b),
                _ => Some(candidate),
            });

            match best {
                Some((point, score)) if score > current.score => {
                    current = LocalOptimum {
                        point,
                        score,
                        steps: current.steps + 1,
                    };
                }
                _ => break,
            }
        }

        Ok(Some(current))
    }
}

/// Single-threaded hill-climb from each start, sharing one ledger so later
/// starts skip points earlier climbs already scored.
pub struct BasicSearch {
    config: SearchConfig,
    stop: StopSignal,
}

impl BasicSearch {
    pub fn new(config: SearchConfig) -> RidgeResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            stop: StopSignal::new(),
        })
    }

    /// Trip `stop` from another thread to abandon the run.
    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }
}

impl SearchStrategy for BasicSearch {
    fn name(&self) -> &str {
        "basic"
    }

    fn run(&self, request: &SearchRequest, oracle: Arc<dyn Oracle>) -> RidgeResult<RunStats> {
        request.validate(self.config.dimension())?;
        let stats = RunStats::new(&request.label, self.name());
        let ledger = VisitedLedger::new();
        let budget = ClimbBudget::new(request.budget);
        info!(label = %request.label, starts = request.starts.len(), budget = request.budget, "starting basic search");

        let climber = Climber {
            oracle: oracle.as_ref(),
            dataset: &request.dataset,
            delta: self.config.delta,
            ledger: &ledger,
            stats: &stats,
            budget: &budget,
            stop: &self.stop,
            parallel_neighbors: false,
        };

        for start in &request.starts {
            if let Some(optimum) = climber.climb(start)? {
                debug!(
                    label = %request.label,
                    start = %start,
                    end = %optimum.point,
                    score = optimum.score,
                    steps = optimum.steps,
                    "climb finished"
                );
            }
            if budget.is_spent() {
                break;
            }
        }

        stats.set_finish_time();
        info!(
            label = %request.label,
            visited = stats.visited(),
            best = ?stats.best_score(),
            "basic search finished"
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::testing::{dataset, mean_score, RecordingOracle};
    use ridge_types::{MeasureSet, SelectionResult};

    fn config(dimension: usize) -> SearchConfig {
        SearchConfig::new("basic", MeasureSet::anonymous(dimension)).with_delta(0.1)
    }

    #[test]
    fn climbs_to_the_clamped_optimum() {
        let search = BasicSearch::new(config(2)).unwrap();
        let oracle = Arc::new(RecordingOracle::new());
        let request = SearchRequest::new("B", vec![Point::new(vec![0.5, 0.5])], 1_000, dataset());

        let stats = search.run(&request, oracle.clone()).unwrap();

        assert_eq!(stats.best_score(), Some(1.0));
        let best = stats.best_point().unwrap();
        assert!((mean_score(&best) - 1.0).abs() < 1e-12);
        assert!(stats.is_finished());
        assert_eq!(stats.visited(), oracle.distinct_calls());
        // Sequential: no point is ever scored twice.
        assert_eq!(oracle.calls(), oracle.distinct_calls());
    }

    #[test]
    fn later_starts_reuse_the_shared_ledger() {
        let search = BasicSearch::new(config(2)).unwrap();
        let oracle = Arc::new(RecordingOracle::new());
        let start = Point::new(vec![0.2, 0.2]);
        let request = SearchRequest::new("dup", vec![start.clone(), start], 1_000, dataset());

        let stats = search.run(&request, oracle.clone()).unwrap();
        assert_eq!(oracle.calls(), oracle.distinct_calls());
        assert_eq!(stats.visited(), oracle.calls());
    }

    #[test]
    fn budget_caps_oracle_calls() {
        let search = BasicSearch::new(config(4)).unwrap();
        let oracle = Arc::new(RecordingOracle::new());
        let request = SearchRequest::with_default_seeds("cap", 4, 7, dataset());

        let stats = search.run(&request, oracle.clone()).unwrap();
        assert_eq!(oracle.calls(), 7);
        assert_eq!(stats.visited(), 7);
    }

    #[test]
    fn stops_at_local_optimum() {
        // Peak at x = 0.3; everything else decreases with distance.
        let peak = |point: &Point, _: &DatasetHandle| -> anyhow::Result<SelectionResult> {
            let x = point.coordinates()[0];
            Ok(SelectionResult::new(point.clone(), 1.0 - (x - 0.3).abs(), 1))
        };
        let search = BasicSearch::new(config(1)).unwrap();
        let request = SearchRequest::new("peak", vec![Point::new(vec![0.0])], 100, dataset());

        let stats = search.run(&request, Arc::new(peak)).unwrap();
        assert_eq!(stats.best_point(), Some(Point::new(vec![0.3])));
        // 0.0, then -0.1 and 0.1, 0.2, 0.3, 0.4
        assert_eq!(stats.visited(), 6);
    }

    #[test]
    fn failed_start_is_skipped() {
        let oracle = Arc::new(RecordingOracle::new().failing_when(|p| p.coordinates()[0] == 0.0));
        let search = BasicSearch::new(config(1)).unwrap();
        let request = SearchRequest::new(
            "fail",
            vec![Point::new(vec![0.0]), Point::new(vec![0.5])],
            20,
            dataset(),
        );

        let stats = search.run(&request, oracle).unwrap();
        assert_eq!(stats.failures(), 1);
        assert_eq!(stats.best_score(), Some(1.0));
    }

    #[test]
    fn tripped_stop_signal_interrupts() {
        let stop = StopSignal::new();
        stop.trip();
        let search = BasicSearch::new(config(2)).unwrap().with_stop_signal(stop);
        let request = SearchRequest::with_default_seeds("stop", 2, 50, dataset());

        let result = search.run(&request, Arc::new(RecordingOracle::new()));
        assert!(matches!(result, Err(RidgeError::Interrupted(_))));
    }

    #[test]
    fn rejects_wrong_dimension() {
        let search = BasicSearch::new(config(3)).unwrap();
        let request = SearchRequest::with_default_seeds("dim", 2, 10, dataset());
        assert!(matches!(
            search.run(&request, Arc::new(RecordingOracle::new())),
            Err(RidgeError::DimensionMismatch { .. })
        ));
    }
}
