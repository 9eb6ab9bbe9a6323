//! Flat-parallel hill-climbing baselines.
//!
//! Independent climbs run concurrently on a rayon pool, one per starting
//! point, each with a private ledger. Only the evaluation budget and the
//! final aggregate are shared, so the same point may be scored by several
//! climbs; `visited` is the sum of each climb's distinct points.

use rayon::prelude::*;
use rayon::ThreadPool;
use ridge_types::{config_error, Granularity, RidgeResult, SearchConfig};
use std::sync::Arc;
use tracing::{debug, info};

use crate::budget::StopSignal;
use crate::hill_climb::{ClimbBudget, Climber};
use crate::ledger::VisitedLedger;
use crate::oracle::Oracle;
use crate::stats::RunStats;
use crate::strategy::{SearchRequest, SearchStrategy};

pub struct FlatParallelSearch {
    config: SearchConfig,
    granularity: Granularity,
    pool: ThreadPool,
    stop: StopSignal,
}

impl FlatParallelSearch {
    pub fn new(config: SearchConfig, granularity: Granularity) -> RidgeResult<Self> {
        config.validate()?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.threads)
            .thread_name(|i| format!("flat-worker-{i}"))
            .build()
            .map_err(|e| config_error!("Failed to build worker pool: {}", e))?;
        Ok(Self {
            config,
            granularity,
            pool,
            stop: StopSignal::new(),
        })
    }

    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }
}

impl SearchStrategy for FlatParallelSearch {
    fn name(&self) -> &str {
        match self.granularity {
            Granularity::PerStart => "parallel",
            Granularity::PerNeighbor => "parallel-neighbors",
        }
    }

    fn run(&self, request: &SearchRequest, oracle: Arc<dyn Oracle>) -> RidgeResult<RunStats> {
        request.validate(self.config.dimension())?;
        let stats = RunStats::new(&request.label, self.name());
        let budget = ClimbBudget::new(request.budget);
        info!(
            label = %request.label,
            starts = request.starts.len(),
            threads = self.config.threads,
            granularity = ?self.granularity,
            "starting flat-parallel search"
        );

        let parallel_neighbors = self.granularity == Granularity::PerNeighbor;
        let distinct_per_climb: Vec<usize> = self.pool.install(|| {
            request
                .starts
                .par_iter()
                .map(|start| {
                    let ledger = VisitedLedger::new();
                    let climber = Climber {
                        oracle: oracle.as_ref(),
                        dataset: &request.dataset,
                        delta: self.config.delta,
                        ledger: &ledger,
                        stats: &stats,
                        budget: &budget,
                        stop: &self.stop,
                        parallel_neighbors,
                    };
                    let optimum = climber.climb(start)?;
                    debug!(label = %request.label, start = %start, optimum = ?optimum, "climb finished");
                    Ok(ledger.len())
                })
                .collect::<RidgeResult<Vec<usize>>>()
        })?;

        stats.set_finish_time();
        info!(
            label = %request.label,
            visited = stats.visited(),
            distinct_per_climb = ?distinct_per_climb,
            best = ?stats.best_score(),
            "flat-parallel search finished"
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::testing::{dataset, RecordingOracle};
    use ridge_types::{MeasureSet, Point, RidgeError};

    fn config() -> SearchConfig {
        SearchConfig::new("flat", MeasureSet::anonymous(4))
            .with_delta(0.1)
            .with_threads(4)
    }

    #[test]
    fn per_start_climbs_reach_the_optimum() {
        let search = FlatParallelSearch::new(config(), Granularity::PerStart).unwrap();
        let oracle = Arc::new(RecordingOracle::new());
        let starts = vec![
            Point::new(vec![0.0, 0.0, 0.0, 0.0]),
            Point::new(vec![0.5, 0.5, 0.5, 0.5]),
        ];
        let request = SearchRequest::new("Stupid", starts, 10_000, dataset());

        let stats = search.run(&request, oracle.clone()).unwrap();
        assert_eq!(stats.best_score(), Some(1.0));
        assert_eq!(stats.strategy(), "parallel");
        // Private ledgers: visits equal oracle calls, duplicates across climbs included.
        assert_eq!(stats.visited(), oracle.calls());
    }

    #[test]
    fn per_neighbor_granularity_shares_the_budget() {
        let search = FlatParallelSearch::new(config(), Granularity::PerNeighbor).unwrap();
        let oracle = Arc::new(RecordingOracle::new());
        let request = SearchRequest::with_default_seeds("Stupid2", 4, 30, dataset());

        let stats = search.run(&request, oracle.clone()).unwrap();
        assert!(oracle.calls() <= 30);
        assert_eq!(stats.visited(), oracle.calls());
        assert_eq!(stats.best_score(), Some(1.0));
        assert_eq!(search.name(), "parallel-neighbors");
    }

    #[test]
    fn interruption_is_fatal() {
        let stop = StopSignal::new();
        stop.trip();
        let search = FlatParallelSearch::new(config(), Granularity::PerStart)
            .unwrap()
            .with_stop_signal(stop);
        let request = SearchRequest::with_default_seeds("stop", 4, 30, dataset());

        assert!(matches!(
            search.run(&request, Arc::new(RecordingOracle::new())),
            Err(RidgeError::Interrupted(_))
        ));
    }
}
