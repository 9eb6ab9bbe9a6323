//! The strategy seam and composition-time factory.

use ridge_types::{
    validation_error, DatasetHandle, Point, RidgeError, RidgeResult, SearchConfig,
    SelectionResult, StrategyKind,
};
use std::sync::Arc;
use tracing::warn;

use crate::bandit::BanditSearch;
use crate::frontier::PriorityQueueSearch;
use crate::hill_climb::BasicSearch;
use crate::oracle::Oracle;
use crate::parallel::FlatParallelSearch;
use crate::stats::RunStats;

/// What a single run is asked to do.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub label: String,
    pub starts: Vec<Point>,
    /// Total evaluation budget (per arm for the bandit strategy).
    pub budget: usize,
    pub dataset: DatasetHandle,
}

impl SearchRequest {
    pub fn new(label: impl Into<String>, starts: Vec<Point>, budget: usize, dataset: DatasetHandle) -> Self {
        Self {
            label: label.into(),
            starts,
            budget,
            dataset,
        }
    }

    /// Request seeded with the all-ones point and every axis unit point.
    pub fn with_default_seeds(
        label: impl Into<String>,
        dimension: usize,
        budget: usize,
        dataset: DatasetHandle,
    ) -> Self {
        Self::new(label, Point::default_seeds(dimension), budget, dataset)
    }

    /// Default-seeded request carrying the configured evaluation budget.
    pub fn from_config(label: impl Into<String>, config: &SearchConfig, dataset: DatasetHandle) -> Self {
        Self::with_default_seeds(label, config.dimension(), config.budget, dataset)
    }

    /// Every start must have `dimension` coordinates and the budget must be
    /// positive.
    pub fn validate(&self, dimension: usize) -> RidgeResult<()> {
        if self.starts.is_empty() {
            return Err(validation_error!("At least one starting point is required"));
        }
        if self.budget == 0 {
            return Err(validation_error!("Evaluation budget must be positive"));
        }
        for start in &self.starts {
            if start.dimension() != dimension {
                return Err(RidgeError::DimensionMismatch {
                    expected: dimension,
                    actual: start.dimension(),
                });
            }
        }
        Ok(())
    }
}

/// A way of exploring the weight space.
pub trait SearchStrategy: Send + Sync {
    /// Human-readable strategy name.
    fn name(&self) -> &str;

    /// Run to completion and return the finished run aggregate.
    fn run(&self, request: &SearchRequest, oracle: Arc<dyn Oracle>) -> RidgeResult<RunStats>;
}

/// Build the strategy `config.strategy` names.
pub fn build_strategy(config: &SearchConfig) -> RidgeResult<Box<dyn SearchStrategy>> {
    config.validate()?;
    let strategy: Box<dyn SearchStrategy> = match config.strategy {
        StrategyKind::Basic => Box::new(BasicSearch::new(config.clone())?),
        StrategyKind::FlatParallel { granularity } => {
            Box::new(FlatParallelSearch::new(config.clone(), granularity)?)
        }
        StrategyKind::PriorityQueue => Box::new(PriorityQueueSearch::new(config.clone())?),
        StrategyKind::Bandit => Box::new(BanditSearch::from_config(config.clone())?),
    };
    Ok(strategy)
}

/// Call the oracle once. A failure is recorded on `stats` and logged; the
/// caller just drops the point.
pub(crate) fn evaluate_point(
    oracle: &dyn Oracle,
    dataset: &DatasetHandle,
    point: &Point,
    stats: &RunStats,
) -> Option<SelectionResult> {
    match oracle.evaluate(point, dataset) {
        Ok(result) => Some(result),
        Err(e) => {
            let error = RidgeError::Oracle {
                point: point.to_string(),
                message: format!("{e:#}"),
            };
            warn!(label = %stats.label(), "{}", error);
            stats.record_failure(&error);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::testing::{dataset, RecordingOracle};
    use ridge_types::{Granularity, MeasureSet};

    #[test]
    fn request_validation() {
        let request = SearchRequest::with_default_seeds("ok", 3, 10, dataset());
        assert!(request.validate(3).is_ok());
        assert!(matches!(
            request.validate(4),
            Err(RidgeError::DimensionMismatch {
                expected: 4,
                actual: 3
            })
        ));

        let empty = SearchRequest::new("empty", Vec::new(), 10, dataset());
        assert!(empty.validate(3).is_err());
        let no_budget = SearchRequest::with_default_seeds("zero", 3, 0, dataset());
        assert!(no_budget.validate(3).is_err());
    }

    #[test]
    fn factory_builds_every_kind() {
        let base = SearchConfig::new("factory", MeasureSet::anonymous(2)).with_threads(2);
        let cases = [
            (StrategyKind::Basic, "basic"),
            (
                StrategyKind::FlatParallel {
                    granularity: Granularity::PerStart,
                },
                "parallel",
            ),
            (
                StrategyKind::FlatParallel {
                    granularity: Granularity::PerNeighbor,
                },
                "parallel-neighbors",
            ),
            (StrategyKind::PriorityQueue, "priority"),
            (StrategyKind::Bandit, "bandit"),
        ];
        for (kind, name) in cases {
            let strategy = build_strategy(&base.clone().with_strategy(kind)).unwrap();
            assert_eq!(strategy.name(), name);
        }

        assert!(build_strategy(&base.with_threads(0)).is_err());
    }

    #[test]
    fn configured_budget_caps_a_built_strategy() {
        let config = SearchConfig::new("capped", MeasureSet::anonymous(4))
            .with_threads(2)
            .with_budget(5);
        let request = SearchRequest::from_config("capped", &config, dataset());
        assert_eq!(request.budget, 5);
        assert_eq!(request.starts, Point::default_seeds(4));

        for kind in [StrategyKind::Basic, StrategyKind::PriorityQueue] {
            let strategy = build_strategy(&config.clone().with_strategy(kind)).unwrap();
            let oracle = Arc::new(RecordingOracle::new());
            let stats = strategy.run(&request, oracle.clone()).unwrap();
            assert!(oracle.calls() <= 5, "{} made {} calls", strategy.name(), oracle.calls());
            assert!(stats.visited() <= 5);
        }
    }

    #[test]
    fn oracle_failures_are_recorded() {
        let oracle = RecordingOracle::new().failing_when(|_| true);
        let stats = RunStats::new("fail", "basic");
        let result = evaluate_point(&oracle, &dataset(), &Point::filled(2, 1.0), &stats);

        assert!(result.is_none());
        assert_eq!(stats.failures(), 1);
        assert!(stats
            .last_error()
            .unwrap()
            .contains("classifier training failed"));
    }
}
