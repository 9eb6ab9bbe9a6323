//! Search configuration and composition-time choices.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::config_error;
use crate::dataset::MeasureSet;
use crate::errors::{RidgeError, RidgeResult};

/// Unique search run identifier.
pub type SearchId = Uuid;

/// Capacity of the bounded frontier queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 50;

/// Conventional total evaluation budget for a priority-queue run:
/// 22 fixed evaluations plus `per_thread` per worker.
pub fn priority_budget(threads: usize, per_thread: usize) -> usize {
    22 + per_thread * threads
}

/// Task granularity of the flat-parallel baselines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Granularity {
    /// One independent hill-climb task per starting point.
    PerStart,
    /// Per-start climbs that also score each step's neighbors in parallel.
    PerNeighbor,
}

/// Which exploration strategy a run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrategyKind {
    Basic,
    FlatParallel { granularity: Granularity },
    PriorityQueue,
    Bandit,
}

impl Default for StrategyKind {
    fn default() -> Self {
        Self::PriorityQueue
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StrategyKind::Basic => "basic",
            StrategyKind::FlatParallel {
                granularity: Granularity::PerStart,
            } => "parallel",
            StrategyKind::FlatParallel {
                granularity: Granularity::PerNeighbor,
            } => "parallel-neighbors",
            StrategyKind::PriorityQueue => "priority",
            StrategyKind::Bandit => "bandit",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for StrategyKind {
    type Err = RidgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "basic" => Ok(Self::Basic),
            "parallel" | "stupid" => Ok(Self::FlatParallel {
                granularity: Granularity::PerStart,
            }),
            "parallel-neighbors" | "stupid2" => Ok(Self::FlatParallel {
                granularity: Granularity::PerNeighbor,
            }),
            "priority" | "pq" => Ok(Self::PriorityQueue),
            "bandit" | "mab" => Ok(Self::Bandit),
            other => Err(config_error!("Unknown strategy: {}", other)),
        }
    }
}

/// How the softmax policy turns transformed weights into a choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SoftmaxRule {
    /// Deterministically pick the arm with the lowest transformed weight
    /// `exp(mean / (tau * sum))`. Matches the legacy selection, which favors
    /// the lowest mean reward.
    LowestWeight,
    /// Sample an arm with probability proportional to `exp(mean / tau)`.
    Boltzmann,
}

impl Default for SoftmaxRule {
    fn default() -> Self {
        Self::LowestWeight
    }
}

/// Arm-selection policy for the bandit-directed strategy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PolicyKind {
    Softmax { rule: SoftmaxRule },
    EpsilonGreedy { epsilon: f64, seed: u64 },
    Ucb1 { exploration: f64 },
}

impl Default for PolicyKind {
    fn default() -> Self {
        Self::Softmax {
            rule: SoftmaxRule::default(),
        }
    }
}

/// Per-arm extra budget formula, evaluated against the thread count.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ExtraBudget {
    None,
    Fixed(usize),
    /// `factor * sqrt(threads)`, truncated.
    SqrtThreads { factor: f64 },
    /// `factor * threads`.
    LinearThreads { factor: usize },
}

impl Default for ExtraBudget {
    fn default() -> Self {
        Self::SqrtThreads { factor: 10.0 }
    }
}

impl ExtraBudget {
    pub fn per_arm(&self, threads: usize) -> usize {
        match *self {
            ExtraBudget::None => 0,
            ExtraBudget::Fixed(n) => n,
            ExtraBudget::SqrtThreads { factor } => (factor * (threads as f64).sqrt()).max(0.0) as usize,
            ExtraBudget::LinearThreads { factor } => factor * threads,
        }
    }
}

/// Top-level configuration for a search run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    pub id: SearchId,
    pub name: String,

    /// Relevance measures; their count is the search dimensionality.
    pub measures: MeasureSet,

    /// Step size used for neighbor generation.
    pub delta: f64,

    /// Worker threads per pool.
    pub threads: usize,

    /// Total evaluation budget (per arm for the bandit strategy). Requests
    /// built with `SearchRequest::from_config` carry it.
    pub budget: usize,

    /// Bounded frontier queue capacity.
    pub queue_capacity: usize,

    pub strategy: StrategyKind,

    /// Number of bandit arms (ignored by the other strategies).
    pub arms: usize,

    pub extra_budget: ExtraBudget,

    /// Softmax temperature, in (0, 1].
    pub temperature: f64,

    pub policy: PolicyKind,

    pub created_at: DateTime<Utc>,
}

impl SearchConfig {
    pub fn new(name: impl Into<String>, measures: MeasureSet) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            measures,
            delta: 0.1,
            threads: 4,
            budget: 100,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            strategy: StrategyKind::default(),
            arms: 2,
            extra_budget: ExtraBudget::default(),
            temperature: 0.5,
            policy: PolicyKind::default(),
            created_at: Utc::now(),
        }
    }

    pub fn with_delta(mut self, delta: f64) -> Self {
        self.delta = delta;
        self
    }

    pub fn with_threads(mut self, n: usize) -> Self {
        self.threads = n;
        self
    }

    pub fn with_budget(mut self, n: usize) -> Self {
        self.budget = n;
        self
    }

    pub fn with_queue_capacity(mut self, n: usize) -> Self {
        self.queue_capacity = n;
        self
    }

    pub fn with_strategy(mut self, strategy: StrategyKind) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_arms(mut self, arms: usize) -> Self {
        self.arms = arms;
        self
    }

    pub fn with_extra_budget(mut self, extra: ExtraBudget) -> Self {
        self.extra_budget = extra;
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_policy(mut self, policy: PolicyKind) -> Self {
        self.policy = policy;
        self
    }

    pub fn dimension(&self) -> usize {
        self.measures.dimension()
    }

    /// Extra exploration units shared among all arms.
    pub fn total_extra_budget(&self) -> usize {
        self.arms * self.extra_budget.per_arm(self.threads)
    }

    /// Reject parameters no run could start with.
    pub fn validate(&self) -> RidgeResult<()> {
        if self.measures.is_empty() {
            return Err(config_error!("At least one measure is required"));
        }
        if !self.delta.is_finite() || self.delta <= 0.0 {
            return Err(config_error!("Invalid step size: {}", self.delta));
        }
        if self.threads == 0 {
            return Err(config_error!("Invalid thread count: {}", self.threads));
        }
        if self.budget == 0 {
            return Err(config_error!("Evaluation budget must be positive"));
        }
        if self.queue_capacity == 0 {
            return Err(config_error!("Queue capacity must be positive"));
        }
        if self.arms == 0 {
            return Err(config_error!("Invalid arms: {}", self.arms));
        }
        if !(self.temperature > 0.0 && self.temperature <= 1.0) {
            return Err(config_error!(
                "Invalid temperature param: {}",
                self.temperature
            ));
        }
        match self.policy {
            PolicyKind::EpsilonGreedy { epsilon, .. } if !(0.0..=1.0).contains(&epsilon) => {
                Err(config_error!("Invalid epsilon: {}", epsilon))
            }
            PolicyKind::Ucb1 { exploration } if !(exploration >= 0.0) => {
                Err(config_error!("Invalid exploration coefficient: {}", exploration))
            }
            _ => Ok(()),
        }
    }

    pub fn from_json(json: &str) -> RidgeResult<Self> {
        let config: SearchConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> RidgeResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> SearchConfig {
        SearchConfig::new("test_search", MeasureSet::anonymous(4))
            .with_delta(0.1)
            .with_threads(4)
            .with_budget(50)
    }

    #[test]
    fn defaults_are_valid() {
        let config = sample_config();
        assert!(config.validate().is_ok());
        assert_eq!(config.dimension(), 4);
        assert_eq!(config.queue_capacity, DEFAULT_QUEUE_CAPACITY);
    }

    #[test]
    fn rejects_bad_parameters() {
        assert!(sample_config().with_threads(0).validate().is_err());
        assert!(sample_config().with_arms(0).validate().is_err());
        assert!(sample_config().with_temperature(0.0).validate().is_err());
        assert!(sample_config().with_temperature(1.5).validate().is_err());
        assert!(sample_config().with_temperature(f64::NAN).validate().is_err());
        assert!(sample_config().with_delta(-0.1).validate().is_err());
        assert!(sample_config().with_budget(0).validate().is_err());
        assert!(SearchConfig::new("empty", MeasureSet::anonymous(0))
            .validate()
            .is_err());
        assert!(sample_config()
            .with_policy(PolicyKind::EpsilonGreedy {
                epsilon: 1.5,
                seed: 1
            })
            .validate()
            .is_err());
    }

    #[test]
    fn temperature_of_one_is_allowed() {
        assert!(sample_config().with_temperature(1.0).validate().is_ok());
    }

    #[test]
    fn extra_budget_formulas() {
        assert_eq!(ExtraBudget::None.per_arm(4), 0);
        assert_eq!(ExtraBudget::Fixed(7).per_arm(4), 7);
        assert_eq!(ExtraBudget::SqrtThreads { factor: 10.0 }.per_arm(4), 20);
        assert_eq!(ExtraBudget::SqrtThreads { factor: 20.0 }.per_arm(2), 28);
        assert_eq!(ExtraBudget::LinearThreads { factor: 10 }.per_arm(4), 40);

        let config = sample_config()
            .with_arms(3)
            .with_extra_budget(ExtraBudget::Fixed(5));
        assert_eq!(config.total_extra_budget(), 15);
    }

    #[test]
    fn priority_budget_formula() {
        assert_eq!(priority_budget(4, 10), 62);
        assert_eq!(priority_budget(4, 5), 42);
    }

    #[test]
    fn strategy_kind_parsing() {
        assert_eq!("basic".parse::<StrategyKind>().unwrap(), StrategyKind::Basic);
        assert_eq!("PQ".parse::<StrategyKind>().unwrap(), StrategyKind::PriorityQueue);
        assert_eq!(
            "parallel-neighbors".parse::<StrategyKind>().unwrap(),
            StrategyKind::FlatParallel {
                granularity: Granularity::PerNeighbor
            }
        );
        assert!("simulated-annealing".parse::<StrategyKind>().is_err());

        for kind in [
            StrategyKind::Basic,
            StrategyKind::PriorityQueue,
            StrategyKind::Bandit,
            StrategyKind::FlatParallel {
                granularity: Granularity::PerStart,
            },
        ] {
            assert_eq!(kind.to_string().parse::<StrategyKind>().unwrap(), kind);
        }
    }

    #[test]
    fn json_round_trip_validates() {
        let config = sample_config().with_strategy(StrategyKind::Bandit);
        let json = config.to_json().unwrap();
        let back = SearchConfig::from_json(&json).unwrap();
        assert_eq!(back, config);

        let broken = json.replace("\"threads\": 4", "\"threads\": 0");
        assert!(matches!(
            SearchConfig::from_json(&broken),
            Err(RidgeError::Config(_))
        ));
    }
}
