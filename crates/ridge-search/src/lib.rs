//! # ridge-search
//!
//! Budgeted local search over feature-weight vectors for Ridgeline.
//!
//! Provides the visited ledger, run statistics, a bounded priority worker
//! pool and four search strategies (sequential hill-climb, flat-parallel
//! baselines, priority-queue frontier expansion and bandit-directed
//! multi-frontier expansion) behind a common [`SearchStrategy`] seam.

mod arena;
mod bandit;
mod budget;
mod frontier;
mod hill_climb;
mod ledger;
mod oracle;
mod parallel;
mod policy;
mod pool;
mod stats;
mod strategy;

pub use arena::{FrontierArena, FrontierNode, PointId};
pub use bandit::{ArmReport, BanditReport, BanditSearch};
pub use budget::{BudgetOutcome, EvaluationBudget, StopSignal};
pub use frontier::{FrontierReport, PriorityQueueSearch};
pub use hill_climb::BasicSearch;
pub use ledger::VisitedLedger;
pub use oracle::Oracle;
pub use parallel::FlatParallelSearch;
pub use policy::{ArmStats, Bandit, BanditPolicy, EpsilonGreedy, SoftMax, Ucb1};
pub use pool::{Job, PriorityWorkerPool, Spawner};
pub use stats::{RunId, RunStats, RunSummary};
pub use strategy::{build_strategy, SearchRequest, SearchStrategy};
