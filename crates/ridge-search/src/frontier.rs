//! Priority-queue-driven frontier search.
//!
//! Every scored point enqueues its unvisited neighbors on a
//! [`PriorityWorkerPool`] at the parent's score, so the pool always expands
//! the most promising known region next. Each frontier records what it has
//! scored in its own [`VisitedLedger`]. A run ends when its
//! [`EvaluationBudget`] opens: after exactly `budget` counted task
//! completions, or earlier if the frontier drains.

use crossbeam_channel::Sender;
use ridge_types::{
    internal_error, DatasetHandle, Point, RidgeError, RidgeResult, SearchConfig,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::arena::{FrontierArena, FrontierNode, PointId};
use crate::budget::{BudgetOutcome, EvaluationBudget, StopSignal};
use crate::ledger::VisitedLedger;
use crate::oracle::Oracle;
use crate::pool::{PriorityWorkerPool, Spawner};
use crate::stats::RunStats;
use crate::strategy::{evaluate_point, SearchRequest, SearchStrategy};

pub(crate) const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A score produced by one arm, reported to the bandit orchestrator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Observation {
    pub arm: usize,
    pub score: f64,
}

/// State shared by every frontier of a run. Each frontier keeps its own
/// ledger; only the aggregate is common.
pub(crate) struct RunContext {
    pub oracle: Arc<dyn Oracle>,
    pub dataset: DatasetHandle,
    pub delta: f64,
    pub stats: RunStats,
    /// Tripped when the run is abandoned; queued tasks then skip.
    pub cancel: StopSignal,
}

impl RunContext {
    pub(crate) fn new(
        request: &SearchRequest,
        strategy: &str,
        oracle: Arc<dyn Oracle>,
        delta: f64,
    ) -> Self {
        Self {
            oracle,
            dataset: request.dataset.clone(),
            delta,
            stats: RunStats::new(&request.label, strategy),
            cancel: StopSignal::new(),
        }
    }

    /// Take the run aggregate back once every frontier has been dropped.
    pub(crate) fn into_stats(self: Arc<Self>) -> RidgeResult<RunStats> {
        let ctx = Arc::try_unwrap(self)
            .map_err(|_| internal_error!("run context still shared after shutdown"))?;
        Ok(ctx.stats)
    }
}

/// Per-frontier state captured by every queued task.
struct ArmContext {
    arm: usize,
    run: Arc<RunContext>,
    ledger: VisitedLedger,
    arena: FrontierArena,
    budget: EvaluationBudget,
    observations: Option<Sender<Observation>>,
}

/// Counts a permit-holding task as completed on every exit path, panics
/// included.
struct CompletionGuard<'a>(&'a EvaluationBudget);

impl Drop for CompletionGuard<'_> {
    fn drop(&mut self) {
        self.0.finish_counted();
    }
}

impl ArmContext {
    fn process(self: &Arc<Self>, id: PointId, spawner: &Spawner) {
        if self.run.cancel.is_tripped() || !self.budget.try_begin() {
            self.budget.finish_skipped();
            return;
        }
        let _completion = CompletionGuard(&self.budget);
        self.expand(id, spawner);
    }

    fn expand(self: &Arc<Self>, id: PointId, spawner: &Spawner) {
        let Some(point) = self.arena.point(id) else {
            warn!(arm = self.arm, id = id.0, "frontier entry missing from arena");
            return;
        };
        let run = &self.run;
        if self.ledger.contains(&point) {
            debug!(arm = self.arm, point = %point, "point already processed");
            return;
        }

        let Some(result) = evaluate_point(run.oracle.as_ref(), &run.dataset, &point, &run.stats)
        else {
            return;
        };
        if !self.ledger.try_record(&point, result.score) {
            run.stats.record_redundant_evaluation();
            return;
        }
        run.stats.increment_visited();
        if run.stats.update_best(&result) {
            debug!(arm = self.arm, result = %result, "new best");
        }
        if let Some(tx) = &self.observations {
            // The orchestrator may already be gone on shutdown.
            let _ = tx.send(Observation {
                arm: self.arm,
                score: result.score,
            });
        }

        for neighbor in point.neighbors(run.delta) {
            if self.ledger.contains(&neighbor) {
                continue;
            }
            let child = self.arena.push_child(id, neighbor, result.score);
            self.budget.task_submitted();
            let ctx = Arc::clone(self);
            if spawner
                .submit(result.score, move |s| ctx.process(child, s))
                .is_err()
            {
                self.budget.task_abandoned();
                break;
            }
        }
    }
}

/// One running frontier: a pool, its budget and the arena of entries it
/// has spawned.
pub(crate) struct Frontier {
    ctx: Arc<ArmContext>,
    pool: PriorityWorkerPool,
}

impl Frontier {
    pub(crate) fn start(
        arm: usize,
        run: Arc<RunContext>,
        config: &SearchConfig,
        budget: usize,
        seeds: &[Point],
        observations: Option<Sender<Observation>>,
    ) -> RidgeResult<Self> {
        let pool = PriorityWorkerPool::new(
            format!("{}-arm{}", run.stats.label(), arm),
            config.threads,
            config.queue_capacity,
        )?;
        let ctx = Arc::new(ArmContext {
            arm,
            run,
            ledger: VisitedLedger::new(),
            arena: FrontierArena::new(),
            budget: EvaluationBudget::new(budget),
            observations,
        });

        let ids: Vec<PointId> = seeds
            .iter()
            .map(|seed| ctx.arena.push_seed(seed.clone()))
            .collect();
        // Register every seed before any can finish, or an early finisher
        // would see an empty frontier.
        for _ in &ids {
            ctx.budget.task_submitted();
        }
        for id in ids {
            let task_ctx = Arc::clone(&ctx);
            let priority = ctx.arena.get(id).map_or(1.0, |n| n.entry.priority);
            if let Err(e) = pool.submit(priority, move |s| task_ctx.process(id, s)) {
                ctx.budget.task_abandoned();
                return Err(e);
            }
        }

        Ok(Self { ctx, pool })
    }

    pub(crate) fn budget(&self) -> &EvaluationBudget {
        &self.ctx.budget
    }

    pub(crate) fn outcome(&self) -> Option<BudgetOutcome> {
        self.ctx.budget.outcome()
    }

    pub(crate) fn nodes(&self) -> Vec<FrontierNode> {
        self.ctx.arena.nodes()
    }

    /// Discard queued work and wait for the workers to exit.
    pub(crate) fn stop(&self) -> usize {
        let discarded = self.pool.shutdown_now();
        self.pool.join();
        discarded
    }

    /// Stop the pool and hand back the frontier's ledger.
    pub(crate) fn into_ledger(self) -> RidgeResult<VisitedLedger> {
        let Frontier { ctx, pool } = self;
        pool.shutdown_now();
        pool.join();
        // Dropping the pool releases every queued task's handle on `ctx`.
        drop(pool);
        let ctx = Arc::try_unwrap(ctx)
            .map_err(|_| internal_error!("frontier tasks still alive after shutdown"))?;
        Ok(ctx.ledger)
    }
}

/// Everything a finished frontier run leaves behind.
#[derive(Debug)]
pub struct FrontierReport {
    pub stats: RunStats,
    pub outcome: BudgetOutcome,
    /// Counted task completions.
    pub completed: usize,
    /// Every entry the frontier spawned, seeds first.
    pub nodes: Vec<FrontierNode>,
    pub ledger: VisitedLedger,
}

/// Concurrent best-first expansion on a bounded priority queue.
pub struct PriorityQueueSearch {
    config: SearchConfig,
    stop: StopSignal,
}

impl PriorityQueueSearch {
    pub fn new(config: SearchConfig) -> RidgeResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            stop: StopSignal::new(),
        })
    }

    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    /// Run and keep the frontier fan-out and ledger for inspection.
    pub fn run_with_report(
        &self,
        request: &SearchRequest,
        oracle: Arc<dyn Oracle>,
    ) -> RidgeResult<FrontierReport> {
        request.validate(self.config.dimension())?;
        let run = Arc::new(RunContext::new(request, self.name(), oracle, self.config.delta));
        info!(
            label = %request.label,
            seeds = request.starts.len(),
            budget = request.budget,
            threads = self.config.threads,
            "starting priority search"
        );

        let frontier = Frontier::start(
            0,
            Arc::clone(&run),
            &self.config,
            request.budget,
            &request.starts,
            None,
        )?;

        let outcome = loop {
            if self.stop.is_tripped() {
                run.cancel.trip();
                let discarded = frontier.stop();
                warn!(label = %request.label, discarded, "priority search interrupted");
                return Err(RidgeError::Interrupted(format!(
                    "{} stopped after {} evaluations",
                    request.label,
                    frontier.budget().completed()
                )));
            }
            if let Some(outcome) = frontier.budget().wait_timeout(POLL_INTERVAL) {
                break outcome;
            }
        };

        run.cancel.trip();
        let discarded = frontier.stop();
        let completed = frontier.budget().completed();
        if outcome == BudgetOutcome::FrontierExhausted {
            warn!(
                label = %request.label,
                completed,
                budget = request.budget,
                "frontier drained before the budget was spent"
            );
        }
        let nodes = frontier.nodes();
        let ledger = frontier.into_ledger()?;

        let stats = run.into_stats()?;
        stats.set_finish_time();
        info!(
            label = %request.label,
            visited = stats.visited(),
            completed,
            discarded,
            best = ?stats.best_score(),
            "priority search finished"
        );

        Ok(FrontierReport {
            stats,
            outcome,
            completed,
            nodes,
            ledger,
        })
    }
}

impl SearchStrategy for PriorityQueueSearch {
    fn name(&self) -> &str {
        "priority"
    }

    fn run(&self, request: &SearchRequest, oracle: Arc<dyn Oracle>) -> RidgeResult<RunStats> {
        Ok(self.run_with_report(request, oracle)?.stats)
    }
}
