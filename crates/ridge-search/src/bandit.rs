//! Multi-armed-bandit-directed search.
//!
//! `arms` identical frontiers run side by side. Each has the same seeds, its
//! own pool, its own base budget and its own visited ledger; they share only
//! the run aggregate, so `visited` sums every arm's distinct points. Every
//! score an arm produces is reported to an orchestrator that owns the
//! [`Bandit`]; while extra exploration units remain, each report buys the
//! arm the policy selects one more evaluation.

use crossbeam_channel::{unbounded, RecvTimeoutError};
use ridge_types::{RidgeError, RidgeResult, SearchConfig};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::budget::{BudgetOutcome, StopSignal};
use crate::frontier::{Frontier, RunContext, POLL_INTERVAL};
use crate::oracle::Oracle;
use crate::policy::Bandit;
use crate::stats::RunStats;
use crate::strategy::{SearchRequest, SearchStrategy};

/// Per-arm totals of a finished bandit run.
#[derive(Debug, Clone, PartialEq)]
pub struct ArmReport {
    pub arm: usize,
    pub observations: u64,
    pub mean: Option<f64>,
    /// Distinct points in this arm's ledger.
    pub distinct: usize,
    /// Extra evaluations this arm was granted.
    pub granted: usize,
    pub completed: usize,
    pub outcome: Option<BudgetOutcome>,
}

#[derive(Debug)]
pub struct BanditReport {
    pub stats: RunStats,
    pub arms: Vec<ArmReport>,
    /// Extra units never handed out because every arm had finished.
    pub unspent_extra: usize,
}

pub struct BanditSearch {
    config: SearchConfig,
    stop: StopSignal,
}

impl BanditSearch {
    pub fn from_config(config: SearchConfig) -> RidgeResult<Self> {
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

    pub fn run_with_report(
        &self,
        request: &SearchRequest,
        oracle: Arc<dyn Oracle>,
    ) -> RidgeResult<BanditReport> {
        request.validate(self.config.dimension())?;
        let arms = self.config.arms;
        let mut bandit = Bandit::from_kind(self.config.policy, self.config.temperature, arms)?;
        let mut extra = self.config.total_extra_budget();
        let run = Arc::new(RunContext::new(request, self.name(), oracle, self.config.delta));
        info!(
            label = %request.label,
            arms,
            policy = bandit.policy_name(),
            budget_per_arm = request.budget,
            extra,
            "starting bandit search"
        );

        let (tx, rx) = unbounded();
        let mut frontiers = Vec::with_capacity(arms);
        for arm in 0..arms {
            let frontier = Frontier::start(
                arm,
                Arc::clone(&run),
                &self.config,
                request.budget,
                &request.starts,
                Some(tx.clone()),
            );
            match frontier {
                Ok(f) => frontiers.push(f),
                Err(e) => {
                    run.cancel.trip();
                    for started in &frontiers {
                        started.stop();
                    }
                    return Err(e);
                }
            }
        }
        drop(tx);

        let mut granted = vec![0usize; arms];
        loop {
            if self.stop.is_tripped() {
                run.cancel.trip();
                let discarded: usize = frontiers.iter().map(Frontier::stop).sum();
                warn!(label = %request.label, discarded, "bandit search interrupted");
                return Err(RidgeError::Interrupted(format!(
                    "{} stopped after {} evaluations",
                    request.label,
                    run.stats.visited()
                )));
            }

            match rx.recv_timeout(POLL_INTERVAL) {
                Ok(observation) => {
                    bandit.record_observation(observation.arm, observation.score)?;
                    if extra > 0 {
                        let preferred = bandit.select_arm();
                        // A finished arm refuses the unit; offer it to the next live one.
                        let accepted = (0..arms)
                            .map(|offset| (preferred + offset) % arms)
                            .find(|&arm| frontiers[arm].budget().grant(1));
                        if let Some(arm) = accepted {
                            extra -= 1;
                            granted[arm] += 1;
                            debug!(label = %request.label, arm, remaining = extra, "granted extra evaluation");
                        }
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(RidgeError::Internal(
                        "arm observation channel closed while arms were running".to_string(),
                    ));
                }
            }

            if frontiers.iter().all(|f| f.outcome().is_some()) {
                break;
            }
        }

        run.cancel.trip();
        for frontier in &frontiers {
            frontier.stop();
        }
        // Late reports still count toward the arm statistics.
        for observation in rx.try_iter() {
            bandit.record_observation(observation.arm, observation.score)?;
        }

        let mut arm_reports = Vec::with_capacity(arms);
        for (arm, frontier) in frontiers.into_iter().enumerate() {
            let completed = frontier.budget().completed();
            let outcome = frontier.outcome();
            if outcome == Some(BudgetOutcome::FrontierExhausted) {
                warn!(label = %request.label, arm, "arm frontier drained early");
            }
            let distinct = frontier.into_ledger()?.len();
            arm_reports.push(ArmReport {
                arm,
                observations: bandit.stats().counts()[arm],
                mean: bandit.stats().mean(arm),
                distinct,
                granted: granted[arm],
                completed,
                outcome,
            });
        }

        let stats = run.into_stats()?;
        stats.set_finish_time();
        info!(
            label = %request.label,
            visited = stats.visited(),
            unspent_extra = extra,
            best = ?stats.best_score(),
            "bandit search finished"
        );

        Ok(BanditReport {
            stats,
            arms: arm_reports,
            unspent_extra: extra,
        })
    }
}

impl SearchStrategy for BanditSearch {
    fn name(&self) -> &str {
        "bandit"
    }

    fn run(&self, request: &SearchRequest, oracle: Arc<dyn Oracle>) -> RidgeResult<RunStats> {
        Ok(self.run_with_report(request, oracle)?.stats)
    }
}
