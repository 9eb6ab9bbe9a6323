//! Evaluation budget gate and cooperative stop signal.

use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Cloneable cooperative stop flag.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    tripped: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trip(&self) {
        self.tripped.store(true, Ordering::SeqCst);
    }

    pub fn is_tripped(&self) -> bool {
        self.tripped.load(Ordering::SeqCst)
    }
}

/// Why a budget gate opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetOutcome {
    /// Every permit was taken and every permit-holding task completed.
    Exhausted,
    /// No work was left to run before the permits ran out.
    FrontierExhausted,
}

#[derive(Debug)]
struct BudgetState {
    remaining: usize,
    completed: usize,
    in_flight: usize,
    outstanding: usize,
}

impl BudgetState {
    fn outcome(&self) -> Option<BudgetOutcome> {
        if self.remaining == 0 && self.in_flight == 0 {
            Some(BudgetOutcome::Exhausted)
        } else if self.outstanding == 0 {
            Some(BudgetOutcome::FrontierExhausted)
        } else {
            None
        }
    }
}

/// Countdown over task completions.
///
/// A task takes a permit when it starts; a task that finds no permit left
/// short-circuits without counting. Every permit-holding task counts as one
/// completion whether or not it scored a point, so a run with budget `N`
/// completes after exactly `N` counted tasks unless the frontier drains
/// first. `outstanding` tracks submitted-but-unfinished tasks so a drained
/// frontier is detected instead of waited on forever.
#[derive(Debug)]
pub struct EvaluationBudget {
    state: Mutex<BudgetState>,
    changed: Condvar,
}

impl EvaluationBudget {
    pub fn new(total: usize) -> Self {
        Self {
            state: Mutex::new(BudgetState {
                remaining: total,
                completed: 0,
                in_flight: 0,
                outstanding: 0,
            }),
            changed: Condvar::new(),
        }
    }

    /// A task was queued.
    pub fn task_submitted(&self) {
        self.state.lock().outstanding += 1;
    }

    /// A queued task was dropped without running (e.g. the pool refused it).
    pub fn task_abandoned(&self) {
        let mut state = self.state.lock();
        state.outstanding = state.outstanding.saturating_sub(1);
        self.notify_if_done(&state);
    }

    /// Take a permit. Returns `false` once the budget is spent, which is
    /// the stop condition every task checks first.
    pub fn try_begin(&self) -> bool {
        let mut state = self.state.lock();
        if state.remaining == 0 {
            return false;
        }
        state.remaining -= 1;
        state.in_flight += 1;
        true
    }

    /// A permit-holding task finished.
    pub fn finish_counted(&self) {
        let mut state = self.state.lock();
        state.completed += 1;
        state.in_flight = state.in_flight.saturating_sub(1);
        state.outstanding = state.outstanding.saturating_sub(1);
        self.notify_if_done(&state);
    }

    /// A task finished without a permit.
    pub fn finish_skipped(&self) {
        let mut state = self.state.lock();
        state.outstanding = state.outstanding.saturating_sub(1);
        self.notify_if_done(&state);
    }

    /// Add permits. Has no effect once the gate has opened.
    pub fn grant(&self, permits: usize) -> bool {
        let mut state = self.state.lock();
        if state.outcome().is_some() {
            return false;
        }
        state.remaining += permits;
        true
    }

    pub fn completed(&self) -> usize {
        self.state.lock().completed
    }

    pub fn remaining(&self) -> usize {
        self.state.lock().remaining
    }

    pub fn outcome(&self) -> Option<BudgetOutcome> {
        self.state.lock().outcome()
    }

    /// Block up to `timeout` for the gate to open.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<BudgetOutcome> {
        let mut state = self.state.lock();
        if state.outcome().is_none() {
            self.changed.wait_for(&mut state, timeout);
        }
        state.outcome()
    }

    fn notify_if_done(&self, state: &BudgetState) {
        if state.outcome().is_some() {
            self.changed.notify_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_signal_is_shared_between_clones() {
        let signal = StopSignal::new();
        let clone = signal.clone();
        assert!(!clone.is_tripped());
        signal.trip();
        assert!(clone.is_tripped());
    }

    #[test]
    fn opens_after_exactly_n_completions() {
        let budget = EvaluationBudget::new(3);
        for _ in 0..5 {
            budget.task_submitted();
        }

        assert!(budget.try_begin());
        assert!(budget.try_begin());
        assert!(budget.try_begin());
        assert!(!budget.try_begin());
        budget.finish_skipped();

        budget.finish_counted();
        budget.finish_counted();
        assert_eq!(budget.outcome(), None);
        budget.finish_counted();

        assert_eq!(budget.outcome(), Some(BudgetOutcome::Exhausted));
        assert_eq!(budget.completed(), 3);
    }

    #[test]
    fn drained_frontier_opens_the_gate() {
        let budget = EvaluationBudget::new(10);
        budget.task_submitted();
        assert!(budget.try_begin());
        budget.finish_counted();

        assert_eq!(budget.outcome(), Some(BudgetOutcome::FrontierExhausted));
        assert_eq!(
            budget.wait_timeout(Duration::from_millis(1)),
            Some(BudgetOutcome::FrontierExhausted)
        );
    }

    #[test]
    fn grants_extend_an_open_budget() {
        let budget = EvaluationBudget::new(1);
        budget.task_submitted();
        budget.task_submitted();
        assert!(budget.try_begin());
        assert!(budget.grant(1));
        assert!(budget.try_begin());
        assert_eq!(budget.remaining(), 0);

        budget.finish_counted();
        budget.finish_counted();
        assert_eq!(budget.outcome(), Some(BudgetOutcome::Exhausted));
        assert!(!budget.grant(5));
    }

    #[test]
    fn waiter_wakes_when_last_task_completes() {
        let budget = std::sync::Arc::new(EvaluationBudget::new(1));
        budget.task_submitted();
        assert!(budget.try_begin());

        let worker = {
            let budget = std::sync::Arc::clone(&budget);
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(20));
                budget.finish_counted();
            })
        };

        let mut outcome = None;
        while outcome.is_none() {
            outcome = budget.wait_timeout(Duration::from_millis(50));
        }
        worker.join().unwrap();
        assert_eq!(outcome, Some(BudgetOutcome::Exhausted));
    }
}
