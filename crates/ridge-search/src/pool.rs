//! Fixed-size worker pool fed by a bounded priority queue.
//!
//! Workers always take the highest-priority queued job. Jobs receive a
//! [`Spawner`] so they can enqueue follow-up jobs into the same pool, which is
//! how the frontier search fans out.

use parking_lot::{Condvar, Mutex};
use ridge_types::{config_error, RidgeError, RidgeResult};
use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, error};

/// A unit of pool work.
pub type Job = Box<dyn FnOnce(&Spawner) + Send + 'static>;

struct QueuedJob {
    priority: f64,
    seq: u64,
    job: Job,
}

impl PartialEq for QueuedJob {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == CmpOrdering::Equal
    }
}

impl Eq for QueuedJob {}

impl PartialOrd for QueuedJob {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedJob {
    // Max-heap: higher priority first, then earlier submission.
    fn cmp(&self, other: &Self) -> CmpOrdering {
        self.priority
            .total_cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Default)]
struct QueueState {
    heap: BinaryHeap<QueuedJob>,
    next_seq: u64,
    shutdown: bool,
    blocked_workers: usize,
    /// Jobs taken by workers so far.
    pops: u64,
    /// A worker was admitted over capacity and the queue has not dropped
    /// back below it since.
    overflowing: bool,
}

struct Shared {
    label: String,
    capacity: usize,
    workers: usize,
    state: Mutex<QueueState>,
    not_empty: Condvar,
    not_full: Condvar,
    completed: AtomicUsize,
    panicked: AtomicUsize,
}

/// Handle for submitting jobs.
///
/// Submissions block while the queue is full. A spawner handed to a running
/// job is marked as a worker spawner: if every other worker is already
/// blocked on a full queue, it is admitted over capacity instead of
/// blocking, so the pool cannot stall with all workers waiting to push.
/// While workers are overflowing the queue this way, an external submitter
/// waits for at most one job to be taken before it is admitted too, so
/// seeds are not starved by a frontier that keeps refilling the queue.
#[derive(Clone)]
pub struct Spawner {
    shared: Arc<Shared>,
    in_worker: bool,
}

impl Spawner {
    pub fn submit<F>(&self, priority: f64, job: F) -> RidgeResult<()>
    where
        F: FnOnce(&Spawner) + Send + 'static,
    {
        let shared = &self.shared;
        let mut state = shared.state.lock();
        let ticket = state.pops;
        loop {
            if state.shutdown {
                return Err(RidgeError::PoolShutdown);
            }
            if state.heap.len() < shared.capacity {
                break;
            }
            if self.in_worker {
                if state.blocked_workers + 1 >= shared.workers {
                    state.overflowing = true;
                    break;
                }
                state.blocked_workers += 1;
                shared.not_full.wait(&mut state);
                state.blocked_workers -= 1;
            } else if state.overflowing && state.pops != ticket {
                break;
            } else {
                shared.not_full.wait(&mut state);
            }
        }

        let seq = state.next_seq;
        state.next_seq += 1;
        state.heap.push(QueuedJob {
            priority,
            seq,
            job: Box::new(job),
        });
        shared.not_empty.notify_one();
        Ok(())
    }

    pub fn is_shutdown(&self) -> bool {
        self.shared.state.lock().shutdown
    }
}

/// Priority-ordered thread pool (core size == max size, no idle timeout).
pub struct PriorityWorkerPool {
    shared: Arc<Shared>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl PriorityWorkerPool {
    pub fn new(label: impl Into<String>, threads: usize, capacity: usize) -> RidgeResult<Self> {
        if threads == 0 {
            return Err(config_error!("Invalid thread count: {}", threads));
        }
        if capacity == 0 {
            return Err(config_error!("Queue capacity must be positive"));
        }

        let shared = Arc::new(Shared {
            label: label.into(),
            capacity,
            workers: threads,
            state: Mutex::new(QueueState::default()),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            completed: AtomicUsize::new(0),
            panicked: AtomicUsize::new(0),
        });

        let mut handles = Vec::with_capacity(threads);
        for i in 0..threads {
            let worker_shared = Arc::clone(&shared);
            let handle = std::thread::Builder::new()
                .name(format!("{}-worker-{}", shared.label, i))
                .spawn(move || worker_loop(worker_shared))
                .map_err(|e| config_error!("Failed to spawn worker thread: {}", e))?;
            handles.push(handle);
        }

        Ok(Self {
            shared,
            handles: Mutex::new(handles),
        })
    }

    /// Spawner for callers outside the pool.
    pub fn spawner(&self) -> Spawner {
        Spawner {
            shared: Arc::clone(&self.shared),
            in_worker: false,
        }
    }

    pub fn submit<F>(&self, priority: f64, job: F) -> RidgeResult<()>
    where
        F: FnOnce(&Spawner) + Send + 'static,
    {
        self.spawner().submit(priority, job)
    }

    /// Stop accepting work, discard queued jobs and wake every blocked
    /// thread. Running jobs finish on their own. Returns the number of
    /// discarded jobs.
    pub fn shutdown_now(&self) -> usize {
        let discarded: Vec<QueuedJob> = {
            let mut state = self.shared.state.lock();
            if state.shutdown {
                return 0;
            }
            state.shutdown = true;
            state.heap.drain().collect()
        };
        self.shared.not_empty.notify_all();
        self.shared.not_full.notify_all();
        debug!(pool = %self.shared.label, discarded = discarded.len(), "pool shut down");
        // Jobs may own resources with non-trivial drops; release them unlocked.
        let count = discarded.len();
        drop(discarded);
        count
    }

    pub fn is_shutdown(&self) -> bool {
        self.shared.state.lock().shutdown
    }

    /// Wait for every worker thread to exit. Call after [`shutdown_now`].
    ///
    /// [`shutdown_now`]: PriorityWorkerPool::shutdown_now
    pub fn join(&self) {
        let handles: Vec<JoinHandle<()>> = self.handles.lock().drain(..).collect();
        let current = std::thread::current().id();
        for handle in handles {
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                error!(pool = %self.shared.label, "worker thread terminated abnormally");
            }
        }
    }

    pub fn threads(&self) -> usize {
        self.shared.workers
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    pub fn queued(&self) -> usize {
        self.shared.state.lock().heap.len()
    }

    /// Jobs that ran to completion (including ones that panicked).
    pub fn completed(&self) -> usize {
        self.shared.completed.load(Ordering::SeqCst)
    }

    pub fn panicked(&self) -> usize {
        self.shared.panicked.load(Ordering::SeqCst)
    }
}

impl Drop for PriorityWorkerPool {
    fn drop(&mut self) {
        self.shutdown_now();
        self.join();
    }
}

fn worker_loop(shared: Arc<Shared>) {
    let spawner = Spawner {
        shared: Arc::clone(&shared),
        in_worker: true,
    };

    loop {
        let job = {
            let mut state = shared.state.lock();
            loop {
                if state.shutdown {
                    return;
                }
                if let Some(queued) = state.heap.pop() {
                    state.pops += 1;
                    if state.heap.len() < shared.capacity {
                        state.overflowing = false;
                    }
                    // Blocked workers and external submitters share the
                    // condvar; wake them all so neither kind is skipped.
                    shared.not_full.notify_all();
                    break queued.job;
                }
                shared.not_empty.wait(&mut state);
            }
        };

        if catch_unwind(AssertUnwindSafe(|| job(&spawner))).is_err() {
            shared.panicked.fetch_add(1, Ordering::SeqCst);
            error!(pool = %shared.label, "job panicked; worker continues");
        }
        shared.completed.fetch_add(1, Ordering::SeqCst);
    }
}
