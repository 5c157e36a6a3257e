//! The task queue that cooperates with (or deliberately refuses) the
//! pool.
//!
//! A standard pool only grows past its core size once the queue rejects a
//! task. The eager policy exploits that: while the pool can still grow,
//! `offer` *lies* and refuses admission even though there is room, forcing
//! the pool to start a worker instead of queueing behind busy ones. Only
//! at max size does it fall back to honest queueing.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

pub(crate) type Task = Box<dyn FnOnce() + Send + 'static>;

/// How many tasks the queue may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueCapacity {
    /// No buffering: admission succeeds only when a worker is already
    /// waiting to take the task.
    Direct,
    /// No limit.
    Unbounded,
    /// At most this many queued tasks.
    Bounded(usize),
}

/// Admission policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueuePolicy {
    /// Honest queueing: admit whenever capacity allows.
    Fifo,
    /// Refuse admission while the pool can still grow, so bursts start
    /// workers instead of queueing.
    Eager,
}

/// What `offer` decided.
///
/// The refused variants hand the task back so the caller can route it: a
/// growth refusal should become a new worker, a full queue becomes a
/// rejection after one last plain retry.
pub(crate) enum OfferOutcome {
    Queued,
    RefusedForGrowth(Task),
    Full(Task),
}

struct QueueState {
    tasks: VecDeque<Task>,
    /// Workers currently blocked in `take`. Read by `Direct` admission.
    idle_workers: usize,
}

pub(crate) struct TaskQueue {
    capacity: QueueCapacity,
    policy: QueuePolicy,
    state: Mutex<QueueState>,
    available: Condvar,
}

impl TaskQueue {
    pub(crate) fn new(capacity: QueueCapacity, policy: QueuePolicy) -> Self {
        Self {
            capacity,
            policy,
            state: Mutex::new(QueueState {
                tasks: VecDeque::new(),
                idle_workers: 0,
            }),
            available: Condvar::new(),
        }
    }

    /// Admission check at submission time. `submitted` counts tasks
    /// accepted but not finished; `workers` and `max_workers` are the
    /// pool's current and maximum size. The three reads are not one
    /// atomic snapshot; concurrent producers may each pick the milder
    /// route, which costs a little eagerness, never correctness.
    pub(crate) fn offer(
        &self,
        task: Task,
        submitted: usize,
        workers: usize,
        max_workers: usize,
    ) -> OfferOutcome {
        match self.policy {
            QueuePolicy::Fifo => self.plain_offer(task),
            QueuePolicy::Eager => {
                if submitted < workers {
                    // Spare workers exist; queueing is cheap.
                    return self.plain_offer(task);
                }
                if workers < max_workers {
                    return OfferOutcome::RefusedForGrowth(task);
                }
                self.plain_offer(task)
            }
        }
    }

    /// Capacity-honest admission, used directly for the final retry after
    /// a failed growth attempt.
    pub(crate) fn plain_offer(&self, task: Task) -> OfferOutcome {
        let mut state = self.state.lock();
        let admit = match self.capacity {
            QueueCapacity::Direct => state.idle_workers > state.tasks.len(),
            QueueCapacity::Unbounded => true,
            QueueCapacity::Bounded(limit) => state.tasks.len() < limit,
        };
        if !admit {
            return OfferOutcome::Full(task);
        }
        state.tasks.push_back(task);
        drop(state);
        self.available.notify_one();
        OfferOutcome::Queued
    }

    /// Blocking take. `keep_alive` of `None` waits indefinitely; `Some`
    /// returns `None` once the wait times out with nothing to do. Returns
    /// `None` on shutdown once the queue is drained.
    pub(crate) fn take(&self, keep_alive: Option<Duration>, shutdown: &AtomicBool) -> Option<Task> {
        let mut state = self.state.lock();
        loop {
            if let Some(task) = state.tasks.pop_front() {
                return Some(task);
            }
            if shutdown.load(Ordering::SeqCst) {
                return None;
            }
            state.idle_workers += 1;
            let timed_out = match keep_alive {
                Some(duration) => self
                    .available
                    .wait_for(&mut state, duration)
                    .timed_out(),
                None => {
                    self.available.wait(&mut state);
                    false
                }
            };
            state.idle_workers -= 1;
            if timed_out && state.tasks.is_empty() {
                return None;
            }
        }
    }

    /// Wake every waiting worker, e.g. so they observe shutdown.
    pub(crate) fn wake_all(&self) {
        self.available.notify_all();
    }

    pub(crate) fn len(&self) -> usize {
        self.state.lock().tasks.len()
    }
}
