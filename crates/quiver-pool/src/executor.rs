//! The execution pool: worker threads, growth, and rejection.

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use crate::error::PoolError;
use crate::queue::{OfferOutcome, QueueCapacity, QueuePolicy, Task, TaskQueue};

/// Shape of an [`ExecutionPool`].
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Prefix for worker thread names.
    pub name: String,
    /// Workers kept alive even when idle.
    pub core_size: usize,
    /// Hard ceiling on workers.
    pub max_size: usize,
    /// How long a worker beyond the core size lingers idle before
    /// exiting.
    pub keep_alive: Duration,
    /// Queue capacity.
    pub capacity: QueueCapacity,
    /// Queue admission policy.
    pub policy: QueuePolicy,
}

struct PoolShared {
    config: PoolConfig,
    queue: TaskQueue,
    /// Workers alive right now.
    workers: AtomicUsize,
    /// Tasks accepted and not yet finished. Decremented after the task
    /// runs, panic or not.
    submitted: AtomicUsize,
    shutdown: AtomicBool,
    next_worker_id: AtomicUsize,
}

/// A pool of worker threads fed through a [`TaskQueue`].
///
/// With [`QueuePolicy::Eager`] the pool grows to its max size under burst
/// load *before* queueing; with [`QueuePolicy::Fifo`] it behaves like a
/// conventional bounded pool.
pub struct ExecutionPool {
    shared: Arc<PoolShared>,
}

impl ExecutionPool {
    /// Build a pool. Workers start lazily with the first submissions.
    pub fn new(config: PoolConfig) -> Self {
        let queue = TaskQueue::new(config.capacity, config.policy);
        Self {
            shared: Arc::new(PoolShared {
                config,
                queue,
                workers: AtomicUsize::new(0),
                submitted: AtomicUsize::new(0),
                shutdown: AtomicBool::new(false),
                next_worker_id: AtomicUsize::new(1),
            }),
        }
    }

    /// Submit one task.
    ///
    /// Rejection is synchronous: the caller learns immediately that the
    /// pool and queue are both saturated, with a snapshot of the pool's
    /// state in the error.
    pub fn execute(&self, task: impl FnOnce() + Send + 'static) -> Result<(), PoolError> {
        let shared = &self.shared;
        if shared.shutdown.load(Ordering::SeqCst) {
            return Err(PoolError::ShutDown {
                name: shared.config.name.clone(),
            });
        }
        shared.submitted.fetch_add(1, Ordering::SeqCst);
        match self.dispatch(Box::new(task)) {
            Ok(()) => Ok(()),
            // The pool refused to grow; give the queue one honest retry
            // before rejecting.
            Err(task) => match shared.queue.plain_offer(task) {
                OfferOutcome::Queued => Ok(()),
                OfferOutcome::Full(_) | OfferOutcome::RefusedForGrowth(_) => {
                    shared.submitted.fetch_sub(1, Ordering::SeqCst);
                    let error = PoolError::Exhausted {
                        name: shared.config.name.clone(),
                        pool_size: shared.workers.load(Ordering::SeqCst),
                        max_size: shared.config.max_size,
                        submitted: shared.submitted.load(Ordering::SeqCst),
                        queued: shared.queue.len(),
                    };
                    tracing::warn!(%error, "task rejected");
                    Err(error)
                }
            },
        }
    }

    /// Workers alive right now.
    pub fn pool_size(&self) -> usize {
        self.shared.workers.load(Ordering::SeqCst)
    }

    /// Tasks accepted and not yet finished.
    pub fn submitted_count(&self) -> usize {
        self.shared.submitted.load(Ordering::SeqCst)
    }

    /// Tasks waiting in the queue.
    pub fn queued_count(&self) -> usize {
        self.shared.queue.len()
    }

    /// Stop admitting tasks. Queued tasks still run; idle workers wake up
    /// and exit.
    pub fn shutdown(&self) {
        self.shared.shutdown.store(true, Ordering::SeqCst);
        self.shared.queue.wake_all();
    }

    /// Whether [`shutdown`](Self::shutdown) has been called.
    pub fn is_shutdown(&self) -> bool {
        self.shared.shutdown.load(Ordering::SeqCst)
    }

    /// Route one accepted task: grow to core, offer to the queue, grow to
    /// max. Hands the task back if all three fail.
    fn dispatch(&self, task: Task) -> Result<(), Task> {
        let shared = &self.shared;
        let mut task = task;
        if shared.workers.load(Ordering::SeqCst) < shared.config.core_size {
            match spawn_worker(shared, Some(task), shared.config.core_size) {
                Ok(()) => return Ok(()),
                Err(returned) => task = returned,
            }
        }
        let outcome = shared.queue.offer(
            task,
            shared.submitted.load(Ordering::SeqCst),
            shared.workers.load(Ordering::SeqCst),
            shared.config.max_size,
        );
        match outcome {
            OfferOutcome::Queued => {
                // A queued task needs at least one worker to ever run.
                if shared.workers.load(Ordering::SeqCst) == 0 {
                    let _ = spawn_worker(shared, None, shared.config.max_size);
                }
                Ok(())
            }
            OfferOutcome::RefusedForGrowth(task) | OfferOutcome::Full(task) => {
                spawn_worker(shared, Some(task), shared.config.max_size)
            }
        }
    }
}

/// Start one worker if the count is still below `limit`, seeding it with
/// `first`. Returns the task when the pool is already at the limit.
fn spawn_worker(shared: &Arc<PoolShared>, first: Option<Task>, limit: usize) -> Result<(), Task> {
    loop {
        let current = shared.workers.load(Ordering::SeqCst);
        if current >= limit {
            return match first {
                Some(task) => Err(task),
                None => Ok(()),
            };
        }
        if shared
            .workers
            .compare_exchange(current, current + 1, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            break;
        }
    }
    let id = shared.next_worker_id.fetch_add(1, Ordering::SeqCst);
    let name = format!("{}-{id}", shared.config.name);
    let handle = Arc::clone(shared);
    // The seed task sits in a shared slot so a failed spawn can take
    // it back instead of dropping it.
    let seed = Arc::new(parking_lot::Mutex::new(first));
    let worker_seed = seed.clone();
    let spawned = std::thread::Builder::new()
        .name(name.clone())
        .spawn(move || worker_loop(&handle, worker_seed.lock().take()));
    match spawned {
        Ok(_) => Ok(()),
        Err(error) => {
            shared.workers.fetch_sub(1, Ordering::SeqCst);
            tracing::error!(worker = %name, %error, "failed to spawn pool worker");
            match seed.lock().take() {
                Some(task) => Err(task),
                None => Ok(()),
            }
        }
    }
}

fn worker_loop(shared: &Arc<PoolShared>, mut first: Option<Task>) {
    loop {
        let task = match first.take() {
            Some(task) => Some(task),
            None => {
                let keep_alive =
                    if shared.workers.load(Ordering::SeqCst) > shared.config.core_size {
                        Some(shared.config.keep_alive)
                    } else {
                        None
                    };
                shared.queue.take(keep_alive, &shared.shutdown)
            }
        };
        let Some(task) = task else { break };
        let outcome = std::panic::catch_unwind(AssertUnwindSafe(task));
        // Unconditional: a panicking task must not leak a submission.
        shared.submitted.fetch_sub(1, Ordering::SeqCst);
        if outcome.is_err() {
            tracing::error!(
                pool = shared.config.name,
                "task panicked; worker continues"
            );
        }
    }
    exit_worker(shared);
}

/// Worker exit. A producer that observed this worker's count can have
/// queued a task after the worker's final empty-queue check in `take`;
/// re-check after the decrement and leave a replacement behind so an
/// accepted task never waits for an unrelated later submission.
fn exit_worker(shared: &Arc<PoolShared>) {
    shared.workers.fetch_sub(1, Ordering::SeqCst);
    if !shared.shutdown.load(Ordering::SeqCst) && shared.queue.len() > 0 {
        let _ = spawn_worker(shared, None, shared.config.max_size);
    }
}

impl Drop for ExecutionPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for ExecutionPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionPool")
            .field("name", &self.shared.config.name)
            .field("workers", &self.pool_size())
            .field("submitted", &self.submitted_count())
            .field("queued", &self.queued_count())
            .finish()
    }
}
