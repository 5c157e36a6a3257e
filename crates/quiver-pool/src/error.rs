//! Pool errors.

use quiver_extension::ExtensionError;

/// Failures raised at task submission or pool construction.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    /// Workers and queue are both saturated. Carries a state snapshot
    /// taken at rejection time.
    #[error(
        "thread pool `{name}` is exhausted: pool size {pool_size} (max {max_size}), \
         {submitted} tasks in flight, {queued} queued"
    )]
    Exhausted {
        /// Pool name.
        name: String,
        /// Workers alive at rejection.
        pool_size: usize,
        /// Configured worker ceiling.
        max_size: usize,
        /// Tasks accepted and unfinished.
        submitted: usize,
        /// Tasks waiting in the queue.
        queued: usize,
    },

    /// The pool no longer admits tasks.
    #[error("thread pool `{name}` is shut down")]
    ShutDown {
        /// Pool name.
        name: String,
    },

    /// Resolving the pool extension failed.
    #[error(transparent)]
    Extension(#[from] ExtensionError),
}
