//! # Quiver Pool
//!
//! Worker pools for request handling, exposed as the `threadpool`
//! extension capability.
//!
//! The interesting piece is the eager pool: a standard bounded pool only
//! grows past its core size after the queue refuses a task, so under
//! burst load tasks queue behind busy workers while the pool sits below
//! its ceiling. [`ExecutionPool`] with [`QueuePolicy::Eager`] inverts
//! that: while growth is still possible the queue refuses admission on
//! purpose, the pool starts a worker, and only at max size does honest
//! queueing resume. Rejection is synchronous and carries a pool-state
//! snapshot.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod executor;
mod queue;
mod thread_pool;

pub use crate::error::PoolError;
pub use crate::executor::{ExecutionPool, PoolConfig};
pub use crate::queue::{QueueCapacity, QueuePolicy};
pub use crate::thread_pool::{
    ALIVE_KEY, CORE_THREADS_KEY, DEFAULT_ALIVE_MS, DEFAULT_CORE_THREADS, DEFAULT_THREAD_NAME,
    DEFAULT_THREADS, EagerThreadPool, FixedThreadPool, QUEUES_KEY, THREAD_NAME_KEY,
    THREAD_POOL_DESCRIPTORS, THREADS_KEY, ThreadPool, install_defaults, thread_pool_catalog,
};
