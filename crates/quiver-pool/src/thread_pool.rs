//! The `threadpool` capability: URL-configured pool providers.

use std::sync::{Arc, Weak};
use std::time::Duration;

use quiver_core::ServiceUrl;
use quiver_extension::{
    ExtensionContext, ExtensionError, ExtensionRegistry, Extensible, ProviderCatalog,
};

use crate::error::PoolError;
use crate::executor::{ExecutionPool, PoolConfig};
use crate::queue::{QueueCapacity, QueuePolicy};

/// URL parameter: worker thread name prefix.
pub const THREAD_NAME_KEY: &str = "threadname";
/// URL parameter: core pool size.
pub const CORE_THREADS_KEY: &str = "corethreads";
/// URL parameter: maximum pool size.
pub const THREADS_KEY: &str = "threads";
/// URL parameter: queue capacity (`0` none, negative unbounded).
pub const QUEUES_KEY: &str = "queues";
/// URL parameter: keep-alive for surplus workers, in milliseconds.
pub const ALIVE_KEY: &str = "alive";

/// Default worker thread name prefix.
pub const DEFAULT_THREAD_NAME: &str = "Quiver";
/// Default fixed pool size.
pub const DEFAULT_THREADS: usize = 200;
/// Default eager core size.
pub const DEFAULT_CORE_THREADS: usize = 0;
/// Default keep-alive in milliseconds.
pub const DEFAULT_ALIVE_MS: u64 = 60_000;

/// Builds [`ExecutionPool`]s sized from a URL.
pub trait ThreadPool: Send + Sync {
    /// A pool configured from `url`'s parameters.
    fn executor(&self, url: &ServiceUrl) -> Result<Arc<ExecutionPool>, PoolError>;
}

impl Extensible for dyn ThreadPool {
    const CAPABILITY: &'static str = "threadpool";
    const INTERFACE: &'static str = "ThreadPool";
    const DEFAULT_NAME: Option<&'static str> = Some("fixed");
    const ADAPTIVE_KEYS: &'static [&'static str] = &["threadpool"];

    fn synthesize_adaptive(registry: &Arc<ExtensionRegistry<Self>>) -> Option<Arc<Self>> {
        Some(Arc::new(AdaptiveThreadPool {
            registry: Arc::downgrade(registry),
        }))
    }
}

struct AdaptiveThreadPool {
    registry: Weak<ExtensionRegistry<dyn ThreadPool>>,
}

impl ThreadPool for AdaptiveThreadPool {
    fn executor(&self, url: &ServiceUrl) -> Result<Arc<ExecutionPool>, PoolError> {
        let registry = self
            .registry
            .upgrade()
            .ok_or(ExtensionError::ContextDropped)?;
        let name = registry.resolve_adaptive_name(url)?;
        registry.get(&name)?.executor(url)
    }
}

fn pool_name(url: &ServiceUrl) -> String {
    url.parameter_or(THREAD_NAME_KEY, DEFAULT_THREAD_NAME).to_owned()
}

fn queue_capacity(url: &ServiceUrl, when_zero: QueueCapacity) -> QueueCapacity {
    match url.typed_parameter::<i64>(QUEUES_KEY).unwrap_or(0) {
        0 => when_zero,
        n if n < 0 => QueueCapacity::Unbounded,
        n => QueueCapacity::Bounded(n as usize),
    }
}

/// Fixed-size pool: core and max are the same, workers never expire.
#[derive(Debug, Default)]
pub struct FixedThreadPool;

impl ThreadPool for FixedThreadPool {
    fn executor(&self, url: &ServiceUrl) -> Result<Arc<ExecutionPool>, PoolError> {
        let threads = url
            .typed_parameter::<usize>(THREADS_KEY)
            .unwrap_or(DEFAULT_THREADS);
        Ok(Arc::new(ExecutionPool::new(PoolConfig {
            name: pool_name(url),
            core_size: threads,
            max_size: threads,
            keep_alive: Duration::ZERO,
            capacity: queue_capacity(url, QueueCapacity::Direct),
            policy: QueuePolicy::Fifo,
        })))
    }
}

/// Burst-growing pool: starts workers up to `threads` before queueing,
/// and lets surplus workers expire after `alive` milliseconds idle.
#[derive(Debug, Default)]
pub struct EagerThreadPool;

impl ThreadPool for EagerThreadPool {
    fn executor(&self, url: &ServiceUrl) -> Result<Arc<ExecutionPool>, PoolError> {
        let core = url
            .typed_parameter::<usize>(CORE_THREADS_KEY)
            .unwrap_or(DEFAULT_CORE_THREADS);
        let max = url
            .typed_parameter::<usize>(THREADS_KEY)
            .unwrap_or(usize::MAX);
        let alive = url
            .typed_parameter::<u64>(ALIVE_KEY)
            .unwrap_or(DEFAULT_ALIVE_MS);
        // The eager queue must be able to hold at least one task.
        let capacity = match queue_capacity(url, QueueCapacity::Bounded(1)) {
            QueueCapacity::Direct => QueueCapacity::Bounded(1),
            other => other,
        };
        Ok(Arc::new(ExecutionPool::new(PoolConfig {
            name: pool_name(url),
            core_size: core,
            max_size: max,
            keep_alive: Duration::from_millis(alive),
            capacity,
            policy: QueuePolicy::Eager,
        })))
    }
}

/// Builtin descriptor text for the `threadpool` capability.
pub const THREAD_POOL_DESCRIPTORS: &str = "\
fixed=quiver_pool::FixedThreadPool
eager=quiver_pool::EagerThreadPool
";

/// Catalog holding the builtin pool providers.
pub fn thread_pool_catalog() -> ProviderCatalog<dyn ThreadPool> {
    let mut catalog = ProviderCatalog::<dyn ThreadPool>::new();
    catalog.plain("quiver_pool::FixedThreadPool", |_| {
        Ok(Arc::new(FixedThreadPool))
    });
    catalog.plain("quiver_pool::EagerThreadPool", |_| {
        Ok(Arc::new(EagerThreadPool))
    });
    catalog
}

/// Install the `threadpool` capability with its builtin providers.
pub fn install_defaults(context: &Arc<ExtensionContext>) -> Result<(), ExtensionError> {
    context.install(thread_pool_catalog(), THREAD_POOL_DESCRIPTORS)
}
