//! Pool behavior under load: eager growth, direct handoff, rejection,
//! panic safety, expiry, and the extension capability.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use pretty_assertions::assert_eq;
use quiver_core::ServiceUrl;
use quiver_extension::ExtensionContext;
use quiver_pool::{
    ExecutionPool, PoolConfig, PoolError, QueueCapacity, QueuePolicy, ThreadPool,
    install_defaults,
};

/// Holds tasks until opened, so tests control exactly how many workers
/// are busy.
struct Gate {
    open: Mutex<bool>,
    released: Condvar,
}

impl Gate {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            open: Mutex::new(false),
            released: Condvar::new(),
        })
    }

    fn wait(&self) {
        let mut open = self.open.lock();
        while !*open {
            self.released.wait(&mut open);
        }
    }

    fn open(&self) {
        *self.open.lock() = true;
        self.released.notify_all();
    }
}

fn wait_until(what: &str, condition: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        std::thread::sleep(Duration::from_millis(5));
    }
}

fn blocker(
    gate: &Arc<Gate>,
    started: &Arc<AtomicUsize>,
    completed: &Arc<AtomicUsize>,
) -> impl FnOnce() + Send + 'static {
    let gate = gate.clone();
    let started = started.clone();
    let completed = completed.clone();
    move || {
        started.fetch_add(1, Ordering::SeqCst);
        gate.wait();
        completed.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn eager_pool_grows_to_max_before_queueing_then_rejects() {
    let pool = ExecutionPool::new(PoolConfig {
        name: "eager-test".to_owned(),
        core_size: 1,
        max_size: 2,
        keep_alive: Duration::from_secs(5),
        capacity: QueueCapacity::Bounded(1),
        policy: QueuePolicy::Eager,
    });
    let gate = Gate::new();
    let started = Arc::new(AtomicUsize::new(0));
    let completed = Arc::new(AtomicUsize::new(0));

    pool.execute(blocker(&gate, &started, &completed)).unwrap();
    wait_until("first worker busy", || started.load(Ordering::SeqCst) == 1);
    assert_eq!(pool.pool_size(), 1);

    // Core worker busy, room to grow: the second task forces a worker
    // instead of queueing.
    pool.execute(blocker(&gate, &started, &completed)).unwrap();
    wait_until("second worker busy", || started.load(Ordering::SeqCst) == 2);
    assert_eq!(pool.pool_size(), 2);
    assert_eq!(pool.queued_count(), 0);

    // At max size queueing resumes.
    pool.execute(blocker(&gate, &started, &completed)).unwrap();
    assert_eq!(pool.queued_count(), 1);
    assert_eq!(pool.pool_size(), 2);

    // Workers and queue both full: synchronous rejection with a snapshot.
    let error = pool
        .execute(blocker(&gate, &started, &completed))
        .unwrap_err();
    match error {
        PoolError::Exhausted {
            pool_size,
            max_size,
            queued,
            ..
        } => {
            assert_eq!(pool_size, 2);
            assert_eq!(max_size, 2);
            assert_eq!(queued, 1);
        }
        other => panic!("expected Exhausted, got {other}"),
    }

    gate.open();
    wait_until("accepted tasks drain", || pool.submitted_count() == 0);
    assert_eq!(completed.load(Ordering::SeqCst), 3);
}

#[test]
fn fixed_pool_rejects_once_all_workers_are_busy() {
    let url = ServiceUrl::new("injvm", "localhost", None, "svc")
        .with_parameter("threads", "2")
        .with_parameter("threadname", "fixed-test");
    let pool = quiver_pool::FixedThreadPool.executor(&url).unwrap();
    let gate = Gate::new();
    let started = Arc::new(AtomicUsize::new(0));
    let completed = Arc::new(AtomicUsize::new(0));

    pool.execute(blocker(&gate, &started, &completed)).unwrap();
    pool.execute(blocker(&gate, &started, &completed)).unwrap();
    wait_until("both workers busy", || started.load(Ordering::SeqCst) == 2);
    assert_eq!(pool.pool_size(), 2);

    // No queue on a fixed pool by default: direct handoff or rejection.
    let error = pool
        .execute(blocker(&gate, &started, &completed))
        .unwrap_err();
    assert!(matches!(error, PoolError::Exhausted { .. }), "{error}");

    gate.open();
    wait_until("accepted tasks drain", || pool.submitted_count() == 0);
    assert_eq!(completed.load(Ordering::SeqCst), 2);
}

#[test]
fn panicking_task_releases_its_submission_slot() {
    let pool = ExecutionPool::new(PoolConfig {
        name: "panic-test".to_owned(),
        core_size: 1,
        max_size: 1,
        keep_alive: Duration::from_secs(5),
        capacity: QueueCapacity::Bounded(4),
        policy: QueuePolicy::Eager,
    });
    pool.execute(|| panic!("task blew up")).unwrap();
    wait_until("panicked task accounted", || pool.submitted_count() == 0);

    let completed = Arc::new(AtomicUsize::new(0));
    let count = completed.clone();
    pool.execute(move || {
        count.fetch_add(1, Ordering::SeqCst);
    })
    .unwrap();
    wait_until("follow-up task runs", || {
        completed.load(Ordering::SeqCst) == 1
    });
    // The worker survived the panic.
    assert_eq!(pool.pool_size(), 1);
}

#[test]
fn shutdown_stops_new_admissions() {
    let pool = ExecutionPool::new(PoolConfig {
        name: "shutdown-test".to_owned(),
        core_size: 1,
        max_size: 1,
        keep_alive: Duration::from_secs(5),
        capacity: QueueCapacity::Unbounded,
        policy: QueuePolicy::Fifo,
    });
    pool.shutdown();
    assert!(pool.is_shutdown());
    let error = pool.execute(|| {}).unwrap_err();
    assert!(matches!(error, PoolError::ShutDown { .. }), "{error}");
}

#[test]
fn surplus_workers_expire_after_keep_alive() {
    let pool = ExecutionPool::new(PoolConfig {
        name: "expire-test".to_owned(),
        core_size: 0,
        max_size: 1,
        keep_alive: Duration::from_millis(50),
        capacity: QueueCapacity::Bounded(1),
        policy: QueuePolicy::Eager,
    });
    pool.execute(|| {}).unwrap();
    wait_until("task finishes", || pool.submitted_count() == 0);
    wait_until("idle worker expires", || pool.pool_size() == 0);
}

#[test]
fn adaptive_capability_builds_the_pool_named_on_the_url() {
    let context = ExtensionContext::new();
    install_defaults(&context).unwrap();
    let registry = context.registry::<dyn ThreadPool>().unwrap();

    // No `threadpool` parameter: the capability default applies.
    let plain = ServiceUrl::new("injvm", "localhost", None, "svc");
    assert_eq!(registry.resolve_adaptive_name(&plain).unwrap(), "fixed");

    let url = plain
        .with_parameter("threadpool", "eager")
        .with_parameter("corethreads", "1")
        .with_parameter("threads", "2")
        .with_parameter("queues", "4");
    let adaptive = registry.adaptive().unwrap();
    let pool = adaptive.executor(&url).unwrap();

    let completed = Arc::new(AtomicUsize::new(0));
    let count = completed.clone();
    pool.execute(move || {
        count.fetch_add(1, Ordering::SeqCst);
    })
    .unwrap();
    wait_until("task runs", || completed.load(Ordering::SeqCst) == 1);
}
