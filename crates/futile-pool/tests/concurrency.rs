//! Multi-threaded behaviour of the resource pool

use std::sync::Arc;
use std::sync::Once;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use futile_core::{ConnectParams, FutileError, Resource, Result, StatementResult};
use futile_pool::{PoolConfig, ProcessIdentity, ResourceFactory, ResourcePool};
use rstest::rstest;

fn initialize_logging() {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::from_default_env()
                    .add_directive("futile_pool=debug".parse().unwrap()),
            )
            .with_test_writer()
            .finish();

        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}

struct Conn {
    id: usize,
}

impl Resource for Conn {
    fn kind(&self) -> &str {
        "test"
    }

    fn execute(&self, _statement: &str) -> Result<StatementResult> {
        Ok(StatementResult::affected(0))
    }

    fn begin(&self) -> Result<()> {
        Ok(())
    }

    fn commit(&self) -> Result<()> {
        Ok(())
    }

    fn rollback(&self) -> Result<()> {
        Ok(())
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }

    fn is_closed(&self) -> bool {
        false
    }
}

#[derive(Default)]
struct CountingFactory {
    created: AtomicUsize,
    closed: AtomicUsize,
}

impl ResourceFactory for CountingFactory {
    type Resource = Conn;

    fn create(&self, _params: &ConnectParams) -> Result<Conn> {
        // Creation is slow enough for threads to pile up behind it.
        thread::sleep(Duration::from_millis(1));
        Ok(Conn {
            id: self.created.fetch_add(1, Ordering::SeqCst),
        })
    }

    fn close(&self, _resource: &Conn) -> Result<()> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct SwitchablePid(AtomicU32);

impl ProcessIdentity for SwitchablePid {
    fn current_pid(&self) -> u32 {
        self.0.load(Ordering::SeqCst)
    }
}

fn pool(config: PoolConfig) -> ResourcePool<CountingFactory> {
    initialize_logging();
    ResourcePool::new(config, CountingFactory::default())
}

#[rstest]
#[case(1, 8)]
#[case(4, 16)]
#[case(8, 8)]
fn held_resources_never_exceed_max_size(#[case] max_size: usize, #[case] threads: usize) {
    let pool = pool(PoolConfig::new(max_size).with_acquire_timeout_ms(10_000));
    let held = AtomicUsize::new(0);
    let peak = AtomicUsize::new(0);

    thread::scope(|scope| {
        for _ in 0..threads {
            scope.spawn(|| {
                for _ in 0..50 {
                    let conn = pool.acquire().expect("acquire");
                    let now = held.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    thread::yield_now();
                    held.fetch_sub(1, Ordering::SeqCst);
                    pool.release(conn);
                }
            });
        }
    });

    assert!(peak.load(Ordering::SeqCst) <= max_size);
    assert!(pool.factory().created.load(Ordering::SeqCst) <= max_size);

    let stats = pool.stats();
    assert_eq!(stats.active(), 0);
    assert_eq!(stats.waiting(), 0);
    assert_eq!(stats.idle() + stats.vacant(), max_size);
}

#[test]
fn sequential_use_creates_a_single_resource() {
    let pool = pool(PoolConfig::new(10));

    for _ in 0..100 {
        let conn = pool.get().expect("get");
        conn.execute("SELECT 1").expect("execute");
    }

    assert_eq!(pool.factory().created.load(Ordering::SeqCst), 1);
}

#[rstest]
#[case(0)]
#[case(50)]
#[case(200)]
fn acquire_times_out_after_deadline(#[case] timeout_ms: u64) {
    let pool = pool(PoolConfig::new(1));
    let _held = pool.acquire().expect("acquire");

    let timeout = Duration::from_millis(timeout_ms);
    let started = Instant::now();
    let err = thread::scope(|scope| {
        scope
            .spawn(|| pool.acquire_timeout(timeout))
            .join()
            .expect("join")
            .unwrap_err()
    });
    let elapsed = started.elapsed();

    assert!(matches!(
        err,
        FutileError::PoolExhausted { max_size: 1, timeout: t } if t == timeout
    ));
    assert!(elapsed >= timeout, "returned after {:?}", elapsed);
    assert!(
        elapsed < timeout + Duration::from_millis(500),
        "returned after {:?}",
        elapsed
    );
}

#[test]
fn release_wakes_a_blocked_acquire() {
    let pool = pool(PoolConfig::new(1));
    let held = pool.acquire().expect("acquire");
    let held_id = held.id;

    thread::scope(|scope| {
        let waiter = scope.spawn(|| {
            let started = Instant::now();
            let conn = pool.acquire_timeout(Duration::from_secs(5)).expect("acquire");
            (conn.id, started.elapsed())
        });

        while pool.stats().waiting() == 0 {
            thread::yield_now();
        }
        thread::sleep(Duration::from_millis(20));
        pool.release(held);

        let (id, waited) = waiter.join().expect("join");
        assert_eq!(id, held_id);
        assert!(waited < Duration::from_secs(5));
    });
}

#[test]
fn concurrent_acquire_after_fork_resets_once() {
    initialize_logging();
    let process = Arc::new(SwitchablePid(AtomicU32::new(100)));
    let pool = ResourcePool::with_identity(
        PoolConfig::new(4),
        CountingFactory::default(),
        process.clone(),
    );

    let parent_conns: Vec<_> = (0..4).map(|_| pool.acquire().expect("acquire")).collect();
    let parent_ids: Vec<usize> = parent_conns.iter().map(|c| c.id).collect();
    for conn in parent_conns.into_iter().take(2) {
        pool.release(conn);
    }

    process.0.store(200, Ordering::SeqCst);

    let child_ids: Vec<usize> = thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                scope.spawn(|| {
                    let conn = pool.acquire().expect("acquire");
                    assert_eq!(conn.owner().pid(), 200);
                    conn.id
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("join"))
            .collect()
    });

    assert!(child_ids.iter().all(|id| !parent_ids.contains(id)));
    assert_eq!(pool.stats().resets(), 1);
    assert_eq!(pool.factory().closed.load(Ordering::SeqCst), 0);
}

#[test]
fn creation_failures_under_contention_keep_capacity() {
    initialize_logging();

    struct FlakyFactory {
        calls: AtomicUsize,
    }

    impl ResourceFactory for FlakyFactory {
        type Resource = Conn;

        fn create(&self, _params: &ConnectParams) -> Result<Conn> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call % 2 == 0 {
                return Err(FutileError::ResourceCreation("handshake failed".into()));
            }
            Ok(Conn { id: call })
        }
    }

    let pool = ResourcePool::new(
        PoolConfig::new(3).with_acquire_timeout_ms(10_000),
        FlakyFactory {
            calls: AtomicUsize::new(0),
        },
    );

    thread::scope(|scope| {
        for _ in 0..6 {
            scope.spawn(|| {
                for _ in 0..20 {
                    match pool.acquire() {
                        Ok(conn) => pool.release(conn),
                        Err(err) => assert!(matches!(err, FutileError::ResourceCreation(_))),
                    }
                }
            });
        }
    });

    let stats = pool.stats();
    assert_eq!(stats.active(), 0);
    assert_eq!(stats.idle() + stats.vacant(), 3);
}
