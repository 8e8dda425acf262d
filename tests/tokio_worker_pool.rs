// tests/tokio_worker_pool.rs

mod common;
use crate::common::{init_tracing, prop, ScriptedNode};

use std::error::Error;
use std::sync::Arc;

use tokio::time::{sleep, Duration};

use dds::config::SchedulerConfig;
use dds::engine::DeferredScheduler;
use dds::exec::{StageResult, TokioWorkerPool};
use dds::{DependencyUnit, PropertyWait};
use dds_test_utils::{with_timeout, FakePropertyPool};

type TestResult = Result<(), Box<dyn Error>>;

fn scheduler_on(workers: Arc<TokioWorkerPool>, pool: Arc<FakePropertyPool>) -> DeferredScheduler {
    DeferredScheduler::builder(SchedulerConfig::default().with_name("tokio"))
        .worker_pool(workers)
        .pipeline_pool(pool)
        .build()
        .expect("scheduler should build")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stages_run_on_blocking_workers_and_chain() -> TestResult {
    init_tracing();
    let workers = Arc::new(TokioWorkerPool::current("tokio-test")?);
    let pool = FakePropertyPool::new(0);
    let scheduler = scheduler_on(workers.clone(), pool.clone());
    let y = prop(2);
    let node = ScriptedNode::new("N", 0)
        .on_stage(
            1,
            StageResult::then([DependencyUnit::new(2).wait_property(PropertyWait::current(y, 0))]),
        )
        .build();

    scheduler.add_deferred(node.clone(), 1, DependencyUnit::new(1))?;
    scheduler.dispatch_ready();

    with_timeout(async {
        while scheduler.stats().deferred == 0 {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert_eq!(node.stages_run(), vec![1]);

    pool.publish(1, y);
    with_timeout(async {
        while node.call_count() < 2 {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await;

    assert_eq!(node.stages_run(), vec![1, 2]);
    assert_eq!(workers.posted(), 2);
    Ok(())
}

#[tokio::test]
async fn closed_pool_rejects_posts() -> TestResult {
    init_tracing();
    let workers = Arc::new(TokioWorkerPool::current("closed")?);
    let pool = FakePropertyPool::new(0);
    let scheduler = scheduler_on(workers.clone(), pool);
    let node = ScriptedNode::new("N", 0).build();

    workers.close();
    assert!(workers.is_closed());

    scheduler.add_deferred(node.clone(), 1, DependencyUnit::new(1))?;
    assert_eq!(scheduler.dispatch_ready(), 1);

    assert_eq!(workers.posted(), 0);
    assert!(scheduler.stats().is_idle());
    sleep(Duration::from_millis(20)).await;
    assert_eq!(node.call_count(), 0);
    Ok(())
}

#[test]
fn pool_needs_a_runtime() {
    init_tracing();
    assert!(TokioWorkerPool::current("none").is_err());
}
