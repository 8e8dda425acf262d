// tests/signal_pump.rs

mod common;
use crate::common::{init_tracing, prop, recording_callback, Harness, ScriptedNode};

use std::error::Error;

use dds::engine::{SchedulerEvent, SignalEvent, SignalPump};
use dds::signal::ExternalToken;
use dds::types::{FenceHandle, TokenId};
use dds::{DependencyUnit, PropertyWait};
use dds_test_utils::with_timeout;

type TestResult = Result<(), Box<dyn Error>>;

#[tokio::test]
async fn pump_applies_signals_until_shutdown() -> TestResult {
    init_tracing();
    let h = Harness::builder().without_fences().build();
    let node = ScriptedNode::new("N", 0).build();
    let x = prop(1);
    let fence = FenceHandle(11);
    let token = ExternalToken::external(TokenId(1));
    let (callback, seen) = recording_callback();

    h.scheduler.add_deferred(
        node.clone(),
        1,
        DependencyUnit::new(1).wait_property(PropertyWait::current(x, 0)),
    )?;
    h.scheduler.add_deferred(node.clone(), 1, DependencyUnit::new(2).wait_fence(fence))?;
    h.scheduler.wait_for_tokens(vec![token.clone()], callback, None)?;

    let (tx, pump) = SignalPump::channel(h.scheduler.clone(), 16);
    let handle = tokio::spawn(pump.run());

    tx.send(
        SignalEvent::Published {
            data: x,
            request: 1,
            pipeline: 0,
        }
        .into(),
    )
    .await?;
    tx.send(SignalEvent::FenceSignaled(fence).into()).await?;
    tx.send(
        SignalEvent::TokenSignaled {
            token: token.clone(),
            success: true,
        }
        .into(),
    )
    .await?;
    tx.send(SchedulerEvent::Shutdown).await?;

    with_timeout(handle).await??;

    assert_eq!(h.workers.posted_count(), 2);
    assert_eq!(seen.lock().len(), 1);
    assert_eq!(h.scheduler.stats().deferred, 0);
    assert_eq!(h.workers.run_all(), 2);
    assert_eq!(node.stages_run(), vec![1, 2]);
    Ok(())
}

#[tokio::test]
async fn pump_exits_when_every_sender_is_dropped() -> TestResult {
    init_tracing();
    let h = Harness::new();
    let node = ScriptedNode::new("N", 0).build();
    let x = prop(1);

    h.scheduler.add_deferred(
        node,
        4,
        DependencyUnit::new(1).wait_property(PropertyWait::current(x, 0)),
    )?;

    let (tx, pump) = SignalPump::channel(h.scheduler.clone(), 4);
    let handle = tokio::spawn(pump.run());

    tx.send(SchedulerEvent::RequestErrored {
        pipeline: 0,
        request: 4,
        is_flush: true,
    })
    .await?;
    drop(tx);

    with_timeout(handle).await??;

    assert!(h.scheduler.is_errored(0, 4));
    let posted = h.workers.posted();
    assert_eq!(posted.len(), 1);
    assert!(posted[0].dependency_failed);
    Ok(())
}

#[tokio::test]
async fn fence_failure_event_errors_the_request() -> TestResult {
    init_tracing();
    let h = Harness::builder().without_fences().build();
    let node = ScriptedNode::new("N", 0).build();
    let fence = FenceHandle(12);

    h.scheduler.add_deferred(node, 2, DependencyUnit::new(1).wait_fence(fence))?;

    let (tx, pump) = SignalPump::channel(h.scheduler.clone(), 4);
    let handle = tokio::spawn(pump.run());

    tx.send(
        SignalEvent::FenceFailed {
            fence,
            pipeline: 0,
            request: 2,
            is_flush: false,
        }
        .into(),
    )
    .await?;
    tx.send(SchedulerEvent::Shutdown).await?;
    with_timeout(handle).await??;

    assert!(h.scheduler.is_errored(0, 2));
    assert_eq!(h.workers.posted_count(), 1);
    Ok(())
}
