// tests/scenarios.rs

mod common;
use crate::common::{init_tracing, prop, recording_callback, Harness, ScriptedNode};

use std::error::Error;
use std::sync::Arc;

use dds::engine::PreemptionMode;
use dds::signal::ExternalToken;
use dds::types::{TokenId, PREEMPTED_STAGE};
use dds::{DependencyKey, DependencyUnit, PropertyWait};

type TestResult = Result<(), Box<dyn Error>>;

#[test]
fn published_property_moves_dependency_to_ready_and_dispatches_once() -> TestResult {
    init_tracing();
    let h = Harness::new();
    let node = ScriptedNode::new("N", 0).build();
    let x = prop(1);
    let key = DependencyKey::property(5, 0, x);

    let id = h.scheduler.add_deferred(
        node.clone(),
        5,
        DependencyUnit::new(1).wait_property(PropertyWait::current(x, 0)),
    )?;

    assert!(h.scheduler.is_deferred(id));
    assert!(h.scheduler.is_waiting_on(id, &key));
    assert_eq!(h.workers.posted_count(), 0);

    h.pool(0).publish(5, x);

    assert!(!h.scheduler.is_deferred(id));
    assert!(!h.scheduler.index_contains(&key));
    let posted = h.workers.posted();
    assert_eq!(posted.len(), 1);
    assert_eq!(posted[0].dependency, id);
    assert_eq!(posted[0].request, 5);
    assert_eq!(posted[0].stage, 1);

    assert_eq!(h.workers.run_all(), 1);
    assert_eq!(node.stages_run(), vec![1]);
    assert!(!node.calls()[0].dependency_failed);

    // Publishing again must not dispatch a second time.
    h.pool(0).publish(5, x);
    assert_eq!(h.workers.posted_count(), 1);
    assert!(h.scheduler.stats().is_idle());
    Ok(())
}

#[test]
fn errored_request_releases_waiting_dependency_without_publication() -> TestResult {
    init_tracing();
    let h = Harness::new();
    let node = ScriptedNode::new("N", 0).build();
    let x = prop(1);

    let id = h.scheduler.add_deferred(
        node.clone(),
        5,
        DependencyUnit::new(1).wait_property(PropertyWait::current(x, 0)),
    )?;
    assert!(h.scheduler.is_deferred(id));

    h.scheduler.mark_errored(0, 5, false);

    assert!(h.scheduler.is_errored(0, 5));
    assert!(!h.scheduler.is_deferred(id));
    let posted = h.workers.posted();
    assert_eq!(posted.len(), 1);
    assert_eq!(posted[0].dependency, id);
    assert!(posted[0].dependency_failed);

    h.workers.run_all();
    let calls = node.calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].dependency_failed);
    Ok(())
}

#[test]
fn token_wait_fires_callback_once_without_posting() -> TestResult {
    init_tracing();
    let h = Harness::new();
    let token = ExternalToken::external(TokenId(1));
    let (callback, seen) = recording_callback();

    let id = h
        .scheduler
        .wait_for_tokens(vec![token.clone()], callback, Some(Arc::new(42u32)))?;

    assert!(h.scheduler.is_external_wait(id));
    assert_eq!(token.wait_refs(), 1);
    assert!(seen.lock().is_empty());

    h.scheduler.on_token_signaled(&token, true);

    {
        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].token, token.id());
        assert!(!seen[0].failed);
        let data = seen[0].user_data.as_ref().and_then(|d| d.downcast_ref::<u32>());
        assert_eq!(data, Some(&42));
    }
    assert_eq!(h.workers.posted_count(), 0);
    assert_eq!(token.wait_refs(), 0);
    assert!(!h.scheduler.is_external_wait(id));
    assert!(!h.scheduler.index_contains(&DependencyKey::Token(token.id())));

    h.scheduler.on_token_signaled(&token, true);
    assert_eq!(seen.lock().len(), 1);
    Ok(())
}

#[test]
fn global_preemption_releases_preemptable_dependency_with_reserved_stage() -> TestResult {
    init_tracing();
    let h = Harness::builder().preemption(PreemptionMode::Global).build();
    let node = ScriptedNode::new("N", 0).build();
    let x = prop(1);
    let key = DependencyKey::property(3, 0, x);

    let id = h.scheduler.add_deferred(
        node.clone(),
        3,
        DependencyUnit::new(2)
            .wait_property(PropertyWait::current(x, 0))
            .preemptable()
            .bind_buffers(),
    )?;
    assert!(h.scheduler.is_deferred(id));

    assert_eq!(h.scheduler.preempt(), 1);
    assert!(h.scheduler.is_ready(id));
    assert!(!h.scheduler.is_deferred(id));
    assert!(!h.scheduler.index_contains(&key));

    assert_eq!(h.scheduler.dispatch_ready(), 1);
    let posted = h.workers.posted();
    assert_eq!(posted.len(), 1);
    assert_eq!(posted[0].stage, PREEMPTED_STAGE);

    h.workers.run_all();
    let calls = node.calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].is_preempted());
    assert!(!calls[0].bind_buffers);

    // The wait that never fired no longer reaches anything.
    h.pool(0).publish(3, x);
    assert_eq!(h.workers.posted_count(), 1);
    Ok(())
}

#[test]
fn dependency_without_waits_skips_the_deferred_set() -> TestResult {
    init_tracing();
    let h = Harness::new();
    let node = ScriptedNode::new("N", 0).build();

    let id = h.scheduler.add_deferred(node.clone(), 1, DependencyUnit::new(0))?;

    assert!(!h.scheduler.is_deferred(id));
    assert!(h.scheduler.is_ready(id));
    let stats = h.scheduler.stats();
    assert_eq!(stats.deferred, 0);
    assert_eq!(stats.ready, 1);
    assert_eq!(stats.index_keys, 0);

    assert_eq!(h.scheduler.dispatch_ready(), 1);
    assert_eq!(h.workers.posted_count(), 1);
    Ok(())
}

#[test]
fn already_published_property_is_not_waited_on() -> TestResult {
    init_tracing();
    let h = Harness::new();
    let node = ScriptedNode::new("N", 0).build();
    let x = prop(7);
    h.pool(0).preload(4, x);

    let id = h.scheduler.add_deferred(
        node,
        4,
        DependencyUnit::new(1).wait_property(PropertyWait::current(x, 0)),
    )?;

    assert!(h.scheduler.is_ready(id));
    assert!(!h.scheduler.index_contains(&DependencyKey::property(4, 0, x)));
    Ok(())
}

#[test]
fn relative_waits_resolve_once_at_creation() -> TestResult {
    init_tracing();
    let h = Harness::new();
    let node = ScriptedNode::new("N", 0).build();
    let x = prop(1);

    let id = h.scheduler.add_deferred(
        node.clone(),
        5,
        DependencyUnit::new(1)
            .wait_property(PropertyWait::previous(x, 0, 2))
            .wait_property(PropertyWait::ahead(x, 0, 1)),
    )?;
    assert!(h.scheduler.is_waiting_on(id, &DependencyKey::property(3, 0, x)));
    assert!(h.scheduler.is_waiting_on(id, &DependencyKey::property(6, 0, x)));

    // An offset reaching past the first request clamps to it.
    let early = h.scheduler.add_deferred(
        node,
        2,
        DependencyUnit::new(1).wait_property(PropertyWait::previous(x, 0, 5)),
    )?;
    assert!(h.scheduler.is_waiting_on(early, &DependencyKey::property(1, 0, x)));
    Ok(())
}

#[test]
fn dependency_waits_for_every_key_before_dispatch() -> TestResult {
    init_tracing();
    let h = Harness::builder().pipelines(2).build();
    let node = ScriptedNode::new("N", 0).build();
    let x = prop(1);
    let y = prop(2);

    let id = h.scheduler.add_deferred(
        node,
        5,
        DependencyUnit::new(1)
            .wait_property(PropertyWait::current(x, 0))
            .wait_property(PropertyWait::current(y, 1)),
    )?;

    h.pool(0).publish(5, x);
    assert!(h.scheduler.is_deferred(id));
    assert!(!h.scheduler.index_contains(&DependencyKey::property(5, 0, x)));
    assert!(h.scheduler.index_contains(&DependencyKey::property(5, 1, y)));
    assert_eq!(h.workers.posted_count(), 0);

    h.pool(1).publish(5, y);
    assert!(!h.scheduler.is_deferred(id));
    assert_eq!(h.workers.posted_count(), 1);
    assert_eq!(h.scheduler.stats().index_keys, 0);
    Ok(())
}

#[test]
fn duplicate_waits_collapse_into_one() -> TestResult {
    init_tracing();
    let h = Harness::new();
    let node = ScriptedNode::new("N", 0).build();
    let x = prop(1);

    let id = h.scheduler.add_deferred(
        node,
        5,
        DependencyUnit::new(1)
            .wait_property(PropertyWait::current(x, 0))
            .wait_property(PropertyWait::previous(x, 0, 0)),
    )?;
    assert!(h.scheduler.is_deferred(id));
    assert_eq!(h.scheduler.stats().index_keys, 1);

    h.pool(0).publish(5, x);
    assert_eq!(h.workers.posted_count(), 1);
    Ok(())
}

#[test]
fn unrelated_dependencies_share_one_key() -> TestResult {
    init_tracing();
    let h = Harness::new();
    let a = ScriptedNode::new("A", 0).build();
    let b = ScriptedNode::new("B", 0).build();
    let x = prop(1);
    let key = DependencyKey::property(5, 0, x);

    let first = h
        .scheduler
        .add_deferred(a, 5, DependencyUnit::new(1).wait_property(PropertyWait::current(x, 0)))?;
    // B waits on the same data one request later, expressed relative to 6.
    let second = h
        .scheduler
        .add_deferred(b, 6, DependencyUnit::new(1).wait_property(PropertyWait::previous(x, 0, 1)))?;

    assert_eq!(h.scheduler.stats().index_keys, 1);
    assert!(h.scheduler.is_waiting_on(first, &key));
    assert!(h.scheduler.is_waiting_on(second, &key));

    h.pool(0).publish(5, x);
    let posted: Vec<_> = h.workers.posted().into_iter().map(|p| p.dependency).collect();
    assert_eq!(posted, vec![first, second]);
    assert!(!h.scheduler.index_contains(&key));
    Ok(())
}
