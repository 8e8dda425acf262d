// tests/external_tokens.rs

mod common;
use crate::common::{init_tracing, recording_callback, Harness, ScriptedNode};

use std::error::Error;

use dds::errors::SchedulerError;
use dds::signal::{ExternalToken, FenceResult, TokenState};
use dds::types::{FenceHandle, TokenId};
use dds::DependencyUnit;

type TestResult = Result<(), Box<dyn Error>>;

#[test]
fn callback_waits_for_every_token() -> TestResult {
    init_tracing();
    let h = Harness::new();
    let first = ExternalToken::external(TokenId(1));
    let second = ExternalToken::external(TokenId(2));
    let (callback, seen) = recording_callback();

    let id = h
        .scheduler
        .wait_for_tokens(vec![first.clone(), second.clone()], callback, None)?;

    h.scheduler.on_token_signaled(&first, true);
    assert!(seen.lock().is_empty());
    assert!(h.scheduler.is_external_wait(id));

    h.scheduler.on_token_signaled(&second, true);
    let seen = seen.lock();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].token, first.id());
    assert!(seen[0].user_data.is_none());
    Ok(())
}

#[test]
fn already_signaled_tokens_complete_immediately() -> TestResult {
    init_tracing();
    let h = Harness::new();
    let token = ExternalToken::external(TokenId(3));
    h.scheduler.on_token_signaled(&token, true);
    assert!(token.is_signaled());

    let (callback, seen) = recording_callback();
    let id = h.scheduler.wait_for_tokens(vec![token.clone()], callback, None)?;

    assert_eq!(seen.lock().len(), 1);
    assert!(!h.scheduler.is_external_wait(id));
    assert_eq!(token.wait_refs(), 0);
    assert_eq!(h.scheduler.stats().index_keys, 0);
    Ok(())
}

#[test]
fn invalid_token_lists_are_rejected() {
    init_tracing();
    let h = Harness::new();

    let (callback, _) = recording_callback();
    let result = h.scheduler.wait_for_tokens(Vec::new(), callback, None);
    assert!(matches!(result, Err(SchedulerError::EmptyTokenWait)));

    let (callback, _) = recording_callback();
    let tokens: Vec<_> = (0..9).map(|n| ExternalToken::external(TokenId(100 + n))).collect();
    let result = h.scheduler.wait_for_tokens(tokens, callback, None);
    assert!(matches!(
        result,
        Err(SchedulerError::TooManyWaits {
            kind: "token",
            count: 9,
            max: 8
        })
    ));
    assert_eq!(h.scheduler.stats().external_waits, 0);
}

#[test]
fn shared_token_holds_one_reference_and_releases_it() -> TestResult {
    init_tracing();
    let h = Harness::new();
    let token = ExternalToken::external(TokenId(5));
    let (first_cb, first_seen) = recording_callback();
    let (second_cb, second_seen) = recording_callback();

    h.scheduler.wait_for_tokens(vec![token.clone()], first_cb, None)?;
    h.scheduler.wait_for_tokens(vec![token.clone()], second_cb, None)?;
    assert_eq!(token.wait_refs(), 1);
    assert_eq!(h.scheduler.stats().external_waits, 2);

    h.scheduler.on_token_signaled(&token, true);

    assert_eq!(first_seen.lock().len(), 1);
    assert_eq!(second_seen.lock().len(), 1);
    assert_eq!(token.wait_refs(), 0);
    assert_eq!(h.scheduler.stats().external_waits, 0);
    Ok(())
}

#[test]
fn failed_token_is_reported_to_the_callback() -> TestResult {
    init_tracing();
    let h = Harness::new();
    let token = ExternalToken::external(TokenId(6));
    let (callback, seen) = recording_callback();

    h.scheduler.wait_for_tokens(vec![token.clone()], callback, None)?;
    h.scheduler.on_token_signaled(&token, false);

    let seen = seen.lock();
    assert_eq!(seen.len(), 1);
    assert!(seen[0].failed);
    Ok(())
}

#[test]
fn fence_backed_token_registers_one_async_wait() -> TestResult {
    init_tracing();
    let h = Harness::new();
    let fence = FenceHandle(0x40);
    let token = ExternalToken::backed_by(TokenId(8), fence);
    let (callback, seen) = recording_callback();

    h.scheduler.wait_for_tokens(vec![token.clone()], callback, None)?;
    assert_eq!(h.fences.registrations(), 1);
    assert_eq!(h.fences.pending(fence), 1);

    assert_eq!(h.fences.signal(fence, FenceResult::Success), 1);

    assert!(token.is_signaled());
    let seen = seen.lock();
    assert_eq!(seen.len(), 1);
    assert!(!seen[0].failed);
    assert_eq!(h.workers.posted_count(), 0);
    Ok(())
}

#[test]
fn failed_backing_fence_fails_the_token() -> TestResult {
    init_tracing();
    let h = Harness::new();
    let fence = FenceHandle(0x41);
    let token = ExternalToken::backed_by(TokenId(9), fence);
    let (callback, seen) = recording_callback();

    h.scheduler.wait_for_tokens(vec![token], callback, None)?;
    h.fences.signal(fence, FenceResult::Failed);

    let seen = seen.lock();
    assert_eq!(seen.len(), 1);
    assert!(seen[0].failed);
    Ok(())
}

#[test]
fn rejected_fence_registration_releases_the_wait() -> TestResult {
    init_tracing();
    let h = Harness::new();
    h.fences.set_reject(true);
    let token = ExternalToken::backed_by(TokenId(10), FenceHandle(0x42));
    let (callback, seen) = recording_callback();

    let id = h.scheduler.wait_for_tokens(vec![token.clone()], callback, None)?;

    assert!(!h.scheduler.is_external_wait(id));
    assert_eq!(token.wait_refs(), 0);
    let seen = seen.lock();
    assert_eq!(seen.len(), 1);
    assert!(seen[0].failed);
    Ok(())
}

#[test]
fn dump_lists_outstanding_external_waits() -> TestResult {
    init_tracing();
    let h = Harness::new();
    let token = ExternalToken::external(TokenId(7));
    let (callback, _) = recording_callback();

    let id = h.scheduler.wait_for_tokens(vec![token.clone()], callback, None)?;
    let dump = h.scheduler.dump_state();

    assert!(dump.contains("scheduler 'harness'"));
    assert!(dump.contains("external waits (1)"));
    assert!(dump.contains(&id.to_string()));
    assert!(dump.contains(&token.id().to_string()));
    Ok(())
}

#[test]
fn token_keeps_its_first_result() {
    init_tracing();
    let h = Harness::new();
    let token = ExternalToken::external(TokenId(20));
    assert_eq!(token.state(), TokenState::Pending);

    h.scheduler.on_token_signaled(&token, false);
    h.scheduler.on_token_signaled(&token, true);

    assert_eq!(token.state(), TokenState::Failed);
    assert!(token.is_signaled());
    assert!(token.has_failed());
}

#[test]
fn waiting_on_an_already_failed_token_reports_failure() -> TestResult {
    init_tracing();
    let h = Harness::new();
    let token = ExternalToken::external(TokenId(21));
    h.scheduler.on_token_signaled(&token, false);

    let (callback, seen) = recording_callback();
    let id = h.scheduler.wait_for_tokens(vec![token.clone()], callback, None)?;

    assert!(!h.scheduler.is_external_wait(id));
    let seen = seen.lock();
    assert_eq!(seen.len(), 1);
    assert!(seen[0].failed);
    Ok(())
}

#[test]
fn node_waiting_on_an_already_failed_token_sees_the_failure() -> TestResult {
    init_tracing();
    let h = Harness::new();
    let node = ScriptedNode::new("N", 0).build();
    let failed = ExternalToken::external(TokenId(22));
    let succeeded = ExternalToken::external(TokenId(23));
    h.scheduler.on_token_signaled(&failed, false);
    h.scheduler.on_token_signaled(&succeeded, true);

    h.scheduler.add_deferred(node.clone(), 1, DependencyUnit::new(1).wait_token(succeeded))?;
    h.scheduler.add_deferred(node.clone(), 2, DependencyUnit::new(1).wait_token(failed))?;
    assert_eq!(h.scheduler.dispatch_ready(), 2);

    let posted = h.workers.posted();
    assert_eq!(posted.len(), 2);
    assert!(!posted[0].dependency_failed);
    assert!(posted[1].dependency_failed);
    Ok(())
}

#[test]
fn fence_backed_tokens_need_a_fence_backend() -> TestResult {
    init_tracing();
    let h = Harness::builder().without_fences().build();
    let node = ScriptedNode::new("N", 0).build();
    let token = ExternalToken::backed_by(TokenId(24), FenceHandle(7));

    let (callback, seen) = recording_callback();
    let result = h.scheduler.wait_for_tokens(vec![token.clone()], callback, None);
    assert!(matches!(result, Err(SchedulerError::FenceRegistration(_))));

    let result = h
        .scheduler
        .add_deferred(node.clone(), 1, DependencyUnit::new(1).wait_token(token.clone()));
    assert!(matches!(result, Err(SchedulerError::FenceRegistration(_))));

    assert!(h.scheduler.stats().is_idle());
    assert_eq!(h.scheduler.stats().index_keys, 0);
    assert_eq!(token.wait_refs(), 0);
    assert!(seen.lock().is_empty());

    // Plain external tokens still work without a fence backend.
    let (callback, seen) = recording_callback();
    let plain = ExternalToken::external(TokenId(25));
    h.scheduler.wait_for_tokens(vec![plain.clone()], callback, None)?;
    h.scheduler.on_token_signaled(&plain, true);
    assert_eq!(seen.lock().len(), 1);
    Ok(())
}

#[test]
fn token_callback_without_tokens_is_rejected() {
    init_tracing();
    let h = Harness::new();
    let node = ScriptedNode::new("N", 0).build();
    let (callback, _) = recording_callback();

    let result = h
        .scheduler
        .add_deferred(node, 1, DependencyUnit::new(1).on_tokens_ready(callback, None));

    assert!(matches!(result, Err(SchedulerError::EmptyTokenWait)));
    assert!(h.scheduler.stats().is_idle());
}
