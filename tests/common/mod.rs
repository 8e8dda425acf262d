#![allow(dead_code)]

pub use dds_test_utils::{init_tracing, prop, Harness, ScriptedNode};

use std::sync::Arc;

use dds::signal::{TokenCallback, TokenSignal};
use parking_lot::Mutex;

/// Token callback that records every signal it receives.
pub fn recording_callback() -> (TokenCallback, Arc<Mutex<Vec<TokenSignal>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let callback: TokenCallback = Arc::new(move |signal: &TokenSignal| {
        sink.lock().push(signal.clone());
    });
    (callback, seen)
}
