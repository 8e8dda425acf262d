// src/dependency/mod.rs

//! Dependency records and the containers that own them.
//!
//! - [`unit`] is what a node declares: the waits for its next stage.
//! - [`record`] is the scheduler-owned [`Dependency`] built from a unit.
//! - [`key`] identifies a single wait condition.
//! - [`index`] maps each key to the dependencies waiting on it.
//! - [`error_set`] tracks (pipeline, request) pairs that will never publish.
//! - [`store`] holds the deferred set, external waits, index and error set
//!   behind the scheduler's primary lock, plus the ready queue.

pub mod error_set;
pub mod index;
pub mod key;
pub mod record;
pub mod store;
pub mod unit;

pub use error_set::{ErrorRequest, ErrorRequestSet};
pub use index::KeyIndex;
pub use key::{DependencyKey, WaitCategory};
pub use record::{Dependency, DependencyId, WaitTally};
pub use store::{DeferredState, ReadyQueue, Resolution};
pub use unit::{DependencyUnit, PropertyWait, TokenWait};
