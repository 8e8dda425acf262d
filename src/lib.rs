// src/lib.rs

//! Deferred dependency scheduler.
//!
//! Processing nodes run in stages. After each stage a node reports what its
//! next stage waits on: data published by some pipeline for some request,
//! hardware fences, or external tokens. [`DeferredScheduler`] indexes those
//! waits, resolves them as signals arrive and posts every dependency whose
//! waits all hold to a [`WorkerPool`](exec::WorkerPool). Running a stage may
//! report more dependencies, which closes the loop.

pub mod config;
pub mod dependency;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod signal;
pub mod types;

use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::config::load_and_validate;
use crate::errors::Result;
use crate::exec::WorkerPool;
use crate::signal::PropertyPool;

pub use crate::dependency::{DependencyId, DependencyKey, DependencyUnit, PropertyWait};
pub use crate::engine::{DeferredScheduler, PreemptionMode, SchedulerEvent, SignalEvent, SignalPump};
pub use crate::errors::SchedulerError;

/// Build a scheduler from a config file, one pipeline per pool.
///
/// Logging is left to the caller; see [`logging::init_logging`].
pub fn scheduler_from_path(
    path: impl AsRef<Path>,
    workers: Arc<dyn WorkerPool>,
    pools: Vec<Arc<dyn PropertyPool>>,
) -> Result<DeferredScheduler> {
    let path = path.as_ref();
    let config = load_and_validate(path)?;
    debug!(path = %path.display(), name = %config.name, "loaded scheduler config");

    pools
        .into_iter()
        .fold(DeferredScheduler::builder(config).worker_pool(workers), |builder, pool| {
            builder.pipeline_pool(pool)
        })
        .build()
}
