// src/exec/mod.rs

//! Node execution layer.
//!
//! The dispatcher hands each ready dependency to a [`WorkerPool`] as a
//! [`Job`]; the job runs the owning node's stage and feeds the node's
//! follow-on dependencies back into the scheduler.
//!
//! - [`node`] is the processing-node contract.
//! - [`backend`] provides the `WorkerPool` trait and `Job`. Tests replace the
//!   pool with one that runs jobs on demand.
//! - [`worker`] is the production pool on top of tokio.

pub mod backend;
pub mod node;
pub mod worker;

pub use backend::{Job, WorkerPool};
pub use node::{ProcessingNode, StageRequest, StageResult, StageStatus};
pub use worker::TokioWorkerPool;
