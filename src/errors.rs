// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

use crate::types::PipelineId;

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("pipeline {pipeline} is out of range (session has {count} pipelines)")]
    PipelineOutOfRange { pipeline: PipelineId, count: usize },

    #[error("too many {kind} waits: {count} (max {max})")]
    TooManyWaits {
        kind: &'static str,
        count: usize,
        max: usize,
    },

    #[error("an external wait needs at least one token")]
    EmptyTokenWait,

    #[error("worker pool rejected job: {0}")]
    WorkerRejected(String),

    #[error("fence wait registration failed: {0}")]
    FenceRegistration(String),

    #[error("scheduler needs a worker pool")]
    MissingWorkerPool,

    #[error("scheduler needs between 1 and {max} pipelines (got {count})")]
    NoPipelines { count: usize, max: usize },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, SchedulerError>;
