// src/config/validate.rs

use crate::config::model::{RawConfigFile, SchedulerConfig};
use crate::errors::{Result, SchedulerError};

impl TryFrom<RawConfigFile> for SchedulerConfig {
    type Error = SchedulerError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(SchedulerConfig::new_unchecked(raw.scheduler, raw.logging))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_name(cfg)?;
    validate_queue_depth(cfg)?;
    Ok(())
}

fn validate_name(cfg: &RawConfigFile) -> Result<()> {
    if cfg.scheduler.name.trim().is_empty() {
        return Err(SchedulerError::ConfigError(
            "[scheduler].name must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_queue_depth(cfg: &RawConfigFile) -> Result<()> {
    if cfg.scheduler.request_queue_depth == 0 {
        return Err(SchedulerError::ConfigError(
            "[scheduler].request_queue_depth must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}
