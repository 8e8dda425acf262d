// src/config/model.rs

use serde::Deserialize;

use crate::types::LogLevel;

/// Configuration as read from a TOML file, before validation.
///
/// ```toml
/// [scheduler]
/// name = "session-0"
/// request_queue_depth = 8
/// verbose_logging = false
///
/// [logging]
/// level = "debug"
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    #[serde(default)]
    pub scheduler: SchedulerSection,

    #[serde(default)]
    pub logging: LoggingSection,
}

/// `[scheduler]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerSection {
    /// Identifier of the scheduler instance, used in log lines.
    #[serde(default = "default_name")]
    pub name: String,

    /// Number of requests the session keeps in flight.
    ///
    /// Error requests older than this window are pruned.
    #[serde(default = "default_request_queue_depth")]
    pub request_queue_depth: u64,

    /// Log every registered and resolved wait at `debug`.
    #[serde(default)]
    pub verbose_logging: bool,
}

fn default_name() -> String {
    "session".to_string()
}

fn default_request_queue_depth() -> u64 {
    8
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            name: default_name(),
            request_queue_depth: default_request_queue_depth(),
            verbose_logging: false,
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct LoggingSection {
    /// If `None`, `DDS_LOG` or `info` is used.
    #[serde(default)]
    pub level: Option<LogLevel>,
}

/// Validated scheduler configuration.
///
/// Obtain one through `SchedulerConfig::try_from(raw)`, the loader, or
/// `SchedulerConfig::default()`.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub name: String,
    pub request_queue_depth: u64,
    pub verbose_logging: bool,
    pub log_level: Option<LogLevel>,
}

impl SchedulerConfig {
    /// Construct without validation; used after `validate_raw_config`.
    pub(crate) fn new_unchecked(scheduler: SchedulerSection, logging: LoggingSection) -> Self {
        Self {
            name: scheduler.name,
            request_queue_depth: scheduler.request_queue_depth,
            verbose_logging: scheduler.verbose_logging,
            log_level: logging.level,
        }
    }

    /// Same configuration under a different instance name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::new_unchecked(SchedulerSection::default(), LoggingSection::default())
    }
}
