use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Identifier of one in-flight capture request.
pub type RequestId = u64;

/// Index of a pipeline inside the owning session.
pub type PipelineId = u32;

/// Process-sequence id of one stage of a multi-stage node invocation.
///
/// Non-negative values belong to the node; negative values are reserved for
/// the scheduler (see [`PREEMPTED_STAGE`]).
pub type StageIndex = i32;

/// Lowest request id a property wait can resolve to.
pub const FIRST_VALID_REQUEST_ID: RequestId = 1;

/// Stage index handed to a node whose waits were dropped by preemption.
pub const PREEMPTED_STAGE: StageIndex = -1;

/// Maximum number of property waits a single dependency unit may declare.
pub const MAX_PROPERTY_WAITS: usize = 64;

/// Maximum number of hardware fences a single dependency unit may wait on.
pub const MAX_FENCE_WAITS: usize = 8;

/// Maximum number of external tokens a single dependency may wait on.
pub const MAX_TOKEN_WAITS: usize = 8;

/// Maximum number of pipelines one session (and so one scheduler) drives.
pub const MAX_PIPELINES_PER_SESSION: usize = 16;

/// Bits of a raw data id that mark a driver-internal property.
const DRIVER_INTERNAL_GROUP_MASK: u32 = 0x7800 << 16;

/// Identifier of a piece of published per-request data.
///
/// Driver-internal properties and framework metadata tags share one raw id
/// space; the tag is decoded once, when the id enters the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DataId {
    Property(u32),
    Metadata(u32),
}

impl DataId {
    /// Decode a raw id into its tagged form.
    pub fn from_raw(raw: u32) -> Self {
        if raw & DRIVER_INTERNAL_GROUP_MASK == 0 {
            DataId::Metadata(raw)
        } else {
            DataId::Property(raw)
        }
    }

    /// The raw id, as the property pool stores it.
    pub fn raw(self) -> u32 {
        match self {
            DataId::Property(raw) | DataId::Metadata(raw) => raw,
        }
    }

    pub fn is_metadata(self) -> bool {
        matches!(self, DataId::Metadata(_))
    }
}

impl fmt::Display for DataId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataId::Property(raw) => write!(f, "property:{raw:#010x}"),
            DataId::Metadata(raw) => write!(f, "metadata:{raw:#010x}"),
        }
    }
}

/// Opaque handle of a hardware completion fence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FenceHandle(pub u64);

impl fmt::Display for FenceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fence:{:#x}", self.0)
    }
}

/// Stable identity of an external synchronization token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TokenId(pub u64);

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "token:{}", self.0)
    }
}

/// Logging verbosity accepted in the `[logging]` config section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            other => Err(format!(
                "invalid log level: {other} (expected error, warn, info, debug or trace)"
            )),
        }
    }
}
