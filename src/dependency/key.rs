// src/dependency/key.rs

use std::fmt;

use crate::types::{DataId, FenceHandle, PipelineId, RequestId, TokenId};

/// One wait condition.
///
/// Property keys carry the request id the wait resolved to when the
/// dependency was created; it is never recomputed afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DependencyKey {
    Property {
        request: RequestId,
        pipeline: PipelineId,
        data: DataId,
    },
    Fence(FenceHandle),
    Token(TokenId),
}

/// Which satisfied counter a key advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitCategory {
    Property,
    Fence,
    Token,
}

impl DependencyKey {
    pub fn property(request: RequestId, pipeline: PipelineId, data: DataId) -> Self {
        DependencyKey::Property {
            request,
            pipeline,
            data,
        }
    }

    pub fn category(&self) -> WaitCategory {
        match self {
            DependencyKey::Property { .. } => WaitCategory::Property,
            DependencyKey::Fence(_) => WaitCategory::Fence,
            DependencyKey::Token(_) => WaitCategory::Token,
        }
    }
}

impl fmt::Display for DependencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DependencyKey::Property {
                request,
                pipeline,
                data,
            } => write!(f, "{data}@pipeline{pipeline}/request{request}"),
            DependencyKey::Fence(fence) => write!(f, "{fence}"),
            DependencyKey::Token(token) => write!(f, "{token}"),
        }
    }
}
