// src/signal/token.rs

use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU32, Ordering};

use crate::types::{FenceHandle, TokenId};

/// Opaque data handed back to an external-wait callback.
pub type UserData = Arc<dyn Any + Send + Sync>;

/// What an external-wait callback is told when its tokens are done.
#[derive(Clone)]
pub struct TokenSignal {
    /// First token of the wait.
    pub token: TokenId,
    pub user_data: Option<UserData>,
    /// At least one token failed, or the wait was released by a flush.
    pub failed: bool,
}

impl fmt::Debug for TokenSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSignal")
            .field("token", &self.token)
            .field("has_user_data", &self.user_data.is_some())
            .field("failed", &self.failed)
            .finish()
    }
}

/// Completion callback for token waits.
pub type TokenCallback = Arc<dyn Fn(&TokenSignal) + Send + Sync + 'static>;

/// How a token reaches its signaled state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Backed by a hardware fence; the scheduler registers an async wait on
    /// it when the token is first waited on. Needs a fence backend.
    Fence(FenceHandle),
    /// Signaled by its owner through the scheduler's `on_token_signaled`.
    External,
}

/// Terminal state of a token. Once it leaves `Pending` it never changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    Pending,
    Succeeded,
    Failed,
}

const PENDING: u8 = 0;
const SUCCEEDED: u8 = 1;
const FAILED: u8 = 2;

struct TokenInner {
    id: TokenId,
    kind: TokenKind,
    state: AtomicU8,
    wait_refs: AtomicU32,
}

/// Reference-counted synchronization token owned outside the scheduler.
///
/// Clones share identity. The id is chosen by the token's owner and must be
/// unique among the tokens handed to one scheduler. `wait_refs` counts the
/// scheduler's index entries currently waiting on the token.
#[derive(Clone)]
pub struct ExternalToken {
    inner: Arc<TokenInner>,
}

impl ExternalToken {
    pub fn new(id: TokenId, kind: TokenKind) -> Self {
        Self {
            inner: Arc::new(TokenInner {
                id,
                kind,
                state: AtomicU8::new(PENDING),
                wait_refs: AtomicU32::new(0),
            }),
        }
    }

    pub fn external(id: TokenId) -> Self {
        Self::new(id, TokenKind::External)
    }

    pub fn backed_by(id: TokenId, fence: FenceHandle) -> Self {
        Self::new(id, TokenKind::Fence(fence))
    }

    pub fn id(&self) -> TokenId {
        self.inner.id
    }

    pub fn kind(&self) -> TokenKind {
        self.inner.kind
    }

    pub fn state(&self) -> TokenState {
        match self.inner.state.load(Ordering::Acquire) {
            PENDING => TokenState::Pending,
            SUCCEEDED => TokenState::Succeeded,
            _ => TokenState::Failed,
        }
    }

    /// Reached a terminal state, successfully or not.
    pub fn is_signaled(&self) -> bool {
        self.state() != TokenState::Pending
    }

    pub fn has_failed(&self) -> bool {
        self.state() == TokenState::Failed
    }

    /// Record the terminal result. The first result wins; returns whether
    /// this call set it.
    pub(crate) fn mark_signaled(&self, success: bool) -> bool {
        let terminal = if success { SUCCEEDED } else { FAILED };
        self.inner
            .state
            .compare_exchange(PENDING, terminal, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Number of scheduler index entries currently holding this token.
    pub fn wait_refs(&self) -> u32 {
        self.inner.wait_refs.load(Ordering::Acquire)
    }

    pub(crate) fn acquire_wait(&self) {
        self.inner.wait_refs.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn release_wait(&self) {
        let prev = self.inner.wait_refs.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(prev > 0, "token wait reference released twice");
    }
}

impl PartialEq for ExternalToken {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for ExternalToken {}

impl Hash for ExternalToken {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl fmt::Debug for ExternalToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExternalToken")
            .field("id", &self.inner.id)
            .field("kind", &self.inner.kind)
            .field("state", &self.state())
            .field("wait_refs", &self.wait_refs())
            .finish()
    }
}
