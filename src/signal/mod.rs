// src/signal/mod.rs

//! Collaborators that produce the signals the scheduler waits on.
//!
//! - [`pool`] is the per-pipeline property pool: point-in-time publication
//!   queries plus publish/fail notifications.
//! - [`fence`] is the hardware fence backend with asynchronous waits.
//! - [`token`] is the reference-counted external synchronization token.

pub mod fence;
pub mod pool;
pub mod token;

pub use fence::{FenceBackend, FenceCallback, FenceResult};
pub use pool::{PropertyPool, PublicationObserver};
pub use token::{ExternalToken, TokenCallback, TokenKind, TokenSignal, TokenState, UserData};
