// src/engine/runtime.rs

use std::fmt;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::errors::Result;

use super::SchedulerEvent;
use super::scheduler::DeferredScheduler;

/// Drives a scheduler from a channel of [`SchedulerEvent`]s.
///
/// Signal sources that live in async code send events here instead of
/// calling the scheduler directly. The pump is a thin IO shell: all
/// semantics live in [`DeferredScheduler::apply`].
pub struct SignalPump {
    scheduler: DeferredScheduler,
    event_rx: mpsc::Receiver<SchedulerEvent>,
}

impl fmt::Debug for SignalPump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalPump")
            .field("scheduler", &self.scheduler)
            .finish_non_exhaustive()
    }
}

impl SignalPump {
    pub fn new(scheduler: DeferredScheduler, event_rx: mpsc::Receiver<SchedulerEvent>) -> Self {
        Self { scheduler, event_rx }
    }

    /// Create a pump together with the sender that feeds it.
    pub fn channel(scheduler: DeferredScheduler, capacity: usize) -> (mpsc::Sender<SchedulerEvent>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self::new(scheduler, rx))
    }

    /// Main event loop.
    ///
    /// - Consumes `SchedulerEvent`s from `event_rx`.
    /// - Applies each one to the scheduler, which dispatches whatever became
    ///   ready.
    /// - Stops on `Shutdown` or when every sender is gone.
    pub async fn run(mut self) -> Result<()> {
        info!(name = %self.scheduler.name(), "signal pump started");

        loop {
            let event = match self.event_rx.recv().await {
                Some(e) => e,
                None => {
                    info!("signal channel closed; exiting");
                    break;
                }
            };

            debug!(?event, "signal pump received event");

            if !self.scheduler.apply(event) {
                info!("shutdown requested; stopping signal pump");
                break;
            }
        }

        info!("signal pump exiting");
        Ok(())
    }
}
