//! Periodic background tasks with deterministic teardown.

use std::ops::ControlFlow;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

/// A callback invoked once per period on the tokio runtime.
///
/// The first call happens one full period after spawning. The task ends
/// when the callback returns `Break`, when `cancel` is called, or when the
/// handle is dropped.
#[derive(Debug)]
pub struct PeriodicTask {
    handle: Option<JoinHandle<()>>,
}

impl PeriodicTask {
    /// Spawn on the current runtime. Returns `None` outside a runtime, in
    /// which case the owner has to drive ticks itself.
    pub fn spawn<F>(period: Duration, mut on_tick: F) -> Option<Self>
    where
        F: FnMut() -> ControlFlow<()> + Send + 'static,
    {
        let runtime = tokio::runtime::Handle::try_current().ok()?;
        let handle = runtime.spawn(async move {
            let mut interval = time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if on_tick().is_break() {
                    break;
                }
            }
        });
        Some(Self {
            handle: Some(handle),
        })
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    pub fn is_active(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        self.cancel();
    }
}
