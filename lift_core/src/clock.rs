//! Elapsed-session clock: whole seconds since the session started.

use crate::ticker::PeriodicTask;
use chrono::{DateTime, Utc};
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Whole seconds between `started_at` and `now`, clamped at zero
pub fn elapsed_seconds(started_at: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    (now - started_at).num_seconds().max(0) as u64
}

/// Render seconds as `MM:SS`
pub fn format_seconds(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

/// Display value refreshed once per period while a session is active.
///
/// Runs on its own ticker, independent of the rest timer.
pub struct ElapsedClock {
    started_at: Option<DateTime<Utc>>,
    display: Arc<AtomicU64>,
    period: Duration,
    ticker: Option<PeriodicTask>,
}

impl ElapsedClock {
    pub fn new(period: Duration) -> Self {
        Self {
            started_at: None,
            display: Arc::new(AtomicU64::new(0)),
            period,
            ticker: None,
        }
    }

    /// Follow a (new) session start time
    pub fn restart(&mut self, started_at: DateTime<Utc>) {
        self.cancel_ticker();
        self.started_at = Some(started_at);
        self.display
            .store(elapsed_seconds(started_at, Utc::now()), Ordering::Relaxed);

        let display = self.display.clone();
        self.ticker = PeriodicTask::spawn(self.period, move || {
            display.store(elapsed_seconds(started_at, Utc::now()), Ordering::Relaxed);
            ControlFlow::Continue(())
        });
    }

    /// No active session: stop ticking and show zero
    pub fn stop(&mut self) {
        self.cancel_ticker();
        self.started_at = None;
        self.display.store(0, Ordering::Relaxed);
    }

    pub fn elapsed(&self) -> u64 {
        self.display.load(Ordering::Relaxed)
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn is_ticking(&self) -> bool {
        self.ticker.as_ref().is_some_and(PeriodicTask::is_active)
    }

    fn cancel_ticker(&mut self) {
        if let Some(mut ticker) = self.ticker.take() {
            ticker.cancel();
        }
    }
}
