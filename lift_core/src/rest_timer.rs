//! Rest countdown started by completing a set.
//!
//! [`RestTimer`] is the countdown itself; [`RestTimerController`] runs it on
//! a [`PeriodicTask`] and fires the audible cues through a [`Notifier`].

use crate::ticker::PeriodicTask;
use crate::types::WorkoutTemplate;
use serde::Serialize;
use std::io::Write;
use std::ops::ControlFlow;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Rest applied when neither the exercise nor the workout sets one
pub const FALLBACK_REST_SECONDS: u32 = 90;

/// Resolve the rest for a completed set: exercise override, then workout
/// default, then `fallback`. Zero counts as unset at every level.
pub fn rest_seconds_for(template: &WorkoutTemplate, exercise_id: &str, fallback: u32) -> u32 {
    template
        .exercise(exercise_id)
        .and_then(|e| e.rest_seconds)
        .filter(|s| *s > 0)
        .or(Some(template.default_rest_seconds).filter(|s| *s > 0))
        .unwrap_or(fallback)
}

/// Audible side effects of the rest cycle
pub trait Notifier: Send + Sync {
    /// A set was just marked done and rest begins
    fn set_completed(&self);
    /// The countdown reached zero on its own
    fn rest_complete(&self);
}

/// Notifier that does nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentNotifier;

impl Notifier for SilentNotifier {
    fn set_completed(&self) {}
    fn rest_complete(&self) {}
}

/// Rings the terminal bell
#[derive(Debug, Default, Clone, Copy)]
pub struct BellNotifier;

impl BellNotifier {
    fn ring(times: usize) {
        let mut out = std::io::stderr();
        let _ = out.write_all("\x07".repeat(times).as_bytes());
        let _ = out.flush();
    }
}

impl Notifier for BellNotifier {
    fn set_completed(&self) {
        Self::ring(1);
    }

    fn rest_complete(&self) {
        Self::ring(2);
    }
}

/// Result of advancing the countdown by one period
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tick {
    Counting(u32),
    Finished,
    Idle,
}

/// Countdown state: seconds left and whether it is running
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RestTimer {
    seconds_left: u32,
    is_running: bool,
    /// Bumped by every start and stop; ticks carry the run they belong to
    #[serde(skip)]
    run: u64,
}

impl RestTimer {
    pub fn seconds_left(&self) -> u32 {
        self.seconds_left
    }

    pub fn is_running(&self) -> bool {
        self.is_running
    }

    /// Begin a countdown from `seconds`, replacing any current one
    pub fn start(&mut self, seconds: u32) -> u64 {
        self.run += 1;
        self.seconds_left = seconds;
        self.is_running = seconds > 0;
        self.run
    }

    /// One period elapsed. The step from 1 lands on 0 and stops in the
    /// same transition.
    pub fn tick(&mut self) -> Tick {
        if !self.is_running || self.seconds_left == 0 {
            self.is_running = false;
            return Tick::Idle;
        }
        if self.seconds_left == 1 {
            self.seconds_left = 0;
            self.is_running = false;
            return Tick::Finished;
        }
        self.seconds_left -= 1;
        Tick::Counting(self.seconds_left)
    }

    /// Force idle at zero; safe to call at any time
    pub fn stop(&mut self) {
        self.run += 1;
        self.seconds_left = 0;
        self.is_running = false;
    }
}

fn lock(state: &Mutex<RestTimer>) -> MutexGuard<'_, RestTimer> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Advance `state` if `run` is still current; fires `rest_complete` on finish
fn tick_run(state: &Mutex<RestTimer>, run: Option<u64>, notifier: &dyn Notifier) -> Tick {
    let outcome = {
        let mut timer = lock(state);
        if run.is_some_and(|run| run != timer.run) {
            return Tick::Idle;
        }
        timer.tick()
    };
    if outcome == Tick::Finished {
        tracing::debug!("Rest complete");
        notifier.rest_complete();
    }
    outcome
}

/// Runs the rest countdown in the background
pub struct RestTimerController {
    state: Arc<Mutex<RestTimer>>,
    notifier: Arc<dyn Notifier>,
    period: Duration,
    ticker: Option<PeriodicTask>,
}

impl RestTimerController {
    pub fn new(notifier: Arc<dyn Notifier>, period: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(RestTimer::default())),
            notifier,
            period,
            ticker: None,
        }
    }

    pub fn snapshot(&self) -> RestTimer {
        *lock(&self.state)
    }

    /// Start (or restart) the countdown and fire the set-completed cue
    pub fn start(&mut self, seconds: u32) {
        self.cancel_ticker();
        let run = lock(&self.state).start(seconds);
        self.notifier.set_completed();
        tracing::debug!("Rest timer started for {}s", seconds);

        if seconds == 0 {
            return;
        }

        let state = self.state.clone();
        let notifier = self.notifier.clone();
        self.ticker = PeriodicTask::spawn(self.period, move || {
            match tick_run(&state, Some(run), notifier.as_ref()) {
                Tick::Counting(_) => ControlFlow::Continue(()),
                Tick::Finished | Tick::Idle => ControlFlow::Break(()),
            }
        });
    }

    /// Stop and zero the countdown; no tick fires afterwards
    pub fn stop(&mut self) {
        lock(&self.state).stop();
        self.cancel_ticker();
    }

    /// Advance by one period by hand, for owners running without a runtime
    pub fn tick(&mut self) -> Tick {
        tick_run(&self.state, None, self.notifier.as_ref())
    }

    fn cancel_ticker(&mut self) {
        if let Some(mut ticker) = self.ticker.take() {
            ticker.cancel();
        }
    }
}

impl Drop for RestTimerController {
    fn drop(&mut self) {
        lock(&self.state).stop();
    }
}
