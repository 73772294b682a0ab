//! Application orchestrator tying the catalog, the active session, both
//! timers, history and persistence together for one identity.

use crate::catalog::{Catalog, ExercisePatch};
use crate::clock::ElapsedClock;
use crate::config::Config;
use crate::csv_import::parse_workouts;
use crate::history::HistoryLog;
use crate::reconciler::{Loaded, Reconciler};
use crate::remote::RemoteStore;
use crate::rest_timer::{rest_seconds_for, Notifier, RestTimer, RestTimerController};
use crate::session::{SessionMachine, SwitchOutcome, Toggle};
use crate::stats::ExerciseStats;
use crate::types::*;
use crate::{CompletionError, Error, RemoteError, Result};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;

pub struct Tracker<R> {
    identity: Identity,
    catalog: Catalog,
    selected: Option<String>,
    machine: SessionMachine,
    /// Sessions parked by switching away, keyed by workout id
    shelf: HashMap<String, Session>,
    rest: RestTimerController,
    clock: ElapsedClock,
    history: HistoryLog,
    reconciler: Reconciler<R>,
    fallback_rest_seconds: u32,
}

impl<R: RemoteStore> Tracker<R> {
    pub fn new(reconciler: Reconciler<R>, notifier: Arc<dyn Notifier>, config: &Config) -> Self {
        let period = config.timer.tick_period();
        Self {
            identity: Identity::Anonymous,
            catalog: Catalog::default(),
            selected: None,
            machine: SessionMachine::new(),
            shelf: HashMap::new(),
            rest: RestTimerController::new(notifier, period),
            clock: ElapsedClock::new(period),
            history: HistoryLog::new(),
            reconciler,
            fallback_rest_seconds: config.timer.fallback_rest_seconds,
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn selected_workout(&self) -> Option<&WorkoutTemplate> {
        self.selected.as_deref().and_then(|id| self.catalog.get(id))
    }

    pub fn session(&self) -> Option<&Session> {
        self.machine.session()
    }

    pub fn machine(&self) -> &SessionMachine {
        &self.machine
    }

    pub fn history(&self) -> &HistoryLog {
        &self.history
    }

    pub fn rest(&self) -> RestTimer {
        self.rest.snapshot()
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.clock.elapsed()
    }

    pub fn volume(&self) -> f64 {
        self.machine.volume()
    }

    pub fn reconciler(&self) -> &Reconciler<R> {
        &self.reconciler
    }

    /// Replace all in-memory state with what persistence holds for `identity`
    pub async fn load(&mut self, identity: Identity) -> Loaded {
        self.rest.stop();
        self.shelf.clear();
        self.identity = identity;

        let loaded = self.reconciler.load(&self.identity).await;
        self.catalog.replace_all(loaded.workouts.clone());
        self.history.replace(loaded.history.clone());

        let cached = loaded.cached_session.clone();
        let selected = loaded
            .selected
            .as_deref()
            .or(cached.as_ref().map(|s| s.workout_id.as_str()))
            .filter(|id| self.catalog.get(id).is_some())
            .or(self.catalog.first().map(|w| w.id.as_str()))
            .map(str::to_string);

        if let Some(session) = cached {
            self.shelf.insert(session.workout_id.clone(), session);
        }
        if let Some(id) = selected {
            self.activate(&id);
        }
        loaded
    }

    /// Switch to another workout, parking the current session.
    ///
    /// A parked or cached session for the target is restored as is;
    /// otherwise a fresh one is built.
    pub fn select_workout(&mut self, workout_id: &str) -> Result<SwitchOutcome> {
        if self.catalog.get(workout_id).is_none() {
            return Err(Error::Catalog(format!("unknown workout '{}'", workout_id)));
        }
        if self.selected.as_deref() == Some(workout_id) && self.machine.session().is_some() {
            return Ok(SwitchOutcome::Restored);
        }
        self.activate(workout_id)
            .ok_or_else(|| Error::Catalog(format!("unknown workout '{}'", workout_id)))
    }

    fn activate(&mut self, workout_id: &str) -> Option<SwitchOutcome> {
        let template = self.catalog.get(workout_id)?;
        self.rest.stop();

        let cached = self.shelf.remove(workout_id);
        let (outcome, previous) = self.machine.switch_workout(template, cached);
        if let Some(previous) = previous.filter(|p| p.workout_id != workout_id) {
            self.shelf.insert(previous.workout_id.clone(), previous);
        }

        self.selected = Some(workout_id.to_string());
        self.restart_clock();
        self.reconciler.mirror_selected(&self.identity, workout_id);
        self.mirror_session();
        tracing::debug!("Selected '{}' ({:?})", workout_id, outcome);
        Some(outcome)
    }

    pub fn set_field(&mut self, exercise_id: &str, set_index: u32, update: SetUpdate) -> bool {
        let changed = self.machine.set_field(exercise_id, set_index, update);
        if changed {
            self.mirror_session();
        }
        changed
    }

    /// Flip a set's `done` flag. Completing it starts the rest timer;
    /// reopening it leaves the timer alone.
    pub fn toggle_set_done(&mut self, exercise_id: &str, set_index: u32) -> Option<Toggle> {
        let toggle = self.machine.toggle_set_done(exercise_id, set_index)?;
        if toggle == Toggle::Completed {
            let seconds = self
                .machine
                .session()
                .and_then(|s| self.catalog.get(&s.workout_id))
                .map(|t| rest_seconds_for(t, exercise_id, self.fallback_rest_seconds))
                .unwrap_or(self.fallback_rest_seconds);
            self.rest.start(seconds);
        }
        self.mirror_session();
        Some(toggle)
    }

    /// Discard the active session's input after `confirm` agrees
    pub fn reset(&mut self, confirm: impl FnOnce() -> bool) -> bool {
        if self.selected_workout().is_none() || !confirm() {
            return false;
        }
        self.rebuild_active();
        true
    }

    pub fn stop_rest(&mut self) {
        self.rest.stop();
    }

    /// Save the active session to history and start over.
    ///
    /// On failure the session is left exactly as it was so it can be retried.
    pub async fn complete(&mut self) -> std::result::Result<HistoryEntry, CompletionError> {
        let session = self.machine.session().ok_or(CompletionError::NothingCompleted)?;
        let entry = self
            .reconciler
            .complete_session(&self.identity, session, Utc::now())
            .await?;

        self.history.prepend(entry.clone());
        self.reconciler
            .mirror_history(&self.identity, self.history.entries());
        self.rebuild_active();
        Ok(entry)
    }

    fn rebuild_active(&mut self) {
        self.rest.stop();
        let template = self
            .selected_workout()
            .or_else(|| self.catalog.first())
            .cloned();
        if let Some(template) = template {
            self.machine.reset(&template);
            self.selected = Some(template.id);
        }
        self.restart_clock();
        self.mirror_session();
    }

    /// Import templates from CSV; a rejected file changes nothing
    pub async fn import_csv(&mut self, text: &str) -> Result<usize> {
        let imported = parse_workouts(text)?;
        let count = imported.len();
        let ids: Vec<String> = imported.iter().map(|w| w.id.clone()).collect();

        self.catalog.merge(imported);
        for id in &ids {
            self.sync_template(id).await;
        }
        self.mirror_workouts();
        Ok(count)
    }

    pub async fn rename_workout(&mut self, workout_id: &str, name: &str) -> Result<()> {
        self.catalog.rename_workout(workout_id, name)?;
        self.persist_template(workout_id).await;
        Ok(())
    }

    pub async fn set_default_rest(&mut self, workout_id: &str, seconds: u32) -> Result<()> {
        self.catalog.set_default_rest(workout_id, seconds)?;
        self.persist_template(workout_id).await;
        Ok(())
    }

    pub async fn add_exercise(&mut self, workout_id: &str) -> Result<String> {
        let exercise_id = self.catalog.add_exercise(workout_id)?;
        self.persist_template(workout_id).await;
        Ok(exercise_id)
    }

    pub async fn remove_exercise(&mut self, workout_id: &str, exercise_id: &str) -> Result<bool> {
        let removed = self.catalog.remove_exercise(workout_id, exercise_id)?;
        if removed {
            self.persist_template(workout_id).await;
        }
        Ok(removed)
    }

    pub async fn update_exercise(
        &mut self,
        workout_id: &str,
        exercise_id: &str,
        patch: ExercisePatch,
    ) -> Result<bool> {
        let updated = self.catalog.update_exercise(workout_id, exercise_id, patch)?;
        if updated {
            self.persist_template(workout_id).await;
        }
        Ok(updated)
    }

    pub async fn move_exercise(
        &mut self,
        workout_id: &str,
        dragged: &str,
        target: &str,
    ) -> Result<bool> {
        let moved = self.catalog.move_exercise(workout_id, dragged, target)?;
        if moved {
            self.persist_template(workout_id).await;
        }
        Ok(moved)
    }

    /// Delete a workout after `confirm` agrees. Deleting the selected one
    /// moves the selection to the first remaining workout.
    pub async fn delete_workout(
        &mut self,
        workout_id: &str,
        confirm: impl FnOnce() -> bool,
    ) -> Result<bool> {
        if self.catalog.get(workout_id).is_none() {
            return Err(Error::Catalog(format!("unknown workout '{}'", workout_id)));
        }
        if !confirm() {
            return Ok(false);
        }

        let was_last = self.catalog.workouts().len() == 1;
        self.catalog.remove_workout(workout_id);
        self.shelf.remove(workout_id);
        if let Err(e) = self.reconciler.delete_workout(&self.identity, workout_id).await {
            tracing::warn!("Failed to delete '{}' remotely: {}", workout_id, e);
        }
        if was_last {
            // Store the placeholder so the next load does not bootstrap defaults
            if let Some(id) = self.catalog.first().map(|w| w.id.clone()) {
                self.sync_template(&id).await;
            }
        }
        self.mirror_workouts();

        if self.selected_workout().is_none() {
            self.selected = self.catalog.first().map(|w| w.id.clone());
            if let Some(id) = self.selected.clone() {
                self.reconciler.mirror_selected(&self.identity, &id);
            }
            self.rebuild_active();
        }
        Ok(true)
    }

    pub async fn stats(&self) -> std::result::Result<Vec<ExerciseStats>, RemoteError> {
        self.reconciler.load_stats(&self.identity).await
    }

    async fn persist_template(&mut self, workout_id: &str) {
        self.sync_template(workout_id).await;
        self.mirror_workouts();
    }

    async fn sync_template(&self, workout_id: &str) {
        let Some(template) = self.catalog.get(workout_id) else {
            return;
        };
        if let Err(e) = self.reconciler.sync_workout(&self.identity, template).await {
            tracing::warn!("Failed to sync '{}': {}", workout_id, e);
        }
    }

    fn mirror_session(&self) {
        self.reconciler
            .mirror_session(&self.identity, self.machine.session());
    }

    fn mirror_workouts(&self) {
        self.reconciler
            .mirror_workouts(&self.identity, self.catalog.workouts());
    }

    fn restart_clock(&mut self) {
        match self.machine.session().map(|s| s.started_at) {
            Some(started_at) => self.clock.restart(started_at),
            None => self.clock.stop(),
        }
    }
}
