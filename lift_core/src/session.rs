//! The in-progress session state machine.
//!
//! Owns the active [`Session`] and applies set edits to it. Edits that name
//! an exercise or set index the session does not contain are silent no-ops:
//! callers may hold references that went stale across a rebuild.

use crate::builder::build_session;
use crate::types::*;
use std::sync::Arc;

/// Which set was most recently marked done
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LastCompleted {
    pub exercise_id: String,
    pub set_index: u32,
}

/// Outcome of flipping a set's `done` flag
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Toggle {
    /// false -> true; the caller starts the rest timer
    Completed,
    /// true -> false; no timer side effect
    Reopened,
}

/// How `switch_workout` produced the new active session
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SwitchOutcome {
    Restored,
    Built,
}

#[derive(Clone, Debug, Default)]
pub struct SessionMachine {
    session: Option<Session>,
    last_completed: Option<LastCompleted>,
}

impl SessionMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(session: Session) -> Self {
        Self {
            session: Some(session),
            last_completed: None,
        }
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn last_completed(&self) -> Option<&LastCompleted> {
        self.last_completed.as_ref()
    }

    /// Replace one input of one set. Returns false for a stale reference.
    pub fn set_field(&mut self, exercise_id: &str, set_index: u32, update: SetUpdate) -> bool {
        let Some(set) = self.set_mut(exercise_id, set_index) else {
            tracing::debug!("Ignoring edit of unknown set {}#{}", exercise_id, set_index);
            return false;
        };
        match update {
            SetUpdate::Reps(value) => set.reps = value,
            SetUpdate::Weight(value) => set.weight = value,
        }
        true
    }

    /// Flip a set's `done` flag. Returns `None` for a stale reference.
    pub fn toggle_set_done(&mut self, exercise_id: &str, set_index: u32) -> Option<Toggle> {
        let set = self.set_mut(exercise_id, set_index)?;
        set.done = !set.done;

        if set.done {
            self.last_completed = Some(LastCompleted {
                exercise_id: exercise_id.to_string(),
                set_index,
            });
            Some(Toggle::Completed)
        } else {
            Some(Toggle::Reopened)
        }
    }

    /// Discard the active session and start over from `template`
    pub fn reset(&mut self, template: &WorkoutTemplate) -> &Session {
        self.last_completed = None;
        self.session.insert(build_session(template))
    }

    /// Make `template` the active workout.
    ///
    /// A `cached` session for the same workout id is reused verbatim; anything
    /// else is discarded and a fresh session is built. Returns the outcome and
    /// the session that was active before.
    pub fn switch_workout(
        &mut self,
        template: &WorkoutTemplate,
        cached: Option<Session>,
    ) -> (SwitchOutcome, Option<Session>) {
        self.last_completed = None;
        let (next, outcome) = match cached {
            Some(session) if session.workout_id == template.id => {
                (session, SwitchOutcome::Restored)
            }
            _ => (build_session(template), SwitchOutcome::Built),
        };
        (outcome, self.session.replace(next))
    }

    /// Wholesale replacement, used when persistence hands back a session
    pub fn replace(&mut self, session: Session) -> Option<Session> {
        self.last_completed = None;
        self.session.replace(session)
    }

    pub fn volume(&self) -> f64 {
        self.session.as_ref().map(compute_volume).unwrap_or(0.0)
    }

    /// Find a set for mutation, copying only the nodes on its path when an
    /// older snapshot still shares them
    fn set_mut(&mut self, exercise_id: &str, set_index: u32) -> Option<&mut SetLog> {
        let session = self.session.as_mut()?;
        let exercise = session.exercises.iter_mut().find(|e| e.id == exercise_id)?;
        let position = exercise.sets.iter().position(|s| s.index == set_index)?;
        let exercise = Arc::make_mut(exercise);
        Some(Arc::make_mut(&mut exercise.sets[position]))
    }
}

/// Sum of reps x weight over done sets with numeric reps and weight
pub fn compute_volume(session: &Session) -> f64 {
    session
        .sets()
        .filter_map(|(_, set)| set.completed_load())
        .map(|(reps, weight)| reps * weight)
        .sum()
}

/// The sets that count for history, in session order
pub fn completed_sets(session: &Session) -> Vec<CompletedSet> {
    session
        .sets()
        .filter_map(|(exercise, set)| {
            let (reps, weight) = set.completed_load()?;
            Some(CompletedSet {
                exercise_id: exercise.id.clone(),
                exercise_name: exercise.name.clone(),
                set_index: set.index,
                reps,
                weight,
            })
        })
        .collect()
}

/// Count of sets that also contribute to `compute_volume`
pub fn total_sets_done(session: &Session) -> u32 {
    session
        .sets()
        .filter(|(_, set)| set.completed_load().is_some())
        .count() as u32
}
