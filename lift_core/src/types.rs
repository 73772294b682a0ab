//! Core domain types for Lift.
//!
//! This module defines the fundamental types used throughout the system:
//! - Workout templates and their exercise definitions
//! - The in-progress session with per-set raw input
//! - History entries summarising completed sessions
//! - User identity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

// ============================================================================
// Workout Templates
// ============================================================================

/// A named, reusable exercise plan
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct WorkoutTemplate {
    pub id: String,
    pub name: String,
    pub default_rest_seconds: u32,
    pub exercises: Vec<ExerciseDef>,
}

impl WorkoutTemplate {
    pub fn exercise(&self, exercise_id: &str) -> Option<&ExerciseDef> {
        self.exercises.iter().find(|e| e.id == exercise_id)
    }
}

/// One exercise within a template
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ExerciseDef {
    pub id: String,
    pub name: String,
    pub target_sets: u32,
    pub target_reps: u32,
    pub default_weight: f64,
    /// Per-exercise rest override; wins over the workout default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rest_seconds: Option<u32>,
}

// ============================================================================
// Raw set input
// ============================================================================

/// Raw user input for reps or weight.
///
/// Stored as text exactly as entered. Cached sessions written by older
/// clients may hold plain numbers, so both JSON strings and numbers are
/// accepted on read.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldValue(String);

impl FieldValue {
    pub fn empty() -> Self {
        Self(String::new())
    }

    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn from_number(value: f64) -> Self {
        Self(value.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Numeric view of the input; `None` when empty or not a finite number
    pub fn as_number(&self) -> Option<f64> {
        let trimmed = self.0.trim();
        if trimmed.is_empty() {
            return None;
        }
        trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FieldValue {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::from_number(value)
    }
}

impl<'de> Deserialize<'de> for FieldValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(f64),
            Missing(()),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(text) => FieldValue(text),
            Raw::Number(n) => FieldValue::from_number(n),
            Raw::Missing(()) => FieldValue::empty(),
        })
    }
}

/// Which editable input of a set is addressed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SetField {
    Reps,
    Weight,
}

/// A single edit to a set's raw input
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SetUpdate {
    Reps(FieldValue),
    Weight(FieldValue),
}

impl SetUpdate {
    pub fn field(&self) -> SetField {
        match self {
            SetUpdate::Reps(_) => SetField::Reps,
            SetUpdate::Weight(_) => SetField::Weight,
        }
    }
}

// ============================================================================
// Session Types
// ============================================================================

/// One in-progress attempt at a workout template.
///
/// Exercises and sets sit behind `Arc`: an edit re-allocates only the
/// touched exercise and set, so untouched nodes of an earlier snapshot
/// stay pointer-equal.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub workout_id: String,
    pub workout_name: String,
    pub started_at: DateTime<Utc>,
    pub exercises: Vec<Arc<ExerciseLog>>,
}

impl Session {
    pub fn exercise(&self, exercise_id: &str) -> Option<&ExerciseLog> {
        self.exercises
            .iter()
            .find(|e| e.id == exercise_id)
            .map(|e| e.as_ref())
    }

    pub fn set(&self, exercise_id: &str, set_index: u32) -> Option<&SetLog> {
        self.exercise(exercise_id)?
            .sets
            .iter()
            .find(|s| s.index == set_index)
            .map(|s| s.as_ref())
    }

    pub fn sets(&self) -> impl Iterator<Item = (&ExerciseLog, &SetLog)> {
        self.exercises
            .iter()
            .flat_map(|ex| ex.sets.iter().map(move |s| (ex.as_ref(), s.as_ref())))
    }
}

/// The sets logged for one exercise of a session
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ExerciseLog {
    pub id: String,
    pub name: String,
    pub sets: Vec<Arc<SetLog>>,
}

/// One logged set
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SetLog {
    /// 1-based, stable for the session's lifetime
    pub index: u32,
    pub target_reps: u32,
    #[serde(default)]
    pub reps: FieldValue,
    #[serde(default)]
    pub weight: FieldValue,
    #[serde(default)]
    pub done: bool,
}

impl SetLog {
    /// Reps and weight as numbers, if the set counts towards volume
    pub fn completed_load(&self) -> Option<(f64, f64)> {
        if !self.done {
            return None;
        }
        Some((self.reps.as_number()?, self.weight.as_number()?))
    }
}

/// A set that qualifies for history: done, with numeric reps and weight
#[derive(Clone, Debug, PartialEq)]
pub struct CompletedSet {
    pub exercise_id: String,
    pub exercise_name: String,
    pub set_index: u32,
    pub reps: f64,
    pub weight: f64,
}

impl CompletedSet {
    pub fn volume(&self) -> f64 {
        self.reps * self.weight
    }
}

// ============================================================================
// History
// ============================================================================

/// Immutable summary of one completed session
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub workout_id: String,
    pub workout_name: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub volume: f64,
    pub total_sets_done: u32,
}

// ============================================================================
// Identity
// ============================================================================

/// The user on whose behalf persistence calls are made
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Identity {
    Anonymous,
    User(String),
}

impl Identity {
    pub fn from_optional(id: Option<String>) -> Self {
        match id {
            Some(id) if !id.trim().is_empty() => Identity::User(id),
            _ => Identity::Anonymous,
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        match self {
            Identity::Anonymous => None,
            Identity::User(id) => Some(id),
        }
    }

    /// Segment used to namespace local cache keys
    pub fn cache_segment(&self) -> &str {
        self.user_id().unwrap_or("anon")
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.cache_segment())
    }
}
