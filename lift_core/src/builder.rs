//! Builds fresh, loggable sessions from workout templates.

use crate::types::*;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Sets per exercise when a template leaves `target_sets` at zero
pub const FALLBACK_TARGET_SETS: u32 = 3;

/// Target reps when a template leaves `target_reps` at zero
pub const FALLBACK_TARGET_REPS: u32 = 8;

/// Build an empty session for `template`, started now
pub fn build_session(template: &WorkoutTemplate) -> Session {
    build_session_at(template, Utc::now())
}

/// Build an empty session for `template` with an explicit start time.
///
/// Every set starts with blank reps, the exercise's default weight (blank
/// when the default is zero) and `done = false`.
pub fn build_session_at(template: &WorkoutTemplate, started_at: DateTime<Utc>) -> Session {
    let exercises = template
        .exercises
        .iter()
        .map(|def| Arc::new(build_exercise_log(def)))
        .collect();

    Session {
        workout_id: template.id.clone(),
        workout_name: template.name.clone(),
        started_at,
        exercises,
    }
}

fn build_exercise_log(def: &ExerciseDef) -> ExerciseLog {
    let set_count = non_zero_or(def.target_sets, FALLBACK_TARGET_SETS);
    let target_reps = non_zero_or(def.target_reps, FALLBACK_TARGET_REPS);
    let weight = if def.default_weight > 0.0 {
        FieldValue::from_number(def.default_weight)
    } else {
        FieldValue::empty()
    };

    let sets = (1..=set_count)
        .map(|index| {
            Arc::new(SetLog {
                index,
                target_reps,
                reps: FieldValue::empty(),
                weight: weight.clone(),
                done: false,
            })
        })
        .collect();

    ExerciseLog {
        id: def.id.clone(),
        name: def.name.clone(),
        sets,
    }
}

fn non_zero_or(value: u32, fallback: u32) -> u32 {
    if value == 0 {
        fallback
    } else {
        value
    }
}
