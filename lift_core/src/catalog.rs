//! Workout catalog: built-in templates and the editor operations on them.

use crate::types::*;
use crate::{Error, Result};
use once_cell::sync::Lazy;
use std::collections::HashSet;

/// Cached default templates - built once and reused for bootstrap and fallback
static DEFAULT_WORKOUTS: Lazy<Vec<WorkoutTemplate>> = Lazy::new(build_default_workouts);

/// Get a reference to the built-in workout templates
pub fn default_workouts() -> &'static [WorkoutTemplate] {
    &DEFAULT_WORKOUTS
}

fn exercise(id: &str, name: &str, sets: u32, reps: u32, weight: f64) -> ExerciseDef {
    ExerciseDef {
        id: id.into(),
        name: name.into(),
        target_sets: sets,
        target_reps: reps,
        default_weight: weight,
        rest_seconds: None,
    }
}

fn build_default_workouts() -> Vec<WorkoutTemplate> {
    vec![
        WorkoutTemplate {
            id: "fullbody-1".into(),
            name: "Full Body A".into(),
            default_rest_seconds: 90,
            exercises: vec![
                exercise("squat", "Squat", 4, 6, 60.0),
                exercise("bench", "Bench Press", 4, 6, 50.0),
                exercise("row", "Barbell Row", 3, 8, 40.0),
            ],
        },
        WorkoutTemplate {
            id: "fullbody-2".into(),
            name: "Full Body B".into(),
            default_rest_seconds: 120,
            exercises: vec![
                exercise("deadlift", "Deadlift", 3, 5, 80.0),
                exercise("ohp", "Overhead Press", 3, 8, 30.0),
                ExerciseDef {
                    rest_seconds: Some(60),
                    ..exercise("pullup", "Pull-up", 3, 8, 0.0)
                },
            ],
        },
    ]
}

/// Template installed when the last workout is deleted
pub fn fallback_workout() -> WorkoutTemplate {
    WorkoutTemplate {
        id: "fullbody-a".into(),
        name: "Full Body A".into(),
        default_rest_seconds: 90,
        exercises: Vec::new(),
    }
}

/// A single edit to an exercise definition
#[derive(Clone, Debug, PartialEq)]
pub enum ExercisePatch {
    Name(String),
    TargetSets(u32),
    TargetReps(u32),
    DefaultWeight(f64),
    RestSeconds(Option<u32>),
}

impl ExercisePatch {
    /// Reject values that would break a template invariant
    pub fn check(&self) -> Result<()> {
        let problem = match self {
            Self::Name(name) if name.trim().is_empty() => "exercise name cannot be empty",
            Self::TargetSets(0) => "target sets must be at least 1",
            Self::TargetReps(0) => "target reps must be at least 1",
            Self::DefaultWeight(w) if !w.is_finite() || *w < 0.0 => {
                "default weight must be a non-negative number"
            }
            _ => return Ok(()),
        };
        Err(Error::Catalog(problem.to_string()))
    }
}

/// Ordered collection of workout templates
#[derive(Clone, Debug, PartialEq)]
pub struct Catalog {
    workouts: Vec<WorkoutTemplate>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new(default_workouts().to_vec())
    }
}

impl Catalog {
    pub fn new(workouts: Vec<WorkoutTemplate>) -> Self {
        Self { workouts }
    }

    pub fn workouts(&self) -> &[WorkoutTemplate] {
        &self.workouts
    }

    pub fn get(&self, workout_id: &str) -> Option<&WorkoutTemplate> {
        self.workouts.iter().find(|w| w.id == workout_id)
    }

    pub fn first(&self) -> Option<&WorkoutTemplate> {
        self.workouts.first()
    }

    pub fn is_empty(&self) -> bool {
        self.workouts.is_empty()
    }

    pub fn replace_all(&mut self, workouts: Vec<WorkoutTemplate>) {
        self.workouts = workouts;
    }

    /// Replace the template with the same id, or append it
    pub fn upsert(&mut self, template: WorkoutTemplate) {
        match self.workouts.iter_mut().find(|w| w.id == template.id) {
            Some(existing) => *existing = template,
            None => self.workouts.push(template),
        }
    }

    fn get_mut(&mut self, workout_id: &str) -> Result<&mut WorkoutTemplate> {
        self.workouts
            .iter_mut()
            .find(|w| w.id == workout_id)
            .ok_or_else(|| Error::Catalog(format!("unknown workout '{}'", workout_id)))
    }

    pub fn rename_workout(&mut self, workout_id: &str, name: &str) -> Result<&WorkoutTemplate> {
        let workout = self.get_mut(workout_id)?;
        workout.name = name.to_string();
        Ok(workout)
    }

    pub fn set_default_rest(&mut self, workout_id: &str, seconds: u32) -> Result<&WorkoutTemplate> {
        let workout = self.get_mut(workout_id)?;
        workout.default_rest_seconds = seconds;
        Ok(workout)
    }

    /// Append a placeholder exercise and return its generated id
    pub fn add_exercise(&mut self, workout_id: &str) -> Result<String> {
        let workout = self.get_mut(workout_id)?;
        let mut id = new_exercise_id();
        while workout.exercise(&id).is_some() {
            id = new_exercise_id();
        }
        workout
            .exercises
            .push(exercise(&id, "New exercise", 3, 10, 0.0));
        Ok(id)
    }

    /// Returns false when the exercise is not part of the workout
    pub fn remove_exercise(&mut self, workout_id: &str, exercise_id: &str) -> Result<bool> {
        let workout = self.get_mut(workout_id)?;
        let before = workout.exercises.len();
        workout.exercises.retain(|e| e.id != exercise_id);
        Ok(workout.exercises.len() != before)
    }

    pub fn update_exercise(
        &mut self,
        workout_id: &str,
        exercise_id: &str,
        patch: ExercisePatch,
    ) -> Result<bool> {
        patch.check()?;
        let workout = self.get_mut(workout_id)?;
        let Some(def) = workout.exercises.iter_mut().find(|e| e.id == exercise_id) else {
            return Ok(false);
        };
        match patch {
            ExercisePatch::Name(name) => def.name = name,
            ExercisePatch::TargetSets(sets) => def.target_sets = sets,
            ExercisePatch::TargetReps(reps) => def.target_reps = reps,
            ExercisePatch::DefaultWeight(weight) => def.default_weight = weight,
            ExercisePatch::RestSeconds(rest) => def.rest_seconds = rest,
        }
        Ok(true)
    }

    /// Drag-to-reorder: take `dragged` out and insert it where `target` was.
    ///
    /// No-op when the ids are equal or either is missing.
    pub fn move_exercise(&mut self, workout_id: &str, dragged: &str, target: &str) -> Result<bool> {
        let workout = self.get_mut(workout_id)?;
        if dragged == target {
            return Ok(false);
        }
        let from = workout.exercises.iter().position(|e| e.id == dragged);
        let to = workout.exercises.iter().position(|e| e.id == target);
        let (Some(from), Some(to)) = (from, to) else {
            return Ok(false);
        };
        let moved = workout.exercises.remove(from);
        workout.exercises.insert(to, moved);
        Ok(true)
    }

    /// Remove a workout. An emptied catalog gets the fallback template.
    pub fn remove_workout(&mut self, workout_id: &str) -> Option<WorkoutTemplate> {
        let position = self.workouts.iter().position(|w| w.id == workout_id)?;
        let removed = self.workouts.remove(position);
        if self.workouts.is_empty() {
            self.workouts.push(fallback_workout());
        }
        Some(removed)
    }

    /// Merge imported templates: same id replaces, new ids append in order
    pub fn merge(&mut self, imported: Vec<WorkoutTemplate>) {
        for template in imported {
            self.upsert(template);
        }
    }

    /// Validate the catalog for consistency
    ///
    /// Returns a list of validation errors, or empty Vec if valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        let mut workout_ids = HashSet::new();

        for workout in &self.workouts {
            if workout.id.is_empty() {
                errors.push("Workout has empty ID".to_string());
            }
            if !workout_ids.insert(workout.id.as_str()) {
                errors.push(format!("Duplicate workout ID '{}'", workout.id));
            }
            if workout.name.is_empty() {
                errors.push(format!("Workout '{}' has empty name", workout.id));
            }

            let mut exercise_ids = HashSet::new();
            for def in &workout.exercises {
                if def.id.is_empty() {
                    errors.push(format!("Workout '{}' has exercise with empty ID", workout.id));
                }
                if !exercise_ids.insert(def.id.as_str()) {
                    errors.push(format!(
                        "Workout '{}' has duplicate exercise ID '{}'",
                        workout.id, def.id
                    ));
                }
                if def.name.is_empty() {
                    errors.push(format!(
                        "Workout '{}': exercise '{}' has empty name",
                        workout.id, def.id
                    ));
                }
                if def.target_sets == 0 || def.target_reps == 0 {
                    errors.push(format!(
                        "Workout '{}': exercise '{}' needs at least 1 set and 1 rep",
                        workout.id, def.id
                    ));
                }
                if def.default_weight.is_nan() || def.default_weight < 0.0 {
                    errors.push(format!(
                        "Workout '{}': exercise '{}' has invalid weight {}",
                        workout.id, def.id, def.default_weight
                    ));
                }
            }
        }

        errors
    }
}

fn new_exercise_id() -> String {
    let simple = uuid::Uuid::new_v4().simple().to_string();
    format!("ex-{}", &simple[..8])
}
