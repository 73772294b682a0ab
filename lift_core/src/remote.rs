//! Remote data service: row types, the store trait, and a table-backed store.
//!
//! Four logical tables: `workouts`, `workout_exercises`, `sessions` and
//! `session_sets`. Every query is scoped by user id where the table has one.

use crate::cache::write_atomically;
use crate::RemoteError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

/// `workouts` row; `slug` is the template id
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct WorkoutRow {
    pub id: Uuid,
    pub user_id: String,
    pub slug: String,
    pub name: String,
    pub default_rest_seconds: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct NewWorkout {
    pub user_id: String,
    pub slug: String,
    pub name: String,
    pub default_rest_seconds: u32,
}

/// `workout_exercises` row, ordered by `position` within a workout
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct WorkoutExerciseRow {
    pub workout_id: Uuid,
    pub exercise_id: String,
    pub name: String,
    pub target_sets: u32,
    pub target_reps: u32,
    pub default_weight: f64,
    pub position: u32,
    #[serde(default)]
    pub rest_seconds: Option<u32>,
}

/// `sessions` row: one completed session
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SessionRow {
    pub id: Uuid,
    pub user_id: String,
    pub workout_id: String,
    pub workout_name: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub volume: f64,
    pub total_sets_done: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct NewSession {
    pub user_id: String,
    pub workout_id: String,
    pub workout_name: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub volume: f64,
    pub total_sets_done: u32,
}

/// `session_sets` row: one completed set of a session
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SessionSetRow {
    pub session_id: Uuid,
    pub exercise_id: String,
    pub exercise_name: String,
    pub set_index: u32,
    pub reps: f64,
    pub weight: f64,
}

/// Generic relational API of the remote store
#[allow(async_fn_in_trait)]
pub trait RemoteStore {
    async fn select_workouts(&self, user_id: &str) -> Result<Vec<WorkoutRow>, RemoteError>;

    /// Children of the given workouts, ordered by workout then position
    async fn select_workout_exercises(
        &self,
        workout_ids: &[Uuid],
    ) -> Result<Vec<WorkoutExerciseRow>, RemoteError>;

    async fn find_workout(
        &self,
        user_id: &str,
        slug: &str,
    ) -> Result<Option<WorkoutRow>, RemoteError>;

    async fn insert_workout(&self, row: NewWorkout) -> Result<WorkoutRow, RemoteError>;

    async fn update_workout(
        &self,
        id: Uuid,
        user_id: &str,
        name: &str,
        default_rest_seconds: u32,
    ) -> Result<(), RemoteError>;

    async fn delete_workout(&self, id: Uuid, user_id: &str) -> Result<(), RemoteError>;

    async fn delete_workout_exercises(&self, workout_id: Uuid) -> Result<(), RemoteError>;

    async fn insert_workout_exercises(
        &self,
        rows: &[WorkoutExerciseRow],
    ) -> Result<(), RemoteError>;

    async fn insert_session(&self, row: NewSession) -> Result<SessionRow, RemoteError>;

    async fn insert_session_sets(&self, rows: &[SessionSetRow]) -> Result<(), RemoteError>;

    /// Most recent first by `started_at`, at most `limit` rows
    async fn select_sessions(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<SessionRow>, RemoteError>;

    async fn select_session_sets(
        &self,
        session_ids: &[Uuid],
    ) -> Result<Vec<SessionSetRow>, RemoteError>;
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct Tables {
    #[serde(default)]
    workouts: Vec<WorkoutRow>,
    #[serde(default)]
    workout_exercises: Vec<WorkoutExerciseRow>,
    #[serde(default)]
    sessions: Vec<SessionRow>,
    #[serde(default)]
    session_sets: Vec<SessionSetRow>,
}

/// Tables held in memory, optionally backed by one JSON file.
///
/// A file-backed store re-reads the file before every operation and writes
/// it back atomically after every mutation, so separate processes see each
/// other's writes. There is no locking across processes: last writer wins.
#[derive(Debug, Default)]
pub struct TableStore {
    tables: Mutex<Tables>,
    backing: Option<PathBuf>,
    offline: AtomicBool,
}

impl TableStore {
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            backing: Some(path.into()),
            ..Self::default()
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.backing.as_deref()
    }

    /// Simulate losing the connection: every call fails while set
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, RemoteError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(RemoteError::Unavailable("store is offline".into()));
        }
        let mut tables = self.tables.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(path) = &self.backing {
            *tables = if path.exists() {
                serde_json::from_str(&std::fs::read_to_string(path)?)?
            } else {
                Tables::default()
            };
        }
        Ok(tables)
    }

    fn query<R>(&self, f: impl FnOnce(&Tables) -> R) -> Result<R, RemoteError> {
        let tables = self.lock()?;
        Ok(f(&tables))
    }

    fn mutate<R>(&self, f: impl FnOnce(&mut Tables) -> R) -> Result<R, RemoteError> {
        let mut tables = self.lock()?;
        let result = f(&mut tables);
        if let Some(path) = &self.backing {
            let contents = serde_json::to_vec(&*tables)?;
            write_atomically(path, &contents)?;
        }
        Ok(result)
    }
}

impl RemoteStore for TableStore {
    async fn select_workouts(&self, user_id: &str) -> Result<Vec<WorkoutRow>, RemoteError> {
        self.query(|t| {
            t.workouts
                .iter()
                .filter(|w| w.user_id == user_id)
                .cloned()
                .collect()
        })
    }

    async fn select_workout_exercises(
        &self,
        workout_ids: &[Uuid],
    ) -> Result<Vec<WorkoutExerciseRow>, RemoteError> {
        self.query(|t| {
            let mut rows: Vec<_> = t
                .workout_exercises
                .iter()
                .filter(|e| workout_ids.contains(&e.workout_id))
                .cloned()
                .collect();
            rows.sort_by_key(|e| (e.workout_id, e.position));
            rows
        })
    }

    async fn find_workout(
        &self,
        user_id: &str,
        slug: &str,
    ) -> Result<Option<WorkoutRow>, RemoteError> {
        self.query(|t| {
            t.workouts
                .iter()
                .find(|w| w.user_id == user_id && w.slug == slug)
                .cloned()
        })
    }

    async fn insert_workout(&self, row: NewWorkout) -> Result<WorkoutRow, RemoteError> {
        self.mutate(|t| {
            let inserted = WorkoutRow {
                id: Uuid::new_v4(),
                user_id: row.user_id,
                slug: row.slug,
                name: row.name,
                default_rest_seconds: row.default_rest_seconds,
            };
            t.workouts.push(inserted.clone());
            inserted
        })
    }

    async fn update_workout(
        &self,
        id: Uuid,
        user_id: &str,
        name: &str,
        default_rest_seconds: u32,
    ) -> Result<(), RemoteError> {
        self.mutate(|t| {
            match t
                .workouts
                .iter_mut()
                .find(|w| w.id == id && w.user_id == user_id)
            {
                Some(row) => {
                    row.name = name.to_string();
                    row.default_rest_seconds = default_rest_seconds;
                    Ok(())
                }
                None => Err(RemoteError::NotFound(format!("workout {}", id))),
            }
        })?
    }

    async fn delete_workout(&self, id: Uuid, user_id: &str) -> Result<(), RemoteError> {
        self.mutate(|t| {
            t.workouts.retain(|w| !(w.id == id && w.user_id == user_id));
        })
    }

    async fn delete_workout_exercises(&self, workout_id: Uuid) -> Result<(), RemoteError> {
        self.mutate(|t| t.workout_exercises.retain(|e| e.workout_id != workout_id))
    }

    async fn insert_workout_exercises(
        &self,
        rows: &[WorkoutExerciseRow],
    ) -> Result<(), RemoteError> {
        self.mutate(|t| t.workout_exercises.extend_from_slice(rows))
    }

    async fn insert_session(&self, row: NewSession) -> Result<SessionRow, RemoteError> {
        self.mutate(|t| {
            let inserted = SessionRow {
                id: Uuid::new_v4(),
                user_id: row.user_id,
                workout_id: row.workout_id,
                workout_name: row.workout_name,
                started_at: row.started_at,
                finished_at: row.finished_at,
                volume: row.volume,
                total_sets_done: row.total_sets_done,
            };
            t.sessions.push(inserted.clone());
            inserted
        })
    }

    async fn insert_session_sets(&self, rows: &[SessionSetRow]) -> Result<(), RemoteError> {
        self.mutate(|t| t.session_sets.extend_from_slice(rows))
    }

    async fn select_sessions(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<SessionRow>, RemoteError> {
        self.query(|t| {
            let mut rows: Vec<_> = t
                .sessions
                .iter()
                .filter(|s| s.user_id == user_id)
                .cloned()
                .collect();
            rows.sort_by(|a, b| b.started_at.cmp(&a.started_at));
            rows.truncate(limit);
            rows
        })
    }

    async fn select_session_sets(
        &self,
        session_ids: &[Uuid],
    ) -> Result<Vec<SessionSetRow>, RemoteError> {
        self.query(|t| {
            t.session_sets
                .iter()
                .filter(|s| session_ids.contains(&s.session_id))
                .cloned()
                .collect()
        })
    }
}
