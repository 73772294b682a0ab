//! Persistence reconciler: moves sessions, templates and history between
//! memory, the local cache and the remote store.
//!
//! Reads prefer the remote store and fall back to the cache, then to
//! built-in defaults. Cache writes are best effort. Remote failures are
//! returned to the caller or logged; nothing here panics.

use crate::cache::{
    self, cache_key, LocalCache, HISTORY_KEY, SELECTED_WORKOUT_KEY, SESSION_KEY, WORKOUTS_KEY,
};
use crate::catalog::default_workouts;
use crate::remote::{NewSession, NewWorkout, RemoteStore, SessionSetRow, WorkoutExerciseRow};
use crate::session::completed_sets;
use crate::stats::{exercise_stats, ExerciseStats};
use crate::types::*;
use crate::{CompletionError, RemoteError};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Where loaded templates came from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Source {
    Remote,
    /// Remote had nothing for this user; defaults were written there
    Bootstrapped,
    Cache,
    Defaults,
}

/// Everything needed to rebuild in-memory state for one identity
#[derive(Clone, Debug)]
pub struct Loaded {
    pub workouts: Vec<WorkoutTemplate>,
    pub source: Source,
    /// Most recent first
    pub history: Vec<HistoryEntry>,
    /// Last active session, whichever workout it belongs to
    pub cached_session: Option<Session>,
    pub selected: Option<String>,
}

pub struct Reconciler<R> {
    remote: R,
    cache: Arc<dyn LocalCache>,
    history_limit: usize,
}

impl<R: RemoteStore> Reconciler<R> {
    pub fn new(remote: R, cache: Arc<dyn LocalCache>, history_limit: usize) -> Self {
        Self {
            remote,
            cache,
            history_limit: history_limit.max(1),
        }
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    pub fn cache(&self) -> &dyn LocalCache {
        self.cache.as_ref()
    }

    /// Load templates, history and the cached session for `identity`.
    ///
    /// Remote history replaces whatever history was cached.
    pub async fn load(&self, identity: &Identity) -> Loaded {
        let (workouts, source) = self.load_workouts(identity).await;
        self.mirror_workouts(identity, &workouts);

        let history = self.load_history(identity).await;
        let cached_session =
            cache::read_json::<Session>(self.cache(), &cache_key(SESSION_KEY, identity));
        let selected =
            cache::read_json::<String>(self.cache(), &cache_key(SELECTED_WORKOUT_KEY, identity));

        tracing::info!(
            "Loaded {} workouts ({:?}) and {} history entries for {}",
            workouts.len(),
            source,
            history.len(),
            identity
        );

        Loaded {
            workouts,
            source,
            history,
            cached_session,
            selected,
        }
    }

    async fn load_workouts(&self, identity: &Identity) -> (Vec<WorkoutTemplate>, Source) {
        let Some(user_id) = identity.user_id() else {
            return self.cached_workouts_or_defaults(identity);
        };

        match self.fetch_workouts(user_id).await {
            Ok(workouts) if !workouts.is_empty() => return (workouts, Source::Remote),
            Ok(_) => {}
            Err(e) => {
                tracing::warn!("Failed to load workouts for {}: {}", identity, e);
                return self.cached_workouts_or_defaults(identity);
            }
        }

        tracing::info!("No workouts stored for {}, writing defaults", identity);
        for template in default_workouts() {
            if let Err(e) = self.sync_workout(identity, template).await {
                tracing::warn!("Failed to bootstrap '{}': {}", template.id, e);
            }
        }

        match self.fetch_workouts(user_id).await {
            Ok(workouts) if !workouts.is_empty() => (workouts, Source::Bootstrapped),
            Ok(_) => (default_workouts().to_vec(), Source::Defaults),
            Err(e) => {
                tracing::warn!("Failed to re-read workouts for {}: {}", identity, e);
                (default_workouts().to_vec(), Source::Defaults)
            }
        }
    }

    fn cached_workouts_or_defaults(&self, identity: &Identity) -> (Vec<WorkoutTemplate>, Source) {
        match cache::read_json::<Vec<WorkoutTemplate>>(
            self.cache(),
            &cache_key(WORKOUTS_KEY, identity),
        ) {
            Some(workouts) if !workouts.is_empty() => (workouts, Source::Cache),
            _ => (default_workouts().to_vec(), Source::Defaults),
        }
    }

    /// Assemble templates from workout rows and their ordered children
    async fn fetch_workouts(&self, user_id: &str) -> Result<Vec<WorkoutTemplate>, RemoteError> {
        let rows = self.remote.select_workouts(user_id).await?;
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<_> = rows.iter().map(|r| r.id).collect();
        let mut children = self.remote.select_workout_exercises(&ids).await?;
        children.sort_by_key(|c| c.position);

        Ok(rows
            .into_iter()
            .map(|row| WorkoutTemplate {
                exercises: children
                    .iter()
                    .filter(|c| c.workout_id == row.id)
                    .map(|c| ExerciseDef {
                        id: c.exercise_id.clone(),
                        name: c.name.clone(),
                        target_sets: c.target_sets,
                        target_reps: c.target_reps,
                        default_weight: c.default_weight,
                        rest_seconds: c.rest_seconds,
                    })
                    .collect(),
                id: row.slug,
                name: row.name,
                default_rest_seconds: row.default_rest_seconds,
            })
            .collect())
    }

    async fn load_history(&self, identity: &Identity) -> Vec<HistoryEntry> {
        let key = cache_key(HISTORY_KEY, identity);
        let Some(user_id) = identity.user_id() else {
            return cache::read_json(self.cache(), &key).unwrap_or_default();
        };

        match self.remote.select_sessions(user_id, self.history_limit).await {
            Ok(rows) => {
                let history: Vec<HistoryEntry> = rows.into_iter().map(HistoryEntry::from).collect();
                cache::write_json(self.cache(), &key, &history);
                history
            }
            Err(e) => {
                tracing::warn!("Failed to load history for {}: {}", identity, e);
                cache::read_json(self.cache(), &key).unwrap_or_default()
            }
        }
    }

    /// Mirror the active session; `None` clears the cached one
    pub fn mirror_session(&self, identity: &Identity, session: Option<&Session>) {
        let key = cache_key(SESSION_KEY, identity);
        match session {
            Some(session) => cache::write_json(self.cache(), &key, session),
            None => cache::forget(self.cache(), &key),
        }
    }

    pub fn mirror_workouts(&self, identity: &Identity, workouts: &[WorkoutTemplate]) {
        cache::write_json(self.cache(), &cache_key(WORKOUTS_KEY, identity), workouts);
    }

    pub fn mirror_history(&self, identity: &Identity, history: &[HistoryEntry]) {
        cache::write_json(self.cache(), &cache_key(HISTORY_KEY, identity), history);
    }

    pub fn mirror_selected(&self, identity: &Identity, workout_id: &str) {
        cache::write_json(
            self.cache(),
            &cache_key(SELECTED_WORKOUT_KEY, identity),
            workout_id,
        );
    }

    /// Upsert the workout row by slug, then replace all of its exercise rows
    /// with the template's list in order. Anonymous users have no remote copy.
    pub async fn sync_workout(
        &self,
        identity: &Identity,
        template: &WorkoutTemplate,
    ) -> Result<(), RemoteError> {
        let Some(user_id) = identity.user_id() else {
            tracing::debug!("Skipping remote sync of '{}' for anonymous user", template.id);
            return Ok(());
        };

        let workout_id = match self.remote.find_workout(user_id, &template.id).await? {
            Some(existing) => {
                self.remote
                    .update_workout(
                        existing.id,
                        user_id,
                        &template.name,
                        template.default_rest_seconds,
                    )
                    .await?;
                existing.id
            }
            None => {
                self.remote
                    .insert_workout(NewWorkout {
                        user_id: user_id.to_string(),
                        slug: template.id.clone(),
                        name: template.name.clone(),
                        default_rest_seconds: template.default_rest_seconds,
                    })
                    .await?
                    .id
            }
        };

        self.remote.delete_workout_exercises(workout_id).await?;

        let rows: Vec<WorkoutExerciseRow> = template
            .exercises
            .iter()
            .zip(0u32..)
            .map(|(ex, position)| WorkoutExerciseRow {
                workout_id,
                exercise_id: ex.id.clone(),
                name: ex.name.clone(),
                target_sets: ex.target_sets,
                target_reps: ex.target_reps,
                default_weight: ex.default_weight,
                position,
                rest_seconds: ex.rest_seconds,
            })
            .collect();
        if !rows.is_empty() {
            self.remote.insert_workout_exercises(&rows).await?;
        }

        tracing::info!("Synced workout '{}' ({} exercises)", template.id, rows.len());
        Ok(())
    }

    /// Remove a workout and its exercise rows; missing rows are not an error
    pub async fn delete_workout(
        &self,
        identity: &Identity,
        workout_id: &str,
    ) -> Result<(), RemoteError> {
        let Some(user_id) = identity.user_id() else {
            return Ok(());
        };
        let Some(existing) = self.remote.find_workout(user_id, workout_id).await? else {
            return Ok(());
        };

        self.remote.delete_workout_exercises(existing.id).await?;
        self.remote.delete_workout(existing.id, user_id).await?;
        tracing::info!("Deleted workout '{}'", workout_id);
        Ok(())
    }

    /// Write a finished session to the remote store.
    ///
    /// Rejected before any write when no set qualifies. Once the session row
    /// is stored the entry is returned even if its set rows fail to insert.
    pub async fn complete_session(
        &self,
        identity: &Identity,
        session: &Session,
        finished_at: DateTime<Utc>,
    ) -> Result<HistoryEntry, CompletionError> {
        let completed = completed_sets(session);
        if completed.is_empty() {
            return Err(CompletionError::NothingCompleted);
        }
        let user_id = identity.user_id().ok_or(CompletionError::NotSignedIn)?;

        let volume: f64 = completed.iter().map(CompletedSet::volume).sum();
        let total_sets_done = u32::try_from(completed.len()).unwrap_or(u32::MAX);

        let row = self
            .remote
            .insert_session(NewSession {
                user_id: user_id.to_string(),
                workout_id: session.workout_id.clone(),
                workout_name: session.workout_name.clone(),
                started_at: session.started_at,
                finished_at: finished_at.max(session.started_at),
                volume,
                total_sets_done,
            })
            .await?;

        let set_rows: Vec<SessionSetRow> = completed
            .into_iter()
            .map(|set| SessionSetRow {
                session_id: row.id,
                exercise_id: set.exercise_id,
                exercise_name: set.exercise_name,
                set_index: set.set_index,
                reps: set.reps,
                weight: set.weight,
            })
            .collect();
        if let Err(e) = self.remote.insert_session_sets(&set_rows).await {
            tracing::warn!("Session {} saved without its sets: {}", row.id, e);
        }

        tracing::info!(
            "Completed '{}': {} sets, volume {}",
            row.workout_name,
            row.total_sets_done,
            row.volume
        );
        Ok(HistoryEntry::from(row))
    }

    /// Per-exercise statistics over every completed session, not just the
    /// history window
    pub async fn load_stats(&self, identity: &Identity) -> Result<Vec<ExerciseStats>, RemoteError> {
        let Some(user_id) = identity.user_id() else {
            return Ok(Vec::new());
        };

        let sessions: Vec<HistoryEntry> = self
            .remote
            .select_sessions(user_id, usize::MAX)
            .await?
            .into_iter()
            .map(HistoryEntry::from)
            .collect();
        if sessions.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<_> = sessions.iter().map(|s| s.id).collect();
        let sets = self.remote.select_session_sets(&ids).await?;
        Ok(exercise_stats(&sessions, &sets))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::build_session;
    use crate::cache::tests::FullCache;
    use crate::cache::MemoryCache;
    use crate::remote::TableStore;
    use chrono::Duration;

    fn ada() -> Identity {
        Identity::User("ada".into())
    }

    fn reconciler() -> Reconciler<TableStore> {
        Reconciler::new(TableStore::in_memory(), Arc::new(MemoryCache::new()), 50)
    }

    fn logged_session() -> Session {
        let mut session = build_session(&default_workouts()[0]);
        let exercise = Arc::make_mut(&mut session.exercises[0]);
        let set = Arc::make_mut(&mut exercise.sets[0]);
        set.reps = FieldValue::from_number(5.0);
        set.weight = FieldValue::from_number(60.0);
        set.done = true;
        session
    }

    #[tokio::test]
    async fn test_load_bootstraps_defaults_for_new_user() {
        let rec = reconciler();
        let loaded = rec.load(&ada()).await;

        assert_eq!(loaded.source, Source::Bootstrapped);
        assert_eq!(loaded.workouts, default_workouts());
        assert_eq!(rec.remote().select_workouts("ada").await.unwrap().len(), 2);

        // Second load reads them back instead of writing again
        let again = rec.load(&ada()).await;
        assert_eq!(again.source, Source::Remote);
        assert_eq!(rec.remote().select_workouts("ada").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_sync_workout_replaces_children_in_order() {
        let rec = reconciler();
        let mut template = default_workouts()[0].clone();
        rec.sync_workout(&ada(), &template).await.unwrap();

        template.name = "Renamed".into();
        template.exercises.reverse();
        template.exercises.pop();
        rec.sync_workout(&ada(), &template).await.unwrap();

        let rows = rec.remote().select_workouts("ada").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "Renamed");

        let loaded = rec.fetch_workouts("ada").await.unwrap();
        assert_eq!(loaded, vec![template]);
    }

    #[tokio::test]
    async fn test_offline_load_falls_back_to_cache_then_defaults() {
        let rec = reconciler();
        rec.remote().set_offline(true);

        let loaded = rec.load(&ada()).await;
        assert_eq!(loaded.source, Source::Defaults);
        assert!(loaded.history.is_empty());

        let custom = vec![WorkoutTemplate {
            id: "legs".into(),
            name: "Legs".into(),
            default_rest_seconds: 60,
            exercises: Vec::new(),
        }];
        rec.mirror_workouts(&ada(), &custom);
        let loaded = rec.load(&ada()).await;
        assert_eq!(loaded.source, Source::Cache);
        assert_eq!(loaded.workouts, custom);
    }

    #[tokio::test]
    async fn test_remote_history_replaces_cached_history() {
        let rec = reconciler();
        let stale = HistoryEntry {
            id: uuid::Uuid::new_v4(),
            workout_id: "old".into(),
            workout_name: "Old".into(),
            started_at: Utc::now() - Duration::days(3),
            finished_at: Utc::now() - Duration::days(3),
            volume: 1.0,
            total_sets_done: 1,
        };
        rec.mirror_history(&ada(), &[stale]);

        let entry = rec
            .complete_session(&ada(), &logged_session(), Utc::now())
            .await
            .unwrap();

        let loaded = rec.load(&ada()).await;
        assert_eq!(loaded.history, vec![entry]);
    }

    #[tokio::test]
    async fn test_complete_session_writes_rows() {
        let rec = reconciler();
        let session = logged_session();
        let entry = rec
            .complete_session(&ada(), &session, Utc::now())
            .await
            .unwrap();

        assert_eq!(entry.volume, 300.0);
        assert_eq!(entry.total_sets_done, 1);
        assert!(entry.finished_at >= entry.started_at);

        let sets = rec.remote().select_session_sets(&[entry.id]).await.unwrap();
        assert_eq!(sets.len(), 1);
        assert_eq!(sets[0].exercise_id, "squat");
        assert_eq!(sets[0].set_index, 1);
    }

    #[tokio::test]
    async fn test_complete_session_rejects_empty_before_writing() {
        let rec = reconciler();
        let session = build_session(&default_workouts()[0]);

        let result = rec.complete_session(&ada(), &session, Utc::now()).await;
        assert!(matches!(result, Err(CompletionError::NothingCompleted)));
        assert!(rec.remote().select_sessions("ada", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_complete_session_requires_identity_and_remote() {
        let rec = reconciler();
        let result = rec
            .complete_session(&Identity::Anonymous, &logged_session(), Utc::now())
            .await;
        assert!(matches!(result, Err(CompletionError::NotSignedIn)));

        rec.remote().set_offline(true);
        let result = rec.complete_session(&ada(), &logged_session(), Utc::now()).await;
        assert!(matches!(result, Err(CompletionError::Remote(_))));
    }

    #[tokio::test]
    async fn test_failing_cache_never_blocks() {
        let rec = Reconciler::new(TableStore::in_memory(), Arc::new(FullCache), 50);
        let session = logged_session();
        rec.mirror_session(&ada(), Some(&session));
        rec.mirror_session(&ada(), None);

        let loaded = rec.load(&ada()).await;
        assert!(loaded.cached_session.is_none());
        assert_eq!(loaded.workouts.len(), 2);
    }

    #[tokio::test]
    async fn test_delete_workout_removes_rows() {
        let rec = reconciler();
        rec.load(&ada()).await;
        rec.delete_workout(&ada(), "fullbody-1").await.unwrap();
        // Unknown slugs are fine
        rec.delete_workout(&ada(), "nope").await.unwrap();

        let rows = rec.remote().select_workouts("ada").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].slug, "fullbody-2");
    }

    #[tokio::test]
    async fn test_load_stats() {
        let rec = reconciler();
        assert!(rec.load_stats(&Identity::Anonymous).await.unwrap().is_empty());

        rec.complete_session(&ada(), &logged_session(), Utc::now())
            .await
            .unwrap();
        let stats = rec.load_stats(&ada()).await.unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].name, "Squat");
        assert_eq!(stats[0].total_volume, 300.0);
    }

    #[tokio::test]
    async fn test_load_stats_counts_sessions_beyond_history_limit() {
        let rec = Reconciler::new(TableStore::in_memory(), Arc::new(MemoryCache::new()), 2);
        for _ in 0..5 {
            rec.complete_session(&ada(), &logged_session(), Utc::now())
                .await
                .unwrap();
        }

        assert_eq!(rec.load(&ada()).await.history.len(), 2);

        let stats = rec.load_stats(&ada()).await.unwrap();
        assert_eq!(stats[0].total_sessions, 5);
        assert_eq!(stats[0].total_volume, 1500.0);
    }
}
