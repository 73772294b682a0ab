//! Per-exercise progress statistics over completed sessions.

use crate::remote::SessionSetRow;
use crate::HistoryEntry;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// One set in an exercise's chronological history
#[derive(Clone, Debug, PartialEq)]
pub struct StatPoint {
    pub date: DateTime<Utc>,
    pub reps: f64,
    pub weight: f64,
    pub volume: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ExerciseStats {
    pub name: String,
    pub total_sessions: usize,
    pub total_sets: u32,
    pub total_reps: f64,
    pub total_volume: f64,
    pub max_weight: f64,
    pub last_performed: Option<DateTime<Utc>>,
    /// Volume divided by reps; zero when no reps were logged
    pub avg_weight_per_rep: f64,
    pub history: Vec<StatPoint>,
}

#[derive(Default)]
struct Accumulator {
    sessions: HashSet<Uuid>,
    total_sets: u32,
    total_reps: f64,
    total_volume: f64,
    max_weight: f64,
    last_performed: Option<DateTime<Utc>>,
    history: Vec<StatPoint>,
}

/// Aggregate set rows by exercise name.
///
/// Sets whose session is not in `sessions` are ignored. Each set is dated by
/// its session's finish time. Results are sorted by total volume, largest
/// first.
pub fn exercise_stats(sessions: &[HistoryEntry], sets: &[SessionSetRow]) -> Vec<ExerciseStats> {
    let finished: HashMap<Uuid, DateTime<Utc>> =
        sessions.iter().map(|s| (s.id, s.finished_at)).collect();

    let mut by_name: HashMap<&str, Accumulator> = HashMap::new();
    for set in sets {
        let Some(&date) = finished.get(&set.session_id) else {
            continue;
        };
        if set.exercise_name.is_empty() {
            continue;
        }

        let acc = by_name.entry(set.exercise_name.as_str()).or_default();
        let volume = set.reps * set.weight;
        acc.sessions.insert(set.session_id);
        acc.total_sets += 1;
        acc.total_reps += set.reps;
        acc.total_volume += volume;
        acc.max_weight = acc.max_weight.max(set.weight);
        if acc.last_performed.map_or(true, |last| date > last) {
            acc.last_performed = Some(date);
        }
        acc.history.push(StatPoint {
            date,
            reps: set.reps,
            weight: set.weight,
            volume,
        });
    }

    let mut stats: Vec<ExerciseStats> = by_name
        .into_iter()
        .map(|(name, mut acc)| {
            acc.history.sort_by_key(|p| p.date);
            ExerciseStats {
                name: name.to_string(),
                total_sessions: acc.sessions.len(),
                total_sets: acc.total_sets,
                total_reps: acc.total_reps,
                total_volume: acc.total_volume,
                max_weight: acc.max_weight,
                last_performed: acc.last_performed,
                avg_weight_per_rep: if acc.total_reps > 0.0 {
                    acc.total_volume / acc.total_reps
                } else {
                    0.0
                },
                history: acc.history,
            }
        })
        .collect();

    stats.sort_by(|a, b| {
        b.total_volume
            .total_cmp(&a.total_volume)
            .then_with(|| a.name.cmp(&b.name))
    });
    stats
}
