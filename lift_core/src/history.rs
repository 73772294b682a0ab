//! History log of completed sessions, most recent first.

use crate::remote::SessionRow;
use crate::HistoryEntry;

impl From<SessionRow> for HistoryEntry {
    fn from(row: SessionRow) -> Self {
        HistoryEntry {
            id: row.id,
            workout_id: row.workout_id,
            workout_name: row.workout_name,
            started_at: row.started_at,
            finished_at: row.finished_at,
            volume: row.volume,
            total_sets_done: row.total_sets_done,
        }
    }
}

/// Append-at-front record of completed sessions. Entries never change once
/// added; the whole log is only ever replaced by an authoritative reload.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HistoryLog {
    entries: Vec<HistoryEntry>,
}

impl HistoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from entries already ordered most recent first
    pub fn from_entries(entries: Vec<HistoryEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.entries.first()
    }

    pub fn prepend(&mut self, entry: HistoryEntry) {
        self.entries.insert(0, entry);
    }

    /// Discard everything in favour of `entries`
    pub fn replace(&mut self, entries: Vec<HistoryEntry>) {
        self.entries = entries;
    }

    pub fn total_volume(&self) -> f64 {
        self.entries.iter().map(|e| e.volume).sum()
    }

    pub fn total_sets(&self) -> u32 {
        self.entries.iter().map(|e| e.total_sets_done).sum()
    }
}
