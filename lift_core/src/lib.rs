#![forbid(unsafe_code)]

//! Core domain model and business logic for the Lift workout tracker.
//!
//! This crate provides:
//! - Domain types (templates, sessions, sets, history entries)
//! - Workout catalog and CSV import
//! - Session state machine and rest/elapsed timers
//! - Persistence (local cache, remote store, reconciliation)
//! - History and per-exercise statistics

pub mod types;
pub mod error;
pub mod catalog;
pub mod config;
pub mod logging;
pub mod builder;
pub mod session;
pub mod ticker;
pub mod rest_timer;
pub mod clock;
pub mod csv_import;
pub mod cache;
pub mod remote;
pub mod reconciler;
pub mod history;
pub mod stats;
pub mod tracker;

// Re-export commonly used types
pub use error::{CompletionError, Error, ImportError, RemoteError, Result};
pub use types::*;
pub use catalog::{default_workouts, Catalog, ExercisePatch};
pub use config::Config;
pub use builder::build_session;
pub use session::{compute_volume, SessionMachine, SwitchOutcome, Toggle};
pub use rest_timer::{BellNotifier, Notifier, RestTimer, SilentNotifier};
pub use cache::{FileCache, LocalCache, MemoryCache};
pub use remote::{RemoteStore, TableStore};
pub use reconciler::Reconciler;
pub use history::HistoryLog;
pub use stats::ExerciseStats;
pub use tracker::Tracker;
