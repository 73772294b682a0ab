//! Error types for the lift_core library.

use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for lift_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Catalog validation or lookup error
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// CSV import rejected
    #[error("Import error: {0}")]
    Import(#[from] ImportError),

    /// Session completion rejected or failed
    #[error("Completion error: {0}")]
    Completion(#[from] CompletionError),

    /// Remote store error
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

/// Failures reported by a remote store
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    /// The store could not be reached
    #[error("remote store unavailable: {0}")]
    Unavailable(String),

    /// A referenced row does not exist
    #[error("row not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Reasons a session could not be folded into history
#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    /// No set is done with both reps and weight filled in
    #[error("no completed sets to save")]
    NothingCompleted,

    /// History lives in the remote store, which needs a user
    #[error("sign in to save sessions")]
    NotSignedIn,

    /// The session row could not be written
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

/// Reasons a CSV import was rejected as a whole
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("file contains no exercise rows")]
    Empty,

    #[error("missing column '{0}'")]
    MissingColumn(&'static str),

    #[error("line {line}: missing value for '{field}'")]
    MissingField { line: u64, field: &'static str },

    #[error("line {line}: '{value}' is not a valid number for '{field}'")]
    InvalidNumber {
        line: u64,
        field: &'static str,
        value: String,
    },

    #[error("line {line}: workout '{workout_id}' already has exercise '{exercise_id}'")]
    DuplicateExercise {
        line: u64,
        workout_id: String,
        exercise_id: String,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}
