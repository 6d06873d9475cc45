//! Error type shared by the task store, the engine modules and the CLI.

use thiserror::Error;

/// Every failure the engine reports to its caller.
///
/// Variants follow the error taxonomy of the engine: validation problems are
/// caught before anything is written, lookups fail the whole operation, workflow
/// rejections are per task, and recurrence failures never undo the status change
/// that triggered them.
#[derive(Error, Debug)]
pub enum FirmError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: u64 },

    #[error("task {task_id}: {reason}")]
    TransitionRejected { task_id: u64, reason: String },

    #[error("recurrence for task {task_id} failed: {reason}")]
    Recurrence { task_id: u64, reason: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, FirmError>;

impl FirmError {
    pub fn validation(msg: impl Into<String>) -> Self {
        FirmError::Validation(msg.into())
    }

    pub fn not_found(kind: &'static str, id: u64) -> Self {
        FirmError::NotFound { kind, id }
    }

    pub fn recurrence(task_id: u64, reason: impl Into<String>) -> Self {
        FirmError::Recurrence { task_id, reason: reason.into() }
    }
}
