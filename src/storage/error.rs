use crate::core::Error as CoreError;
use thiserror::Error;
use uuid::Uuid;

/// Storage layer error type.
///
/// Wraps backend errors while preserving the error chain, and carries the
/// contract-level conditions the executor reacts to (`AlreadyLocked` in
/// particular).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    /// A database operation failed.
    #[cfg(feature = "postgres")]
    #[error("database operation failed")]
    Database(#[from] sqlx::Error),

    /// A core state parsing error occurred.
    #[error("core error: {0}")]
    Core(#[from] CoreError),

    /// The workflow lock is held by another executor. The message form is
    /// load-bearing; callers match on it across store implementations.
    #[error("workflow {workflow_type} already locked ({id})")]
    AlreadyLocked { id: Uuid, workflow_type: String },

    /// The requested workflow was not found in storage.
    #[error("workflow not found: id={0}")]
    WorkflowNotFound(Uuid),

    /// A workflow with this id already exists.
    #[error("workflow already exists: id={0}")]
    WorkflowAlreadyExists(Uuid),

    /// The requested activity was not found in storage.
    #[error("activity not found: id={0}")]
    ActivityNotFound(Uuid),

    /// A connection error occurred.
    #[error("connection error: {0}")]
    Connection(String),
}

pub type Result<T> = std::result::Result<T, StorageError>;
