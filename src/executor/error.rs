use crate::core::WorkflowState;
use crate::plugin::BoxError;
use crate::storage::StorageError;
use thiserror::Error;
use uuid::Uuid;

/// Execution layer error type.
///
/// These are programmer or deployment errors (unknown plugins, store
/// corruption, admission protocol bypass) and storage failures. Activity
/// outcomes are never errors at this layer: they are classified onto the
/// activity row and drive the workflow state instead.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExecutionError {
    /// A storage operation failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// No workflow plugin is registered for the workflow's type. The
    /// workflow is left in `pending`.
    #[error("unknown workflow plugin: {0}")]
    UnknownWorkflowPlugin(String),

    /// No activity plugin is registered for the activity's normalized
    /// type. The workflow is left in `running`.
    #[error("unknown activity plugin: {0}")]
    UnknownActivityPlugin(String),

    /// The rollback pass could not find the forward activity record.
    /// Indicates store corruption.
    #[error("missing activity {activity_type} for workflow {workflow_id}")]
    MissingActivity {
        workflow_id: Uuid,
        activity_type: String,
    },

    /// The executor was handed a workflow in a state it must never see;
    /// a `queued` workflow here means the queue admission protocol was
    /// bypassed.
    #[error("unexpected workflow state {state} ({workflow_id})")]
    UnexpectedState {
        workflow_id: Uuid,
        state: WorkflowState,
    },

    /// The workflow plugin's `plan` callback failed. The workflow is left
    /// in `pending`.
    #[error("workflow planning failed: {0}")]
    Plan(#[source] BoxError),
}

pub type Result<T> = std::result::Result<T, ExecutionError>;
