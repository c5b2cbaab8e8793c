use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use super::error::Error;

/// State of a workflow in its lifecycle.
///
/// `Queued` is the eligible-for-pickup state; `Pending` is the
/// just-admitted state; `Running` means forward activities are executing;
/// `RunningRollback` means compensating activities are executing;
/// `RunningRetry` is a transient state that immediately becomes `Queued`
/// with a future `execute_at`. `Failed`, `FailedRollback` and `Succeeded`
/// are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkflowState {
    /// Waiting in the store until `execute_at` passes.
    Queued,
    /// Admitted for execution, not yet planned.
    Pending,
    /// Forward activities are being executed.
    Running,
    /// Scheduled for requeue after a temporary failure.
    RunningRetry,
    /// Compensating activities are being executed in reverse order.
    RunningRollback,
    /// Terminal: the workflow failed; applied effects were compensated.
    Failed,
    /// Terminal: a compensating activity itself failed permanently.
    FailedRollback,
    /// Terminal: every planned activity succeeded.
    Succeeded,
}

impl WorkflowState {
    /// Returns the string representation persisted by the stores.
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowState::Queued => "queued",
            WorkflowState::Pending => "pending",
            WorkflowState::Running => "running",
            WorkflowState::RunningRetry => "running_retry",
            WorkflowState::RunningRollback => "running_rollback",
            WorkflowState::Failed => "failed",
            WorkflowState::FailedRollback => "failed_rollback",
            WorkflowState::Succeeded => "succeeded",
        }
    }

    /// Returns true once the workflow can never advance again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WorkflowState::Failed | WorkflowState::FailedRollback | WorkflowState::Succeeded
        )
    }

    /// Returns true for the non-terminal states an executor may leave a
    /// workflow in. Workflows stuck in one of these past the liveness
    /// window are candidates for GC rescue.
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            WorkflowState::Pending
                | WorkflowState::Running
                | WorkflowState::RunningRetry
                | WorkflowState::RunningRollback
        )
    }
}

impl std::fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for WorkflowState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(WorkflowState::Queued),
            "pending" => Ok(WorkflowState::Pending),
            "running" => Ok(WorkflowState::Running),
            "running_retry" => Ok(WorkflowState::RunningRetry),
            "running_rollback" => Ok(WorkflowState::RunningRollback),
            "failed" => Ok(WorkflowState::Failed),
            "failed_rollback" => Ok(WorkflowState::FailedRollback),
            "succeeded" => Ok(WorkflowState::Succeeded),
            _ => Err(Error::InvalidWorkflowState(s.to_string())),
        }
    }
}

/// A durable saga workflow: a linear sequence of activities executed
/// forward and compensated in reverse on permanent failure.
///
/// The record is fully owned by the store; executors mutate a copy and
/// persist it back through the store operations. The `workflow_type`
/// string is colon-structured: the head before the first `:` selects the
/// workflow plugin, the tail is opaque metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    /// Externally supplied identifier.
    pub id: Uuid,
    /// Plugin selector plus opaque metadata, e.g. `order:eu-west`.
    pub workflow_type: String,
    /// Current lifecycle state.
    pub state: WorkflowState,
    /// Opaque foreign reference kind; never interpreted by the engine.
    pub ref_type: String,
    /// Opaque foreign reference id; never interpreted by the engine.
    pub ref_id: String,
    /// Ordered activity plan. Empty until planning; assigned exactly once.
    pub activity_types: Vec<String>,
    /// Number of times the workflow has entered `Running`.
    pub attempts: i32,
    /// Earliest instant the workflow may be picked up from the queue.
    pub execute_at: Option<DateTime<Utc>>,
    /// When this workflow was created.
    pub created_at: DateTime<Utc>,
    /// When this workflow was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Workflow {
    /// Returns the head of `workflow_type` before the first `:`, which
    /// selects the workflow plugin.
    pub fn plugin_type(&self) -> &str {
        self.workflow_type
            .split(':')
            .next()
            .unwrap_or(&self.workflow_type)
    }
}

/// Input for creating a workflow.
///
/// The initial state is `Queued` iff `execute_at` is provided, otherwise
/// `Pending`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateWorkflowInput {
    pub id: Uuid,
    pub workflow_type: String,
    pub ref_type: String,
    pub ref_id: String,
    pub execute_at: Option<DateTime<Utc>>,
}
