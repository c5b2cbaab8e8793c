//! Persistence layer: the store contract and its implementations.
//!
//! The store is the only shared mutable state in the system. All
//! cross-process coordination happens through it: per-workflow lock rows
//! for mutual exclusion and the atomic queued-to-pending admission for
//! work distribution.

mod error;
mod memory;
#[cfg(feature = "postgres")]
mod postgres;

pub use error::{Result, StorageError};
pub use memory::InMemoryWorkflowStore;
#[cfg(feature = "postgres")]
pub use postgres::{PoolConfig, PostgresWorkflowStore};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::core::{Activity, CreateWorkflowInput, Workflow, WorkflowState};

/// Environment variable overriding the liveness lookback in milliseconds.
pub const GC_LOOKBACK_ENV: &str = "SAGA_WORKFLOW_GC_LOOKBACK_MS";

/// Environment variable overriding the liveness cutoff in milliseconds.
pub const GC_CUTOFF_ENV: &str = "SAGA_WORKFLOW_GC_CUTOFF_MS";

const DEFAULT_GC_LOOKBACK_MS: i64 = 5_000;
const DEFAULT_GC_CUTOFF_MS: i64 = 7_200_000;

/// The window within which an in-flight workflow counts as lost.
///
/// A workflow is lost when its state is non-terminal-and-in-flight, its
/// `created_at` falls within `[now - cutoff, now - lookback]`, and its
/// `execute_at` is absent or before `now - lookback`. Stores are
/// constructed with a window; the GC just asks for lost workflows.
#[derive(Debug, Clone, Copy)]
pub struct LivenessWindow {
    /// Minimum age before an in-flight workflow may be rescued.
    pub lookback: Duration,
    /// Maximum age beyond which workflows are left alone.
    pub cutoff: Duration,
}

impl Default for LivenessWindow {
    fn default() -> Self {
        Self {
            lookback: Duration::milliseconds(DEFAULT_GC_LOOKBACK_MS),
            cutoff: Duration::milliseconds(DEFAULT_GC_CUTOFF_MS),
        }
    }
}

impl LivenessWindow {
    /// Builds the window from `SAGA_WORKFLOW_GC_LOOKBACK_MS` and
    /// `SAGA_WORKFLOW_GC_CUTOFF_MS`, falling back to the defaults
    /// (5 s / 2 h) when unset or unparsable.
    pub fn from_env() -> Self {
        let millis = |name: &str, default: i64| {
            std::env::var(name)
                .ok()
                .and_then(|raw| raw.parse::<i64>().ok())
                .unwrap_or(default)
        };
        Self {
            lookback: Duration::milliseconds(millis(GC_LOOKBACK_ENV, DEFAULT_GC_LOOKBACK_MS)),
            cutoff: Duration::milliseconds(millis(GC_CUTOFF_ENV, DEFAULT_GC_CUTOFF_MS)),
        }
    }

    /// Returns true iff a workflow with these timestamps is lost at `now`.
    pub fn contains(
        &self,
        now: DateTime<Utc>,
        created_at: DateTime<Utc>,
        execute_at: Option<DateTime<Utc>>,
    ) -> bool {
        let stale_before = now - self.lookback;
        let not_older_than = now - self.cutoff;
        created_at <= stale_before
            && created_at >= not_older_than
            && execute_at.is_none_or(|at| at < stale_before)
    }
}

/// Persistent repository of workflows, activities, and per-workflow locks.
///
/// All implementations must be observationally equivalent for every
/// operation the executor performs; [`InMemoryWorkflowStore`] is the
/// reference used by the test suite, [`PostgresWorkflowStore`] the
/// production variant.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    /// Fetches a workflow by id.
    async fn get_workflow_by_id(&self, id: Uuid) -> Result<Option<Workflow>>;

    /// Fetches a workflow by its opaque foreign reference id.
    async fn get_workflow_by_ref_id(&self, ref_id: &str) -> Result<Option<Workflow>>;

    /// Selects up to `limit` workflows with `state = queued` and
    /// `execute_at <= cutoff`, atomically transitioning each selected
    /// workflow to `pending` so concurrent pollers never observe the same
    /// row. Returned workflows carry their new `pending` state.
    async fn get_executable_workflows(
        &self,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Workflow>>;

    /// Returns up to `limit` workflows stuck in a non-terminal in-flight
    /// state within the store's [`LivenessWindow`].
    async fn get_lost_workflows(&self, limit: usize) -> Result<Vec<Workflow>>;

    /// Inserts a workflow. The initial state is `queued` iff
    /// `input.execute_at` is provided, else `pending`.
    async fn create_workflow(&self, input: CreateWorkflowInput) -> Result<Workflow>;

    /// Persists a state transition, incrementing `attempts` exactly when
    /// the new state is `running`, and refreshes `updated_at` on both the
    /// stored row and the passed record.
    async fn set_workflow_state(
        &self,
        workflow: &mut Workflow,
        state: WorkflowState,
    ) -> Result<()>;

    /// Persists the workflow's current field values, refreshing
    /// `updated_at`.
    async fn update_workflow(&self, workflow: &mut Workflow) -> Result<()>;

    /// Acquires the workflow's lock; fails with
    /// [`StorageError::AlreadyLocked`] if another executor holds it. An
    /// expired lock row is displaced rather than honored.
    async fn lock_workflow(&self, workflow: &Workflow) -> Result<()>;

    /// Returns true iff the lock was freshly acquired; never errors on
    /// contention.
    async fn try_lock_workflow(&self, workflow: &Workflow) -> Result<bool>;

    /// Releases the workflow's lock (idempotent).
    async fn unlock_workflow(&self, workflow: &Workflow) -> Result<()>;

    /// Fetches the activity of the given type for a workflow.
    async fn get_activity_by_type(
        &self,
        workflow: &Workflow,
        activity_type: &str,
    ) -> Result<Option<Activity>>;

    /// Inserts a new activity in state `pending`. Fails if the parent
    /// workflow is absent. Re-inserting an existing id returns the
    /// existing row unchanged.
    async fn create_activity(
        &self,
        workflow: &Workflow,
        id: Uuid,
        activity_type: &str,
    ) -> Result<Activity>;

    /// Persists the activity's current field values, refreshing
    /// `updated_at`.
    async fn update_activity(&self, activity: &mut Activity) -> Result<()>;
}
