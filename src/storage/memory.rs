use super::{error::Result, error::StorageError, LivenessWindow, WorkflowStore};
use crate::core::{
    Activity, ActivityState, CreateWorkflowInput, Workflow, WorkflowLock, WorkflowState,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

/// In-memory workflow store using DashMap for concurrent access.
///
/// This is the reference implementation of the store contract, suitable
/// for tests and single-process embedding. It is observationally
/// equivalent to the Postgres store for every executor-visible operation:
/// admission claims are atomic per entry (the state check and transition
/// happen under the shard lock), and the lock table uses the entry API so
/// two concurrent acquirers can never both succeed.
///
/// Reference: https://github.com/xacrimon/dashmap
/// DashMap provides concurrent access through sharding, eliminating
/// the bottleneck of a single mutex.
pub struct InMemoryWorkflowStore {
    /// Workflows keyed by id.
    workflows: DashMap<Uuid, Workflow>,
    /// Activities keyed by (workflow id, activity type).
    activities: DashMap<(Uuid, String), Activity>,
    /// Lock rows keyed by workflow id; presence is the lock.
    locks: DashMap<Uuid, WorkflowLock>,
    /// Window used by `get_lost_workflows`.
    liveness: LivenessWindow,
}

impl InMemoryWorkflowStore {
    /// Creates a store with the default liveness window.
    pub fn new() -> Self {
        Self::with_liveness_window(LivenessWindow::default())
    }

    /// Creates a store with a custom liveness window.
    pub fn with_liveness_window(liveness: LivenessWindow) -> Self {
        Self {
            workflows: DashMap::new(),
            activities: DashMap::new(),
            locks: DashMap::new(),
            liveness,
        }
    }

    fn write_back(&self, workflow: &Workflow) -> Result<()> {
        match self.workflows.get_mut(&workflow.id) {
            Some(mut entry) => {
                *entry = workflow.clone();
                Ok(())
            }
            None => Err(StorageError::WorkflowNotFound(workflow.id)),
        }
    }
}

impl Default for InMemoryWorkflowStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WorkflowStore for InMemoryWorkflowStore {
    async fn get_workflow_by_id(&self, id: Uuid) -> Result<Option<Workflow>> {
        Ok(self.workflows.get(&id).map(|entry| entry.value().clone()))
    }

    async fn get_workflow_by_ref_id(&self, ref_id: &str) -> Result<Option<Workflow>> {
        Ok(self
            .workflows
            .iter()
            .find(|entry| entry.value().ref_id == ref_id)
            .map(|entry| entry.value().clone()))
    }

    async fn get_executable_workflows(
        &self,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Workflow>> {
        let mut claimed = Vec::new();
        if limit == 0 {
            return Ok(claimed);
        }

        // The check-and-transition happens while the entry's shard is
        // write-locked, so a concurrent poller cannot claim the same row.
        for mut entry in self.workflows.iter_mut() {
            if claimed.len() >= limit {
                break;
            }
            let workflow = entry.value_mut();
            let due = workflow.state == WorkflowState::Queued
                && workflow.execute_at.is_some_and(|at| at <= cutoff);
            if due {
                workflow.state = WorkflowState::Pending;
                workflow.updated_at = Utc::now();
                claimed.push(workflow.clone());
            }
        }

        Ok(claimed)
    }

    async fn get_lost_workflows(&self, limit: usize) -> Result<Vec<Workflow>> {
        let now = Utc::now();
        Ok(self
            .workflows
            .iter()
            .filter(|entry| {
                let workflow = entry.value();
                workflow.state.is_in_flight()
                    && self
                        .liveness
                        .contains(now, workflow.created_at, workflow.execute_at)
            })
            .take(limit)
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn create_workflow(&self, input: CreateWorkflowInput) -> Result<Workflow> {
        let now = Utc::now();
        let state = if input.execute_at.is_some() {
            WorkflowState::Queued
        } else {
            WorkflowState::Pending
        };
        let workflow = Workflow {
            id: input.id,
            workflow_type: input.workflow_type,
            state,
            ref_type: input.ref_type,
            ref_id: input.ref_id,
            activity_types: Vec::new(),
            attempts: 0,
            execute_at: input.execute_at,
            created_at: now,
            updated_at: now,
        };

        match self.workflows.entry(workflow.id) {
            Entry::Occupied(_) => Err(StorageError::WorkflowAlreadyExists(workflow.id)),
            Entry::Vacant(vacant) => {
                vacant.insert(workflow.clone());
                Ok(workflow)
            }
        }
    }

    async fn set_workflow_state(
        &self,
        workflow: &mut Workflow,
        state: WorkflowState,
    ) -> Result<()> {
        if state == WorkflowState::Running {
            workflow.attempts += 1;
        }
        workflow.state = state;
        workflow.updated_at = Utc::now();
        self.write_back(workflow)
    }

    async fn update_workflow(&self, workflow: &mut Workflow) -> Result<()> {
        workflow.updated_at = Utc::now();
        self.write_back(workflow)
    }

    async fn lock_workflow(&self, workflow: &Workflow) -> Result<()> {
        let now = Utc::now();
        match self.locks.entry(workflow.id) {
            Entry::Occupied(mut occupied) if occupied.get().is_expired(now) => {
                occupied.insert(WorkflowLock::acquire(workflow.id));
                Ok(())
            }
            Entry::Occupied(_) => Err(StorageError::AlreadyLocked {
                id: workflow.id,
                workflow_type: workflow.workflow_type.clone(),
            }),
            Entry::Vacant(vacant) => {
                vacant.insert(WorkflowLock::acquire(workflow.id));
                Ok(())
            }
        }
    }

    async fn try_lock_workflow(&self, workflow: &Workflow) -> Result<bool> {
        let now = Utc::now();
        match self.locks.entry(workflow.id) {
            Entry::Occupied(mut occupied) if occupied.get().is_expired(now) => {
                occupied.insert(WorkflowLock::acquire(workflow.id));
                Ok(true)
            }
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(vacant) => {
                vacant.insert(WorkflowLock::acquire(workflow.id));
                Ok(true)
            }
        }
    }

    async fn unlock_workflow(&self, workflow: &Workflow) -> Result<()> {
        self.locks.remove(&workflow.id);
        Ok(())
    }

    async fn get_activity_by_type(
        &self,
        workflow: &Workflow,
        activity_type: &str,
    ) -> Result<Option<Activity>> {
        let key = (workflow.id, activity_type.to_string());
        Ok(self.activities.get(&key).map(|entry| entry.value().clone()))
    }

    async fn create_activity(
        &self,
        workflow: &Workflow,
        id: Uuid,
        activity_type: &str,
    ) -> Result<Activity> {
        if !self.workflows.contains_key(&workflow.id) {
            return Err(StorageError::WorkflowNotFound(workflow.id));
        }

        let now = Utc::now();
        let key = (workflow.id, activity_type.to_string());
        match self.activities.entry(key) {
            // Deterministic ids make re-creation a no-op beyond retrieval.
            Entry::Occupied(occupied) => Ok(occupied.get().clone()),
            Entry::Vacant(vacant) => {
                let activity = Activity {
                    id,
                    workflow_id: workflow.id,
                    activity_type: activity_type.to_string(),
                    state: ActivityState::Pending,
                    created_at: now,
                    updated_at: now,
                };
                vacant.insert(activity.clone());
                Ok(activity)
            }
        }
    }

    async fn update_activity(&self, activity: &mut Activity) -> Result<()> {
        activity.updated_at = Utc::now();
        let key = (activity.workflow_id, activity.activity_type.clone());
        match self.activities.get_mut(&key) {
            Some(mut entry) => {
                *entry = activity.clone();
                Ok(())
            }
            None => Err(StorageError::ActivityNotFound(activity.id)),
        }
    }
}
