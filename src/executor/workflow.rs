//! Per-workflow state machine.
//!
//! Drives a single workflow from admission to a terminal state: planning,
//! forward execution, retry scheduling, and reverse-order rollback. All
//! work happens under the workflow's store lock, and every transition is
//! persisted before the next one is attempted, so any executor picking up
//! the workflow later resumes from an accurate record.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use super::activity::ActivityExecutor;
use super::error::{ExecutionError, Result};
use crate::core::{
    self, Activity, ActivityState, CreateWorkflowInput, Workflow, WorkflowState,
};
use crate::notify::Notifier;
use crate::plugin::PluginRegistry;
use crate::storage::WorkflowStore;

/// Delay before a workflow that failed temporarily becomes executable
/// again.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(10);

/// Executes workflows to convergence.
///
/// One executor instance serves any number of workflows; per-workflow
/// mutual exclusion comes from the store's lock rows, not from this
/// struct.
pub struct WorkflowExecutor<S> {
    store: Arc<S>,
    registry: Arc<PluginRegistry>,
    activities: ActivityExecutor<S>,
    notifier: Option<Arc<dyn Notifier>>,
    retry_backoff: Duration,
}

impl<S: WorkflowStore> WorkflowExecutor<S> {
    pub fn new(store: Arc<S>, registry: Arc<PluginRegistry>) -> Self {
        let activities = ActivityExecutor::new(store.clone(), registry.clone());
        Self {
            store,
            registry,
            activities,
            notifier: None,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        }
    }

    /// Attaches an observer invoked at workflow/activity begin and end.
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Overrides the requeue delay applied after a temporary failure.
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Creates a workflow through the store.
    pub async fn create(&self, input: CreateWorkflowInput) -> Result<Workflow> {
        Ok(self.store.create_workflow(input).await?)
    }

    /// Executes a workflow until it parks (terminal state or requeued).
    ///
    /// Acquires the workflow's lock strictly: the caller owns the
    /// workflow, so contention means another executor is misbehaving and
    /// surfaces as [`crate::storage::StorageError::AlreadyLocked`]. The
    /// lock is released on every exit path.
    pub async fn execute(&self, workflow: &mut Workflow) -> Result<()> {
        self.store.lock_workflow(workflow).await?;
        debug!("Locked workflow: id={}, state={}", workflow.id, workflow.state);

        self.notify_begin_workflow(workflow).await;
        let result = self.converge(workflow).await;
        self.notify_end_workflow(workflow).await;

        if let Err(unlock_err) = self.store.unlock_workflow(workflow).await {
            error!(
                "Failed to release workflow lock: id={}, error={}",
                workflow.id, unlock_err
            );
            if result.is_ok() {
                return Err(unlock_err.into());
            }
        }

        result
    }

    /// Re-dispatches on the persisted state until the workflow parks.
    ///
    /// Each phase performs its transitions through the store and returns;
    /// the loop then re-reads `workflow.state`. A workflow in
    /// `running_retry` is scheduled and the loop exits without recursing,
    /// because the scheduled state is `queued`, which only the queue
    /// admission path may consume.
    async fn converge(&self, workflow: &mut Workflow) -> Result<()> {
        loop {
            match workflow.state {
                WorkflowState::Queued => {
                    return Err(ExecutionError::UnexpectedState {
                        workflow_id: workflow.id,
                        state: workflow.state,
                    });
                }
                WorkflowState::Pending => self.run_planning(workflow).await?,
                WorkflowState::Running => self.run_forward(workflow).await?,
                WorkflowState::RunningRollback => self.run_rollback(workflow).await?,
                WorkflowState::RunningRetry => {
                    self.schedule_retry(workflow).await?;
                    return Ok(());
                }
                WorkflowState::Failed
                | WorkflowState::FailedRollback
                | WorkflowState::Succeeded => {
                    info!(
                        "Workflow settled: id={}, state={}, attempts={}",
                        workflow.id, workflow.state, workflow.attempts
                    );
                    return Ok(());
                }
            }
        }
    }

    /// Fills in the activity plan on first execution, then moves the
    /// workflow to `running`.
    ///
    /// A workflow re-admitted after a retry already carries its plan; the
    /// plan is assigned exactly once and immutable thereafter.
    async fn run_planning(&self, workflow: &mut Workflow) -> Result<()> {
        if workflow.activity_types.is_empty() {
            let plugin = self
                .registry
                .workflow_plugin(&workflow.workflow_type)
                .ok_or_else(|| {
                    ExecutionError::UnknownWorkflowPlugin(workflow.workflow_type.clone())
                })?;

            let plan = plugin.plan(workflow).await.map_err(ExecutionError::Plan)?;
            if plan.is_empty() {
                warn!("Empty plan, failing workflow: id={}", workflow.id);
                self.store
                    .set_workflow_state(workflow, WorkflowState::Failed)
                    .await?;
                return Ok(());
            }

            debug!("Planned workflow: id={}, activities={:?}", workflow.id, plan);
            workflow.activity_types = plan;
            self.store.update_workflow(workflow).await?;
        }

        self.store
            .set_workflow_state(workflow, WorkflowState::Running)
            .await?;
        Ok(())
    }

    /// Runs planned activities in order until one fails or all succeed.
    ///
    /// Activities that already settled in an earlier attempt converge
    /// without re-invoking their callback, so a retried workflow resumes
    /// where it left off.
    async fn run_forward(&self, workflow: &mut Workflow) -> Result<()> {
        let plan = workflow.activity_types.clone();
        for activity_type in &plan {
            let mut activity = self.activities.create(workflow, activity_type).await?;

            self.notify_begin_activity(workflow, &activity).await;
            let driven = self.activities.execute(workflow, &mut activity).await;
            self.notify_end_activity(workflow, &activity).await;
            driven?;

            match activity.state {
                ActivityState::FailedPermanent => {
                    self.store
                        .set_workflow_state(workflow, WorkflowState::RunningRollback)
                        .await?;
                    return Ok(());
                }
                ActivityState::FailedTemporary => {
                    self.store
                        .set_workflow_state(workflow, WorkflowState::RunningRetry)
                        .await?;
                    return Ok(());
                }
                _ => {}
            }
        }

        self.store
            .set_workflow_state(workflow, WorkflowState::Succeeded)
            .await?;
        Ok(())
    }

    /// Compensates previously applied activities in reverse plan order.
    ///
    /// Only activities that actually succeeded need compensation; the
    /// failing activity itself and anything never started are skipped.
    async fn run_rollback(&self, workflow: &mut Workflow) -> Result<()> {
        let plan = workflow.activity_types.clone();
        for activity_type in plan.iter().rev() {
            let forward = self
                .store
                .get_activity_by_type(workflow, activity_type)
                .await?
                .ok_or_else(|| ExecutionError::MissingActivity {
                    workflow_id: workflow.id,
                    activity_type: activity_type.clone(),
                })?;

            if forward.state != ActivityState::Succeeded {
                continue;
            }

            let rollback_name = core::rollback_type(activity_type);
            let mut rollback = self.activities.create(workflow, &rollback_name).await?;

            self.notify_begin_activity(workflow, &rollback).await;
            let driven = self.activities.rollback(workflow, &mut rollback).await;
            self.notify_end_activity(workflow, &rollback).await;
            driven?;

            match rollback.state {
                ActivityState::FailedPermanent => {
                    self.store
                        .set_workflow_state(workflow, WorkflowState::FailedRollback)
                        .await?;
                    return Ok(());
                }
                ActivityState::FailedTemporary => {
                    self.store
                        .set_workflow_state(workflow, WorkflowState::RunningRetry)
                        .await?;
                    return Ok(());
                }
                _ => {}
            }
        }

        self.store
            .set_workflow_state(workflow, WorkflowState::Failed)
            .await?;
        Ok(())
    }

    /// Requeues the workflow with a future `execute_at`.
    async fn schedule_retry(&self, workflow: &mut Workflow) -> Result<()> {
        let backoff = chrono::Duration::milliseconds(self.retry_backoff.as_millis() as i64);
        workflow.execute_at = Some(Utc::now() + backoff);
        self.store.update_workflow(workflow).await?;
        self.store
            .set_workflow_state(workflow, WorkflowState::Queued)
            .await?;
        info!(
            "Scheduled workflow retry: id={}, execute_at={:?}",
            workflow.id, workflow.execute_at
        );
        Ok(())
    }

    async fn notify_begin_workflow(&self, workflow: &Workflow) {
        if let Some(notifier) = &self.notifier {
            if let Err(e) = notifier.begin_workflow(workflow).await {
                warn!("begin_workflow hook failed: id={}, error={}", workflow.id, e);
            }
        }
    }

    async fn notify_end_workflow(&self, workflow: &Workflow) {
        if let Some(notifier) = &self.notifier {
            if let Err(e) = notifier.end_workflow(workflow).await {
                warn!("end_workflow hook failed: id={}, error={}", workflow.id, e);
            }
        }
    }

    async fn notify_begin_activity(&self, workflow: &Workflow, activity: &Activity) {
        if let Some(notifier) = &self.notifier {
            if let Err(e) = notifier.begin_activity(workflow, activity).await {
                warn!(
                    "begin_activity hook failed: workflow={}, type={}, error={}",
                    workflow.id, activity.activity_type, e
                );
            }
        }
    }

    async fn notify_end_activity(&self, workflow: &Workflow, activity: &Activity) {
        if let Some(notifier) = &self.notifier {
            if let Err(e) = notifier.end_activity(workflow, activity).await {
                warn!(
                    "end_activity hook failed: workflow={}, type={}, error={}",
                    workflow.id, activity.activity_type, e
                );
            }
        }
    }
}
