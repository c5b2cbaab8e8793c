//! Per-activity sub-state-machine.
//!
//! Drives one activity from `pending` to a settled state within a single
//! executor invocation, persisting every transition so a crash mid-step
//! leaves an accurate record behind.

use std::sync::Arc;

use tracing::{debug, warn};

use super::error::{ExecutionError, Result};
use crate::core::{self, Activity, ActivityState, Workflow};
use crate::plugin::{ActivityFailure, ActivityPlugin, PluginRegistry};
use crate::storage::WorkflowStore;

/// Which callback of the plugin to drive.
#[derive(Clone, Copy)]
enum Callback {
    Execute,
    Rollback,
}

/// Executes single activities against their plugins.
pub struct ActivityExecutor<S> {
    store: Arc<S>,
    registry: Arc<PluginRegistry>,
}

impl<S: WorkflowStore> ActivityExecutor<S> {
    pub fn new(store: Arc<S>, registry: Arc<PluginRegistry>) -> Self {
        Self { store, registry }
    }

    /// Gets or creates the activity for `(workflow, activity_type)`.
    ///
    /// The id is a pure function of the inputs, so repeated calls across
    /// retries and processes converge on the same row. Safe to call any
    /// number of times.
    pub async fn create(&self, workflow: &Workflow, activity_type: &str) -> Result<Activity> {
        if let Some(existing) = self
            .store
            .get_activity_by_type(workflow, activity_type)
            .await?
        {
            return Ok(existing);
        }

        let id = core::activity_id(workflow.id, activity_type);
        let activity = self.store.create_activity(workflow, id, activity_type).await?;
        debug!(
            "Created activity: workflow={}, type={}, id={}",
            workflow.id, activity_type, id
        );
        Ok(activity)
    }

    /// Drives the plugin's forward callback for this activity.
    pub async fn execute(&self, workflow: &Workflow, activity: &mut Activity) -> Result<()> {
        self.converge(workflow, activity, Callback::Execute).await
    }

    /// Drives the plugin's compensating callback for this activity.
    pub async fn rollback(&self, workflow: &Workflow, activity: &mut Activity) -> Result<()> {
        self.converge(workflow, activity, Callback::Rollback).await
    }

    async fn converge(
        &self,
        workflow: &Workflow,
        activity: &mut Activity,
        callback: Callback,
    ) -> Result<()> {
        let plugin = self
            .registry
            .activity_plugin(&activity.activity_type)
            .ok_or_else(|| {
                ExecutionError::UnknownActivityPlugin(activity.activity_type.clone())
            })?;

        // A terminal activity keeps its outcome; anything else restarts
        // from pending so the loop below observes a clean record.
        if !activity.state.is_terminal() {
            activity.state = ActivityState::Pending;
            self.store.update_activity(activity).await?;
        }

        // One transition per iteration, persisted each time.
        loop {
            match activity.state {
                ActivityState::Pending => {
                    activity.state = ActivityState::Running;
                    self.store.update_activity(activity).await?;
                }
                ActivityState::Running => {
                    let outcome = self.invoke(&*plugin, workflow, activity, callback).await;
                    activity.state = Self::classify(workflow, activity, outcome);
                    self.store.update_activity(activity).await?;
                }
                ActivityState::Succeeded
                | ActivityState::FailedPermanent
                | ActivityState::FailedTemporary => return Ok(()),
            }
        }
    }

    async fn invoke(
        &self,
        plugin: &dyn ActivityPlugin,
        workflow: &Workflow,
        activity: &Activity,
        callback: Callback,
    ) -> std::result::Result<(), ActivityFailure> {
        match callback {
            Callback::Execute => plugin.execute(workflow, activity).await,
            Callback::Rollback => plugin.rollback(workflow, activity).await,
        }
    }

    /// Maps a callback outcome onto the activity state: a normal return
    /// succeeded, the `Permanent` sentinel is final, everything else is a
    /// temporary failure that earns the workflow a retry.
    fn classify(
        workflow: &Workflow,
        activity: &Activity,
        outcome: std::result::Result<(), ActivityFailure>,
    ) -> ActivityState {
        match outcome {
            Ok(()) => ActivityState::Succeeded,
            Err(ActivityFailure::Permanent) => {
                warn!(
                    "Activity failed permanently: workflow={}, type={}",
                    workflow.id, activity.activity_type
                );
                ActivityState::FailedPermanent
            }
            Err(ActivityFailure::Temporary(cause)) => {
                warn!(
                    "Activity failed temporarily: workflow={}, type={}, cause={}",
                    workflow.id, activity.activity_type, cause
                );
                ActivityState::FailedTemporary
            }
        }
    }
}
