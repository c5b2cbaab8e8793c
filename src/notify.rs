//! Optional side-effect-free observer of workflow and activity lifecycle.

use async_trait::async_trait;

use crate::core::{Activity, Workflow};
use crate::plugin::BoxError;

/// Observer hooks bracketing workflow and activity execution.
///
/// Hooks are best-effort: a failing hook is logged and ignored, and never
/// changes a workflow's outcome, lock handling, or persisted state. The
/// executor accepts `None` in place of a notifier and skips the hooks
/// entirely.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Called after the workflow lock is acquired, before any state work.
    async fn begin_workflow(&self, workflow: &Workflow) -> Result<(), BoxError>;

    /// Called after the convergence loop exits, before the lock release.
    async fn end_workflow(&self, workflow: &Workflow) -> Result<(), BoxError>;

    /// Called before an activity callback is driven.
    async fn begin_activity(&self, workflow: &Workflow, activity: &Activity)
        -> Result<(), BoxError>;

    /// Called after an activity callback settles, even when it errored.
    async fn end_activity(&self, workflow: &Workflow, activity: &Activity)
        -> Result<(), BoxError>;
}
