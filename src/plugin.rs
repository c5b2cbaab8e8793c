//! User-facing plugin contract and the boot-time registry.
//!
//! Workflow plugins produce the activity plan; activity plugins perform
//! the forward and compensating effects. Callbacks are invoked
//! at-least-once and must be idempotent.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::core::{self, Activity, Workflow};

/// A boxed error that can be sent across threads.
///
/// This is the standard error type used throughout async Rust ecosystems
/// (tokio, tower, axum, etc.). Any error implementing `std::error::Error`
/// can be automatically converted to this type.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Outcome sentinel for activity callbacks.
///
/// A callback signals that the workflow should compensate and stop by
/// returning [`ActivityFailure::Permanent`]; any other failure is
/// [`ActivityFailure::Temporary`] and causes the workflow to be requeued
/// and retried.
#[derive(Debug, Error)]
pub enum ActivityFailure {
    /// The activity can never complete; previously applied activities must
    /// be rolled back.
    #[error("permanent activity failure")]
    Permanent,

    /// A transient failure; the workflow will be retried after a backoff.
    #[error("temporary activity failure: {0}")]
    Temporary(#[source] BoxError),
}

impl ActivityFailure {
    /// Wraps any error as a temporary failure.
    pub fn temporary(cause: impl Into<BoxError>) -> Self {
        ActivityFailure::Temporary(cause.into())
    }
}

impl From<String> for ActivityFailure {
    fn from(message: String) -> Self {
        ActivityFailure::Temporary(message.into())
    }
}

impl From<&str> for ActivityFailure {
    fn from(message: &str) -> Self {
        ActivityFailure::Temporary(message.into())
    }
}

/// A workflow plugin plans the ordered list of activity types a workflow
/// must run. Planning happens exactly once per workflow.
#[async_trait]
pub trait WorkflowPlugin: Send + Sync {
    /// The plugin key. A workflow of type `order:eu-west` resolves to the
    /// plugin whose `workflow_type` is `order`.
    fn workflow_type(&self) -> &str;

    /// Produces the activity plan. An empty plan fails the workflow.
    async fn plan(&self, workflow: &Workflow) -> Result<Vec<String>, BoxError>;
}

/// An activity plugin implements both directions of one saga step.
///
/// The same plugin serves forward activities (`charge`, `charge:meta`)
/// and their compensations (`rollback:charge`); the engine strips the
/// prefix before resolution.
#[async_trait]
pub trait ActivityPlugin: Send + Sync {
    /// The plugin key, matched against the normalized activity type.
    fn activity_type(&self) -> &str;

    /// Applies the activity's effect.
    async fn execute(&self, workflow: &Workflow, activity: &Activity)
        -> Result<(), ActivityFailure>;

    /// Compensates a previously applied effect.
    async fn rollback(
        &self,
        workflow: &Workflow,
        activity: &Activity,
    ) -> Result<(), ActivityFailure>;
}

/// Boot-time mapping from plugin type strings to plugin instances.
///
/// Registration happens before the executor starts and overwrites any
/// existing entry with the same key (last writer wins); afterwards the
/// registry is shared immutably behind an `Arc`.
#[derive(Default)]
pub struct PluginRegistry {
    workflows: HashMap<String, Arc<dyn WorkflowPlugin>>,
    activities: HashMap<String, Arc<dyn ActivityPlugin>>,
}

impl PluginRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a workflow plugin under its own type key.
    pub fn register_workflow(&mut self, plugin: Arc<dyn WorkflowPlugin>) {
        self.workflows
            .insert(plugin.workflow_type().to_string(), plugin);
    }

    /// Registers an activity plugin under its own type key.
    pub fn register_activity(&mut self, plugin: Arc<dyn ActivityPlugin>) {
        self.activities
            .insert(plugin.activity_type().to_string(), plugin);
    }

    /// Looks up the workflow plugin for a raw workflow type, normalizing
    /// to the head before the first `:`.
    pub fn workflow_plugin(&self, workflow_type: &str) -> Option<Arc<dyn WorkflowPlugin>> {
        let key = workflow_type.split(':').next().unwrap_or(workflow_type);
        self.workflows.get(key).cloned()
    }

    /// Looks up the activity plugin for a raw activity type, stripping a
    /// `rollback:` prefix and trailing metadata first.
    pub fn activity_plugin(&self, activity_type: &str) -> Option<Arc<dyn ActivityPlugin>> {
        self.activities.get(core::plugin_type(activity_type)).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubWorkflow(&'static str);

    #[async_trait]
    impl WorkflowPlugin for StubWorkflow {
        fn workflow_type(&self) -> &str {
            self.0
        }

        async fn plan(&self, _workflow: &Workflow) -> Result<Vec<String>, BoxError> {
            Ok(vec!["a".to_string()])
        }
    }

    struct StubActivity {
        key: &'static str,
        succeeds: bool,
    }

    #[async_trait]
    impl ActivityPlugin for StubActivity {
        fn activity_type(&self) -> &str {
            self.key
        }

        async fn execute(
            &self,
            _workflow: &Workflow,
            _activity: &Activity,
        ) -> Result<(), ActivityFailure> {
            if self.succeeds {
                Ok(())
            } else {
                Err(ActivityFailure::Permanent)
            }
        }

        async fn rollback(
            &self,
            _workflow: &Workflow,
            _activity: &Activity,
        ) -> Result<(), ActivityFailure> {
            Ok(())
        }
    }

    #[test]
    fn lookup_normalizes_types() {
        let mut registry = PluginRegistry::new();
        registry.register_activity(Arc::new(StubActivity { key: "foo", succeeds: true }));
        registry.register_workflow(Arc::new(StubWorkflow("order")));

        assert!(registry.activity_plugin("foo").is_some());
        assert!(registry.activity_plugin("foo:meta").is_some());
        assert!(registry.activity_plugin("rollback:foo").is_some());
        assert!(registry.activity_plugin("rollback:foo:meta").is_some());
        assert!(registry.activity_plugin("bar").is_none());

        assert!(registry.workflow_plugin("order").is_some());
        assert!(registry.workflow_plugin("order:eu-west").is_some());
        assert!(registry.workflow_plugin("invoice").is_none());
    }

    #[tokio::test]
    async fn registration_is_last_writer_wins() {
        let mut registry = PluginRegistry::new();
        registry.register_activity(Arc::new(StubActivity { key: "foo", succeeds: false }));
        registry.register_activity(Arc::new(StubActivity { key: "foo", succeeds: true }));

        let workflow = Workflow {
            id: uuid::Uuid::new_v4(),
            workflow_type: "order".to_string(),
            state: crate::core::WorkflowState::Running,
            ref_type: String::new(),
            ref_id: String::new(),
            activity_types: vec!["foo".to_string()],
            attempts: 1,
            execute_at: None,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        let activity = Activity {
            id: core::activity_id(workflow.id, "foo"),
            workflow_id: workflow.id,
            activity_type: "foo".to_string(),
            state: crate::core::ActivityState::Running,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };

        let plugin = registry.activity_plugin("foo").unwrap();
        assert!(plugin.execute(&workflow, &activity).await.is_ok());
    }
}
