//! Praxis: Durable Saga Workflow Engine for Rust
//!
//! `praxis` (πρᾶξις, Greek for "action") executes workflows as sagas: a
//! linear sequence of activities run forward, each paired with a
//! compensating rollback that runs in reverse order when a later activity
//! fails permanently. Workflow state lives in a shared store, so
//! executions survive process restarts and independent workers can pick
//! up work concurrently.
//!
//! # Features
//!
//! - **Durable state machine**: every transition is persisted before the
//!   next is attempted; a crashed worker's workflow resumes from its
//!   accurate record
//! - **Compensating rollback**: permanently failed workflows undo their
//!   applied activities in reverse order
//! - **Safe retries**: deterministic activity ids (UUIDv5 under a fixed
//!   namespace) make activity creation idempotent, and settled activities
//!   never re-run their callbacks
//! - **Multi-worker**: per-workflow lock rows plus skip-locked work
//!   admission coordinate any number of queues on one store
//! - **Self-healing**: a GC sweep requeues workflows abandoned in flight
//!
//! # Quick Start
//!
//! ```ignore
//! use praxis::prelude::*;
//!
//! struct OrderWorkflow;
//!
//! #[async_trait]
//! impl WorkflowPlugin for OrderWorkflow {
//!     fn workflow_type(&self) -> &str {
//!         "order"
//!     }
//!
//!     async fn plan(&self, _workflow: &Workflow) -> Result<Vec<String>, BoxError> {
//!         Ok(vec!["charge".into(), "ship".into()])
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(InMemoryWorkflowStore::new());
//!     let mut registry = PluginRegistry::new();
//!     registry.register_workflow(Arc::new(OrderWorkflow));
//!     // ... register activity plugins for "charge" and "ship" ...
//!
//!     let executor = Arc::new(WorkflowExecutor::new(store.clone(), Arc::new(registry)));
//!     let queue = WorkflowQueue::new(store, executor).start();
//!     // Workflows created with an execute_at are admitted automatically.
//!     queue.stop().await;
//!     Ok(())
//! }
//! ```
//!
//! # Module Organization
//!
//! Each module hides a design decision that is likely to change:
//!
//! - [`core`]: record types and state enums (hides the persisted
//!   representation)
//! - [`plugin`]: user callback contract and registry (hides plugin
//!   resolution)
//! - [`storage`]: persistence layer (hides database choice and schema)
//! - [`executor`]: execution engine (hides the state machine mechanics)
//! - [`notify`]: lifecycle observer hooks

pub mod core;
pub mod executor;
pub mod notify;
pub mod plugin;
pub mod storage;

// Re-export commonly used types for convenience
pub use core::{
    activity_id, rollback_type, Activity, ActivityState, CreateWorkflowInput, Workflow,
    WorkflowState, ACTIVITY_ID_NAMESPACE,
};

pub use executor::{
    ActivityExecutor, ExecutionError, GcHandle, QueueHandle, WorkflowExecutor, WorkflowGc,
    WorkflowQueue, DEFAULT_RETRY_BACKOFF,
};

pub use notify::Notifier;

pub use plugin::{ActivityFailure, ActivityPlugin, BoxError, PluginRegistry, WorkflowPlugin};

pub use storage::{InMemoryWorkflowStore, LivenessWindow, StorageError, WorkflowStore};

#[cfg(feature = "postgres")]
pub use storage::PostgresWorkflowStore;

// Re-export dependencies used in public API so embedders don't hit
// version mismatches.
pub use chrono;
pub use tokio;
pub use uuid;

/// Prelude module for convenient glob imports
///
/// # Example
///
/// ```ignore
/// use praxis::prelude::*;
/// ```
pub mod prelude {
    pub use crate::core::{
        Activity, ActivityState, CreateWorkflowInput, Workflow, WorkflowState,
    };
    pub use crate::executor::{WorkflowExecutor, WorkflowGc, WorkflowQueue};
    pub use crate::notify::Notifier;
    pub use crate::plugin::{
        ActivityFailure, ActivityPlugin, BoxError, PluginRegistry, WorkflowPlugin,
    };
    pub use crate::storage::{InMemoryWorkflowStore, WorkflowStore};

    #[cfg(feature = "postgres")]
    pub use crate::storage::PostgresWorkflowStore;

    pub use async_trait::async_trait;
    pub use std::sync::Arc;
    pub use uuid::Uuid;
}
