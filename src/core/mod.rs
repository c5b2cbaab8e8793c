//! Foundation types: workflow and activity records, state enums, locks.
//!
//! This module hides the persisted representation of states (strings at
//! the store boundary, closed enums everywhere else) and the derivation
//! of deterministic activity ids.

mod activity;
mod error;
mod lock;
mod workflow;

pub use activity::{
    activity_id, plugin_type, rollback_type, Activity, ActivityState, ACTIVITY_ID_NAMESPACE,
    ROLLBACK_PREFIX,
};
pub use error::{Error, Result};
pub use lock::{WorkflowLock, LOCK_TTL_SECS};
pub use workflow::{CreateWorkflowInput, Workflow, WorkflowState};
