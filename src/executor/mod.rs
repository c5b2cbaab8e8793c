//! Execution engine: the per-activity and per-workflow state machines,
//! the queue-polling admission loop, and the lost-workflow GC.

mod activity;
mod error;
mod gc;
mod queue;
mod workflow;

pub use activity::ActivityExecutor;
pub use error::{ExecutionError, Result};
pub use gc::{GcHandle, WorkflowGc};
pub use queue::{QueueHandle, WorkflowQueue};
pub use workflow::{WorkflowExecutor, DEFAULT_RETRY_BACKOFF};
