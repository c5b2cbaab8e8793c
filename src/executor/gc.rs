//! Garbage collector for lost workflows.
//!
//! A workflow is lost when an executor died between admission and a
//! terminal state: the row sits in `pending`/`running`/`running_retry`/
//! `running_rollback` without advancing. The GC periodically asks the
//! store for such workflows (the liveness window is store configuration)
//! and requeues each one so a healthy queue picks it up again. Every
//! collect is an independent, idempotent operation on a single workflow.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::core::{Workflow, WorkflowState};
use crate::storage::WorkflowStore;

/// Default number of lost workflows fetched per sweep.
const DEFAULT_BATCH_LIMIT: usize = 100;

/// Default pause between sweeps.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Rescues workflows abandoned by dead executors.
pub struct WorkflowGc<S: WorkflowStore + 'static> {
    store: Arc<S>,
    limit: usize,
    poll_interval: Duration,
}

impl<S: WorkflowStore + 'static> WorkflowGc<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            limit: DEFAULT_BATCH_LIMIT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Sets the number of lost workflows fetched per sweep.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Sets the pause between sweeps.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Starts the sweep loop in the background.
    pub fn start(self) -> GcHandle {
        let token = CancellationToken::new();
        let loop_token = token.clone();

        info!("Starting workflow GC: batch_limit={}", self.limit);

        let handle = tokio::spawn(async move {
            loop {
                match self.store.get_lost_workflows(self.limit).await {
                    Ok(lost) => {
                        if !lost.is_empty() {
                            info!("Found {} lost workflows", lost.len());
                        }

                        // Collects within one batch run concurrently; the
                        // sweep waits for all of them before sleeping, so
                        // stop() leaves nothing half-done behind.
                        let mut collects: JoinSet<()> = JoinSet::new();
                        for workflow in lost {
                            let store = self.store.clone();
                            collects.spawn(async move {
                                Self::collect(store, workflow).await;
                            });
                        }
                        while let Some(result) = collects.join_next().await {
                            if let Err(e) = result {
                                error!("GC collect task failed: {}", e);
                            }
                        }
                    }
                    Err(e) => {
                        warn!("GC sweep failed: {}", e);
                    }
                }

                tokio::select! {
                    _ = loop_token.cancelled() => break,
                    _ = tokio::time::sleep(self.poll_interval) => {}
                }
            }

            info!("Workflow GC stopped");
        });

        GcHandle { handle, token }
    }

    /// Requeues a single lost workflow for immediate pickup.
    async fn collect(store: Arc<S>, mut workflow: Workflow) {
        let id = workflow.id;
        workflow.execute_at = Some(Utc::now());
        if let Err(e) = store.update_workflow(&mut workflow).await {
            warn!("GC failed to update workflow: id={}, error={}", id, e);
            return;
        }
        if let Err(e) = store
            .set_workflow_state(&mut workflow, WorkflowState::Queued)
            .await
        {
            warn!("GC failed to requeue workflow: id={}, error={}", id, e);
            return;
        }
        info!("Requeued lost workflow: id={}", id);
    }
}

/// Handle for controlling a running [`WorkflowGc`].
pub struct GcHandle {
    handle: JoinHandle<()>,
    token: CancellationToken,
}

impl GcHandle {
    /// Stops the sweep loop. In-flight collects complete naturally because
    /// each sweep awaits its batch before the loop re-checks cancellation.
    pub async fn stop(self) {
        self.token.cancel();
        let _ = self.handle.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::CreateWorkflowInput;
    use crate::storage::{InMemoryWorkflowStore, LivenessWindow};
    use chrono::Duration as ChronoDuration;
    use uuid::Uuid;

    #[tokio::test]
    async fn gc_requeues_stuck_pending_workflow() {
        let window = LivenessWindow {
            lookback: ChronoDuration::milliseconds(50),
            cutoff: ChronoDuration::hours(1),
        };
        let store = Arc::new(InMemoryWorkflowStore::with_liveness_window(window));

        let workflow = store
            .create_workflow(CreateWorkflowInput {
                id: Uuid::new_v4(),
                workflow_type: "test".to_string(),
                ref_type: String::new(),
                ref_id: String::new(),
                execute_at: None,
            })
            .await
            .unwrap();
        assert_eq!(workflow.state, WorkflowState::Pending);

        tokio::time::sleep(Duration::from_millis(80)).await;

        let before = Utc::now();
        let handle = WorkflowGc::new(store.clone())
            .with_poll_interval(Duration::from_millis(10))
            .start();

        let mut rescued = None;
        for _ in 0..100 {
            let current = store.get_workflow_by_id(workflow.id).await.unwrap().unwrap();
            if current.state == WorkflowState::Queued {
                rescued = Some(current);
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        handle.stop().await;

        let rescued = rescued.expect("GC did not requeue the workflow");
        let execute_at = rescued.execute_at.expect("execute_at must be set");
        assert!(execute_at >= before);
        assert!(execute_at <= Utc::now());
    }

    #[tokio::test]
    async fn gc_ignores_settled_and_fresh_workflows() {
        let window = LivenessWindow {
            lookback: ChronoDuration::milliseconds(200),
            cutoff: ChronoDuration::hours(1),
        };
        let store = Arc::new(InMemoryWorkflowStore::with_liveness_window(window));

        let mut settled = store
            .create_workflow(CreateWorkflowInput {
                id: Uuid::new_v4(),
                workflow_type: "test".to_string(),
                ref_type: String::new(),
                ref_id: String::new(),
                execute_at: None,
            })
            .await
            .unwrap();
        store
            .set_workflow_state(&mut settled, WorkflowState::Succeeded)
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(300)).await;

        let fresh = store
            .create_workflow(CreateWorkflowInput {
                id: Uuid::new_v4(),
                workflow_type: "test".to_string(),
                ref_type: String::new(),
                ref_id: String::new(),
                execute_at: None,
            })
            .await
            .unwrap();

        let handle = WorkflowGc::new(store.clone())
            .with_poll_interval(Duration::from_millis(10))
            .start();
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.stop().await;

        let settled_now = store.get_workflow_by_id(settled.id).await.unwrap().unwrap();
        assert_eq!(settled_now.state, WorkflowState::Succeeded);

        let fresh_now = store.get_workflow_by_id(fresh.id).await.unwrap().unwrap();
        assert_eq!(fresh_now.state, WorkflowState::Pending);
    }
}
