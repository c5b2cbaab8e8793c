//! Queue-polling loop that admits due workflows for execution.
//!
//! The queue polls the store for `queued` workflows whose `execute_at` has
//! passed and dispatches each as a fire-and-forget task under a bounded
//! in-flight cap. Admission atomicity lives in the store
//! (`get_executable_workflows` marks rows `pending` as it selects them),
//! which is what makes several queues on the same store safe: no two ever
//! take the same workflow.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashSet;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::workflow::WorkflowExecutor;
use crate::core::Workflow;
use crate::storage::WorkflowStore;

/// Default cap on concurrently executing workflows.
const DEFAULT_LIMIT: usize = 10;

/// Default pause between store polls.
const DEFAULT_QUERY_BACKOFF: Duration = Duration::from_secs(1);

/// Interval at which `stop()` re-checks the in-flight set.
const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Polls the store for due workflows and executes them concurrently.
pub struct WorkflowQueue<S: WorkflowStore + 'static> {
    store: Arc<S>,
    executor: Arc<WorkflowExecutor<S>>,
    limit: usize,
    query_backoff: Duration,
}

impl<S: WorkflowStore + 'static> WorkflowQueue<S> {
    pub fn new(store: Arc<S>, executor: Arc<WorkflowExecutor<S>>) -> Self {
        Self {
            store,
            executor,
            limit: DEFAULT_LIMIT,
            query_backoff: DEFAULT_QUERY_BACKOFF,
        }
    }

    /// Sets the maximum number of workflows executing at once.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Sets the pause between store polls.
    pub fn with_query_backoff(mut self, backoff: Duration) -> Self {
        self.query_backoff = backoff;
        self
    }

    /// Starts the polling loop in the background.
    pub fn start(self) -> QueueHandle {
        let token = CancellationToken::new();
        let loop_token = token.clone();
        let in_flight: Arc<DashSet<Uuid>> = Arc::new(DashSet::new());
        let in_flight_for_handle = in_flight.clone();

        info!("Starting workflow queue: limit={}", self.limit);

        let handle = tokio::spawn(async move {
            loop {
                let available = self.limit.saturating_sub(in_flight.len());
                if available > 0 {
                    match self
                        .store
                        .get_executable_workflows(Utc::now(), available)
                        .await
                    {
                        Ok(batch) => {
                            for workflow in batch {
                                Self::dispatch(self.executor.clone(), &in_flight, workflow);
                            }
                        }
                        Err(e) => {
                            warn!("Queue poll failed: {}", e);
                        }
                    }
                }

                tokio::select! {
                    _ = loop_token.cancelled() => break,
                    _ = tokio::time::sleep(self.query_backoff) => {}
                }
            }

            info!("Workflow queue stopped polling");
        });

        QueueHandle {
            handle,
            token,
            in_flight: in_flight_for_handle,
        }
    }

    /// Spawns one workflow execution without awaiting it.
    ///
    /// The queue's forward progress must never depend on a single workflow
    /// finishing. The in-flight entry is removed by a drop guard so even a
    /// panicking execution frees its slot.
    fn dispatch(
        executor: Arc<WorkflowExecutor<S>>,
        in_flight: &Arc<DashSet<Uuid>>,
        mut workflow: Workflow,
    ) {
        let id = workflow.id;
        in_flight.insert(id);
        let guard = InFlightGuard {
            set: in_flight.clone(),
            id,
        };

        debug!("Dispatching workflow: id={}", id);
        tokio::spawn(async move {
            let _guard = guard;
            if let Err(e) = executor.execute(&mut workflow).await {
                error!("Workflow execution failed: id={}, error={}", id, e);
            }
        });
    }
}

struct InFlightGuard {
    set: Arc<DashSet<Uuid>>,
    id: Uuid,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.set.remove(&self.id);
    }
}

/// Handle for controlling a running [`WorkflowQueue`].
pub struct QueueHandle {
    handle: JoinHandle<()>,
    token: CancellationToken,
    in_flight: Arc<DashSet<Uuid>>,
}

impl QueueHandle {
    /// Number of workflows currently executing.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Stops polling and waits for in-flight workflows to drain.
    pub async fn stop(self) {
        self.token.cancel();
        while !self.in_flight.is_empty() {
            tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
        }
        let _ = self.handle.await;
        info!("Workflow queue stopped");
    }
}
