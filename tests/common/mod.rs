//! Scripted plugins shared by the end-to-end scenarios.

#![allow(dead_code)]

use async_trait::async_trait;
use praxis::{
    Activity, ActivityFailure, ActivityPlugin, BoxError, CreateWorkflowInput, Notifier, Workflow,
    WorkflowPlugin,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// One scripted callback outcome. Scripts are consumed front-to-back;
/// an exhausted script succeeds.
#[derive(Clone, Copy, Debug)]
pub enum Outcome {
    Succeed,
    FailTemporary,
    FailPermanent,
}

impl Outcome {
    fn into_result(self) -> Result<(), ActivityFailure> {
        match self {
            Outcome::Succeed => Ok(()),
            Outcome::FailTemporary => Err(ActivityFailure::temporary("scripted failure")),
            Outcome::FailPermanent => Err(ActivityFailure::Permanent),
        }
    }
}

/// An activity plugin with programmable outcomes and call counters.
pub struct ScriptedActivity {
    name: String,
    execute_script: Mutex<VecDeque<Outcome>>,
    rollback_script: Mutex<VecDeque<Outcome>>,
    execute_calls: AtomicUsize,
    rollback_calls: AtomicUsize,
    history: Arc<Mutex<Vec<String>>>,
}

impl ScriptedActivity {
    pub fn new(name: &str, history: Arc<Mutex<Vec<String>>>) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            execute_script: Mutex::new(VecDeque::new()),
            rollback_script: Mutex::new(VecDeque::new()),
            execute_calls: AtomicUsize::new(0),
            rollback_calls: AtomicUsize::new(0),
            history,
        })
    }

    pub fn script_execute(&self, outcomes: &[Outcome]) {
        self.execute_script.lock().unwrap().extend(outcomes);
    }

    pub fn script_rollback(&self, outcomes: &[Outcome]) {
        self.rollback_script.lock().unwrap().extend(outcomes);
    }

    pub fn execute_calls(&self) -> usize {
        self.execute_calls.load(Ordering::SeqCst)
    }

    pub fn rollback_calls(&self) -> usize {
        self.rollback_calls.load(Ordering::SeqCst)
    }

    fn next(script: &Mutex<VecDeque<Outcome>>) -> Outcome {
        script.lock().unwrap().pop_front().unwrap_or(Outcome::Succeed)
    }
}

#[async_trait]
impl ActivityPlugin for ScriptedActivity {
    fn activity_type(&self) -> &str {
        &self.name
    }

    async fn execute(
        &self,
        _workflow: &Workflow,
        _activity: &Activity,
    ) -> Result<(), ActivityFailure> {
        self.execute_calls.fetch_add(1, Ordering::SeqCst);
        self.history.lock().unwrap().push(self.name.clone());
        Self::next(&self.execute_script).into_result()
    }

    async fn rollback(
        &self,
        _workflow: &Workflow,
        _activity: &Activity,
    ) -> Result<(), ActivityFailure> {
        self.rollback_calls.fetch_add(1, Ordering::SeqCst);
        self.history
            .lock()
            .unwrap()
            .push(format!("rollback:{}", self.name));
        Self::next(&self.rollback_script).into_result()
    }
}

/// A workflow plugin returning a fixed plan.
pub struct StaticPlan {
    workflow_type: String,
    plan: Vec<String>,
}

impl StaticPlan {
    pub fn new(workflow_type: &str, plan: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            workflow_type: workflow_type.to_string(),
            plan: plan.iter().map(|s| s.to_string()).collect(),
        })
    }
}

#[async_trait]
impl WorkflowPlugin for StaticPlan {
    fn workflow_type(&self) -> &str {
        &self.workflow_type
    }

    async fn plan(&self, _workflow: &Workflow) -> Result<Vec<String>, BoxError> {
        Ok(self.plan.clone())
    }
}

/// A notifier that records every hook invocation.
#[derive(Default)]
pub struct RecordingNotifier {
    pub events: Mutex<Vec<String>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn begin_workflow(&self, _workflow: &Workflow) -> Result<(), BoxError> {
        self.events.lock().unwrap().push("begin_workflow".to_string());
        Ok(())
    }

    async fn end_workflow(&self, _workflow: &Workflow) -> Result<(), BoxError> {
        self.events.lock().unwrap().push("end_workflow".to_string());
        Ok(())
    }

    async fn begin_activity(
        &self,
        _workflow: &Workflow,
        activity: &Activity,
    ) -> Result<(), BoxError> {
        self.events
            .lock()
            .unwrap()
            .push(format!("begin_activity:{}", activity.activity_type));
        Ok(())
    }

    async fn end_activity(
        &self,
        _workflow: &Workflow,
        activity: &Activity,
    ) -> Result<(), BoxError> {
        self.events
            .lock()
            .unwrap()
            .push(format!("end_activity:{}", activity.activity_type));
        Ok(())
    }
}

/// A notifier whose every hook fails.
pub struct FailingNotifier;

#[async_trait]
impl Notifier for FailingNotifier {
    async fn begin_workflow(&self, _workflow: &Workflow) -> Result<(), BoxError> {
        Err("notifier outage".into())
    }

    async fn end_workflow(&self, _workflow: &Workflow) -> Result<(), BoxError> {
        Err("notifier outage".into())
    }

    async fn begin_activity(
        &self,
        _workflow: &Workflow,
        _activity: &Activity,
    ) -> Result<(), BoxError> {
        Err("notifier outage".into())
    }

    async fn end_activity(
        &self,
        _workflow: &Workflow,
        _activity: &Activity,
    ) -> Result<(), BoxError> {
        Err("notifier outage".into())
    }
}

/// Installs a log subscriber once; `RUST_LOG=praxis=debug cargo test`
/// then shows the engine's transitions.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Creation input for a workflow of the given type with no schedule.
pub fn workflow_input(workflow_type: &str) -> CreateWorkflowInput {
    let id = Uuid::new_v4();
    CreateWorkflowInput {
        id,
        workflow_type: workflow_type.to_string(),
        ref_type: "test".to_string(),
        ref_id: id.to_string(),
        execute_at: None,
    }
}
