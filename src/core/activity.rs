use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use super::error::Error;

/// Namespace for deterministic activity ids:
/// `5df6a4fe-1fe4-47b8-bf32-3bf599650a9f`.
///
/// Activity ids are UUIDv5 of `"<workflowId>:<activityType>"` under this
/// namespace, which makes activity creation idempotent across retries and
/// processes. The value is part of the external ABI and must never change.
pub const ACTIVITY_ID_NAMESPACE: Uuid =
    Uuid::from_u128(0x5df6a4fe_1fe4_47b8_bf32_3bf599650a9f);

/// Prefix marking a compensating activity. A rollback of a completed
/// activity of type `T` runs under activity type `rollback:T`, resolved to
/// the same plugin as `T`.
pub const ROLLBACK_PREFIX: &str = "rollback:";

/// Computes the deterministic id for `(workflow_id, activity_type)`.
///
/// Repeated calls with the same inputs yield the same id in every process,
/// so a retry always finds the row its predecessor created.
pub fn activity_id(workflow_id: Uuid, activity_type: &str) -> Uuid {
    Uuid::new_v5(
        &ACTIVITY_ID_NAMESPACE,
        format!("{workflow_id}:{activity_type}").as_bytes(),
    )
}

/// Returns the compensating activity type for a forward activity type.
pub fn rollback_type(activity_type: &str) -> String {
    format!("{ROLLBACK_PREFIX}{activity_type}")
}

/// Normalizes an activity type to its plugin key: strips a leading
/// `rollback:` prefix, then takes the substring before the first `:`.
///
/// `foo`, `foo:meta` and `rollback:foo:meta` all resolve to `foo`.
pub fn plugin_type(activity_type: &str) -> &str {
    let forward = activity_type
        .strip_prefix(ROLLBACK_PREFIX)
        .unwrap_or(activity_type);
    forward.split(':').next().unwrap_or(forward)
}

/// State of a single activity within one executor invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActivityState {
    /// Created, callback not yet started.
    Pending,
    /// Callback in flight.
    Running,
    /// Callback failed transiently; the workflow will be retried.
    FailedTemporary,
    /// Terminal: callback failed permanently; the workflow must compensate.
    FailedPermanent,
    /// Terminal: callback completed.
    Succeeded,
}

impl ActivityState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityState::Pending => "pending",
            ActivityState::Running => "running",
            ActivityState::FailedTemporary => "failed_temporary",
            ActivityState::FailedPermanent => "failed_permanent",
            ActivityState::Succeeded => "succeeded",
        }
    }

    /// Terminal activity states never re-run their callback.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ActivityState::FailedPermanent | ActivityState::Succeeded
        )
    }
}

impl std::fmt::Display for ActivityState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ActivityState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ActivityState::Pending),
            "running" => Ok(ActivityState::Running),
            "failed_temporary" => Ok(ActivityState::FailedTemporary),
            "failed_permanent" => Ok(ActivityState::FailedPermanent),
            "succeeded" => Ok(ActivityState::Succeeded),
            _ => Err(Error::InvalidActivityState(s.to_string())),
        }
    }
}

/// One step of a workflow, forward or compensating.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    /// Deterministic id; see [`activity_id`].
    pub id: Uuid,
    /// The workflow this activity belongs to.
    pub workflow_id: Uuid,
    /// Activity type, possibly carrying the `rollback:` prefix.
    pub activity_type: String,
    /// Current state.
    pub state: ActivityState,
    /// When this activity was created.
    pub created_at: DateTime<Utc>,
    /// When this activity was last updated.
    pub updated_at: DateTime<Utc>,
}
