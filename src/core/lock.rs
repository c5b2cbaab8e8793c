use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How long a freshly acquired workflow lock stays valid.
///
/// A crashed holder's lock becomes evictable after this expiry, so its
/// workflow does not stay unlockable forever.
pub const LOCK_TTL_SECS: i64 = 15 * 60;

/// A persisted per-workflow mutex.
///
/// The presence of the record is the lock; the unique `id` (equal to the
/// workflow id) enforces at-most-one holder. `expire_at` lets a later
/// acquirer displace the row once the previous holder is presumed dead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowLock {
    /// The locked workflow's id.
    pub id: Uuid,
    /// Wall-clock instant after which the lock is evictable.
    pub expire_at: DateTime<Utc>,
    /// When this lock was acquired.
    pub created_at: DateTime<Utc>,
}

impl WorkflowLock {
    /// Creates a lock record for `workflow_id` expiring [`LOCK_TTL_SECS`]
    /// from now.
    pub fn acquire(workflow_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: workflow_id,
            expire_at: now + Duration::seconds(LOCK_TTL_SECS),
            created_at: now,
        }
    }

    /// Returns true once the holder is presumed dead.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expire_at <= now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_lock_is_not_expired() {
        let lock = WorkflowLock::acquire(Uuid::new_v4());
        assert!(!lock.is_expired(Utc::now()));
        assert!(lock.is_expired(Utc::now() + Duration::seconds(LOCK_TTL_SECS + 1)));
    }
}
