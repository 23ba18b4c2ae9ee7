use crate::database::lock_repo;
use crate::database::models::ScopeKey;
use crate::services::app::log_codes::{log_event, LogCode};
use sqlx::SqlitePool;

/// Drops edit leases. Releasing nothing is not an error.
#[derive(Clone)]
pub struct LockReleaseService {
    pool: SqlitePool,
}

impl LockReleaseService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Delete the lock on `scope` if `owner_id` holds it. Returns whether a lock was removed.
    pub async fn release(&self, scope: &ScopeKey, owner_id: &str) -> Result<bool, sqlx::Error> {
        lock_repo::delete_owned_lock(&self.pool, scope, owner_id)
            .await
            .inspect_err(|e| {
                log_event(
                    LogCode::LockReleaseFailed,
                    &[("scope", scope), ("ownerId", &owner_id), ("error", e)],
                )
            })
    }

    /// Delete every lock held by `owner_id`. Returns how many were removed.
    pub async fn release_all_for_owner(&self, owner_id: &str) -> Result<u64, sqlx::Error> {
        lock_repo::delete_locks_for_owner(&self.pool, owner_id)
            .await
            .inspect_err(|e| {
                log_event(
                    LogCode::LockReleaseAllFailed,
                    &[("ownerId", &owner_id), ("error", e)],
                )
            })
    }
}

#[cfg(test)]
#[path = "tests/release_tests.rs"]
mod tests;
