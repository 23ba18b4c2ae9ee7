use crate::database::lock_repo;
use crate::database::models::{LockRecord, ScopeKey};
use crate::services::app::log_codes::{log_event, LogCode};
use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;

/// Result of an acquire-or-refresh attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// The caller holds the lock until `LockRecord::expires_at`.
    Acquired(LockRecord),
    /// Someone else holds an active lock on the scope.
    Conflict,
}

/// Grants and extends edit leases. Stateless apart from the pool and TTL.
#[derive(Clone)]
pub struct LockAcquisitionService {
    pool: SqlitePool,
    ttl: Duration,
}

impl LockAcquisitionService {
    pub fn new(pool: SqlitePool, ttl: Duration) -> Self {
        Self { pool, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Take the lock for `owner_id`, refreshing it if already held or taking
    /// it over if the previous lease ran out.
    pub async fn acquire_or_refresh(
        &self,
        scope: &ScopeKey,
        owner_id: &str,
    ) -> Result<AcquireOutcome, sqlx::Error> {
        self.acquire_at(scope, owner_id, Utc::now()).await
    }

    pub(crate) async fn acquire_at(
        &self,
        scope: &ScopeKey,
        owner_id: &str,
        now: DateTime<Utc>,
    ) -> Result<AcquireOutcome, sqlx::Error> {
        let expires_at = now
            .checked_add_signed(self.ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        match lock_repo::compare_and_swap(&self.pool, scope, owner_id, now, expires_at).await {
            Ok(Some(lock)) => Ok(AcquireOutcome::Acquired(lock)),
            Ok(None) => {
                log_event(
                    LogCode::LockConflict,
                    &[("scope", scope), ("ownerId", &owner_id)],
                );
                Ok(AcquireOutcome::Conflict)
            }
            // Lost an insert race against another instance
            Err(e) if lock_repo::is_unique_violation(&e) => {
                log_event(
                    LogCode::LockConflict,
                    &[("scope", scope), ("ownerId", &owner_id), ("race", &true)],
                );
                Ok(AcquireOutcome::Conflict)
            }
            Err(e) => {
                let code = lock_repo::driver_error_code(&e).unwrap_or_else(|| "none".into());
                log_event(
                    LogCode::LockAcquireFailed,
                    &[
                        ("operation", &"acquire_or_refresh"),
                        ("scope", scope),
                        ("ownerId", &owner_id),
                        ("code", &code),
                        ("error", &e),
                    ],
                );
                Err(e)
            }
        }
    }

    /// Current lock for `scope`, if one is active at `now`. Never writes.
    pub async fn active_lock(&self, scope: &ScopeKey) -> Result<Option<LockRecord>, sqlx::Error> {
        let now = Utc::now();
        let lock = lock_repo::find_lock(&self.pool, scope).await?;
        Ok(lock.filter(|l| l.is_active_at(now)))
    }
}

#[cfg(test)]
#[path = "tests/acquire_tests.rs"]
mod tests;
