//! Persistence for application edit locks.
//!
//! The only write that grants a lock is [`compare_and_swap`]: one
//! `INSERT .. ON CONFLICT DO UPDATE .. WHERE` statement, so taking over an
//! expired lock, refreshing an owned lock and creating a fresh one are all
//! decided atomically by the database. There is no read-then-write path.

use super::models::{to_millis, LockRecord, LockRow, ScopeKey};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

const LOCK_COLUMNS: &str = "grant_code, grant_version, sbi, owner_id, locked_at, expires_at";

/// Conditionally upsert the lock for `scope`.
///
/// The row is written when no lock exists, when the existing lock expired at or
/// before `now`, or when `owner_id` already holds it. Returns `None` when an
/// active lock belongs to someone else; nothing is modified in that case.
///
/// A same-owner refresh always moves `expires_at` forward, even if two calls
/// land in the same millisecond.
pub async fn compare_and_swap(
    pool: &SqlitePool,
    scope: &ScopeKey,
    owner_id: &str,
    now: DateTime<Utc>,
    expires_at: DateTime<Utc>,
) -> Result<Option<LockRecord>, sqlx::Error> {
    let sql = format!(
        "INSERT INTO application_locks ({LOCK_COLUMNS})
         VALUES (?, ?, ?, ?, ?, ?)
         ON CONFLICT (grant_code, grant_version, sbi) DO UPDATE SET
             owner_id = excluded.owner_id,
             locked_at = excluded.locked_at,
             expires_at = MAX(excluded.expires_at, application_locks.expires_at + 1)
         WHERE application_locks.expires_at <= excluded.locked_at
            OR application_locks.owner_id = excluded.owner_id
         RETURNING {LOCK_COLUMNS}"
    );

    let row = sqlx::query_as::<_, LockRow>(&sql)
        .bind(&scope.grant_code)
        .bind(scope.grant_version)
        .bind(&scope.sbi)
        .bind(owner_id)
        .bind(to_millis(now))
        .bind(to_millis(expires_at))
        .fetch_optional(pool)
        .await?;

    Ok(row.map(LockRecord::from))
}

/// Fetch the stored lock for `scope`, expired or not.
pub async fn find_lock(
    pool: &SqlitePool,
    scope: &ScopeKey,
) -> Result<Option<LockRecord>, sqlx::Error> {
    let sql = format!(
        "SELECT {LOCK_COLUMNS} FROM application_locks
         WHERE grant_code = ? AND grant_version = ? AND sbi = ?"
    );
    let row = sqlx::query_as::<_, LockRow>(&sql)
        .bind(&scope.grant_code)
        .bind(scope.grant_version)
        .bind(&scope.sbi)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(LockRecord::from))
}

/// Delete the lock for `scope` only if `owner_id` holds it.
pub async fn delete_owned_lock(
    pool: &SqlitePool,
    scope: &ScopeKey,
    owner_id: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "DELETE FROM application_locks
         WHERE grant_code = ? AND grant_version = ? AND sbi = ? AND owner_id = ?",
    )
    .bind(&scope.grant_code)
    .bind(scope.grant_version)
    .bind(&scope.sbi)
    .bind(owner_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Delete every lock held by `owner_id`, across all scopes.
pub async fn delete_locks_for_owner(pool: &SqlitePool, owner_id: &str) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM application_locks WHERE owner_id = ?")
        .bind(owner_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// Remove locks whose lease ended at or before `now`. Storage hygiene only.
pub async fn purge_expired(pool: &SqlitePool, now: DateTime<Utc>) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM application_locks WHERE expires_at <= ?")
        .bind(to_millis(now))
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// True when the database rejected a write because of the scope's unique index.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.is_unique_violation(),
        _ => false,
    }
}

/// Driver error code, when the database supplied one.
pub fn driver_error_code(err: &sqlx::Error) -> Option<String> {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().map(|c| c.into_owned()),
        _ => None,
    }
}

#[cfg(test)]
#[path = "tests/lock_repo_tests.rs"]
mod tests;
