use super::models::{to_millis, ScopeKey};
use chrono::Utc;
use serde_json::{Map, Value};
use sqlx::SqlitePool;

/// Result of [`save_state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Created,
    Updated,
}

/// Load the stored state object for `scope`.
pub async fn get_state(pool: &SqlitePool, scope: &ScopeKey) -> Result<Option<Value>, sqlx::Error> {
    let row: Option<(String,)> = sqlx::query_as(
        "SELECT state FROM application_state
         WHERE sbi = ? AND grant_code = ? AND grant_version = ?",
    )
    .bind(&scope.sbi)
    .bind(&scope.grant_code)
    .bind(scope.grant_version)
    .fetch_optional(pool)
    .await?;

    row.map(|(state,)| decode_state(&state)).transpose()
}

/// Insert or replace the state for `scope` in one transaction.
pub async fn save_state(
    pool: &SqlitePool,
    scope: &ScopeKey,
    state: &Value,
) -> Result<SaveOutcome, sqlx::Error> {
    let now = to_millis(Utc::now());
    let body = encode_state(state)?;
    let mut tx = pool.begin().await?;

    let updated = sqlx::query(
        "UPDATE application_state SET state = ?, updated_at = ?
         WHERE sbi = ? AND grant_code = ? AND grant_version = ?",
    )
    .bind(&body)
    .bind(now)
    .bind(&scope.sbi)
    .bind(&scope.grant_code)
    .bind(scope.grant_version)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    let outcome = if updated == 0 {
        sqlx::query(
            "INSERT INTO application_state
                (sbi, grant_code, grant_version, state, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&scope.sbi)
        .bind(&scope.grant_code)
        .bind(scope.grant_version)
        .bind(&body)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;
        SaveOutcome::Created
    } else {
        SaveOutcome::Updated
    };

    tx.commit().await?;
    Ok(outcome)
}

/// Shallow-merge `patch` into the stored state object. Returns false when no state exists.
pub async fn patch_state(
    pool: &SqlitePool,
    scope: &ScopeKey,
    patch: &Map<String, Value>,
) -> Result<bool, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let row: Option<(String,)> = sqlx::query_as(
        "SELECT state FROM application_state
         WHERE sbi = ? AND grant_code = ? AND grant_version = ?",
    )
    .bind(&scope.sbi)
    .bind(&scope.grant_code)
    .bind(scope.grant_version)
    .fetch_optional(&mut *tx)
    .await?;

    let Some((stored,)) = row else {
        return Ok(false);
    };

    let mut merged = match decode_state(&stored)? {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    for (key, value) in patch {
        merged.insert(key.clone(), value.clone());
    }

    sqlx::query(
        "UPDATE application_state SET state = ?, updated_at = ?
         WHERE sbi = ? AND grant_code = ? AND grant_version = ?",
    )
    .bind(encode_state(&Value::Object(merged))?)
    .bind(to_millis(Utc::now()))
    .bind(&scope.sbi)
    .bind(&scope.grant_code)
    .bind(scope.grant_version)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(true)
}

/// Delete the state for `scope`. Returns whether a row was removed.
pub async fn delete_state(pool: &SqlitePool, scope: &ScopeKey) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "DELETE FROM application_state WHERE sbi = ? AND grant_code = ? AND grant_version = ?",
    )
    .bind(&scope.sbi)
    .bind(&scope.grant_code)
    .bind(scope.grant_version)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

fn encode_state(state: &Value) -> Result<String, sqlx::Error> {
    serde_json::to_string(state).map_err(|e| sqlx::Error::Encode(Box::new(e)))
}

fn decode_state(raw: &str) -> Result<Value, sqlx::Error> {
    serde_json::from_str(raw).map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

#[cfg(test)]
#[path = "tests/state_repo_tests.rs"]
mod tests;
