use crate::database::models::{to_millis, ScopeKey};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite};
use std::sync::Once;

static INIT: Once = Once::new();

pub const TEST_LOCK_SECRET: &str = "test-lock-secret-test-lock-secret";

pub struct TestContext {
    pub pool: Pool<Sqlite>,
}

pub async fn init_test_db() -> TestContext {
    INIT.call_once(|| {
        // Initialize logger only once
        let _ = env_logger::builder().is_test(true).try_init();
    });

    // Single connection: every in-memory connection would otherwise be its own database
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    TestContext { pool }
}

pub fn scope(grant_code: &str, grant_version: i64, sbi: &str) -> ScopeKey {
    ScopeKey::new(grant_code, grant_version, sbi)
}

/// Write a lock row directly, bypassing the acquisition rules.
pub async fn seed_lock(
    pool: &Pool<Sqlite>,
    scope: &ScopeKey,
    owner_id: &str,
    expires_at: DateTime<Utc>,
) {
    sqlx::query(
        "INSERT INTO application_locks (grant_code, grant_version, sbi, owner_id, locked_at, expires_at)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&scope.grant_code)
    .bind(scope.grant_version)
    .bind(&scope.sbi)
    .bind(owner_id)
    .bind(to_millis(Utc::now()))
    .bind(to_millis(expires_at))
    .execute(pool)
    .await
    .expect("seed lock");
}

/// Mark `scope` as submitted.
pub async fn seed_submission(pool: &Pool<Sqlite>, scope: &ScopeKey) {
    sqlx::query(
        "INSERT INTO grant_application_submissions
            (id, crn, sbi, grant_code, grant_version, reference_number, submitted_at, created_at)
         VALUES (?, 'crn-1', ?, ?, ?, 'REF-1', ?, ?)",
    )
    .bind(uuid::Uuid::new_v4().to_string())
    .bind(&scope.sbi)
    .bind(&scope.grant_code)
    .bind(scope.grant_version)
    .bind(to_millis(Utc::now()))
    .bind(to_millis(Utc::now()))
    .execute(pool)
    .await
    .expect("seed submission");
}

pub async fn count_locks(pool: &Pool<Sqlite>) -> i64 {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM application_locks")
        .fetch_one(pool)
        .await
        .expect("count locks");
    row.0
}
