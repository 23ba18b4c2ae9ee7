mod common;

use chrono::{Duration, Utc};
use futures_util::future::join_all;
use grants_backend_lib::database::lock_repo;
use grants_backend_lib::database::models::{to_millis, ScopeKey};
use grants_backend_lib::services::lock::{AcquireOutcome, LockAcquisitionService, LockReleaseService};
use tempfile::TempDir;

fn scope() -> ScopeKey {
    ScopeKey::new("EGWA", 1, "SBI-106")
}

fn winners(outcomes: &[AcquireOutcome]) -> Vec<&str> {
    outcomes
        .iter()
        .filter_map(|o| match o {
            AcquireOutcome::Acquired(lock) => Some(lock.owner_id.as_str()),
            AcquireOutcome::Conflict => None,
        })
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_two_instances_racing_for_free_scope_have_one_winner() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("locks.db");

    let pool_a = common::file_pool(&db, 4).await;
    let pool_b = common::file_pool(&db, 4).await;
    let service_a = LockAcquisitionService::new(pool_a.clone(), Duration::hours(4));
    let service_b = LockAcquisitionService::new(pool_b.clone(), Duration::hours(4));

    let key = scope();
    let attempts = (0..8).map(|i| {
        let service = if i % 2 == 0 { service_a.clone() } else { service_b.clone() };
        let key = key.clone();
        async move {
            service
                .acquire_or_refresh(&key, &format!("user-{i}"))
                .await
                .expect("no storage fault")
        }
    });
    let outcomes = join_all(attempts).await;

    assert_eq!(winners(&outcomes).len(), 1);

    let stored = lock_repo::find_lock(&pool_b, &key).await.unwrap().unwrap();
    assert_eq!(stored.owner_id, winners(&outcomes)[0]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_race_for_expired_lock_has_one_winner() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("locks.db");

    let pool_a = common::file_pool(&db, 4).await;
    let pool_b = common::file_pool(&db, 4).await;

    let key = scope();
    sqlx::query(
        "INSERT INTO application_locks (grant_code, grant_version, sbi, owner_id, locked_at, expires_at)
         VALUES (?, ?, ?, 'user-stale', ?, ?)",
    )
    .bind(&key.grant_code)
    .bind(key.grant_version)
    .bind(&key.sbi)
    .bind(to_millis(Utc::now() - Duration::hours(5)))
    .bind(to_millis(Utc::now() - Duration::hours(1)))
    .execute(&pool_a)
    .await
    .unwrap();

    let service_a = LockAcquisitionService::new(pool_a.clone(), Duration::hours(4));
    let service_b = LockAcquisitionService::new(pool_b.clone(), Duration::hours(4));

    let (first, second) = tokio::join!(
        service_a.acquire_or_refresh(&key, "user-a"),
        service_b.acquire_or_refresh(&key, "user-b"),
    );
    let outcomes = [first.unwrap(), second.unwrap()];

    let won = winners(&outcomes);
    assert_eq!(won.len(), 1);
    assert_ne!(won[0], "user-stale");
}

#[tokio::test]
async fn test_acquire_conflict_release_retry() {
    let pool = common::init_test_db().await.pool;
    let acquisition = LockAcquisitionService::new(pool.clone(), Duration::hours(4));
    let release = LockReleaseService::new(pool.clone());
    let key = scope();

    assert!(matches!(
        acquisition.acquire_or_refresh(&key, "user-1").await.unwrap(),
        AcquireOutcome::Acquired(_)
    ));
    assert_eq!(
        acquisition.acquire_or_refresh(&key, "user-2").await.unwrap(),
        AcquireOutcome::Conflict
    );

    assert!(release.release(&key, "user-1").await.unwrap());

    match acquisition.acquire_or_refresh(&key, "user-2").await.unwrap() {
        AcquireOutcome::Acquired(lock) => assert_eq!(lock.owner_id, "user-2"),
        AcquireOutcome::Conflict => panic!("lock should be free after release"),
    }
}

#[tokio::test]
async fn test_release_all_for_owner_clears_every_scope() {
    let pool = common::init_test_db().await.pool;
    let acquisition = LockAcquisitionService::new(pool.clone(), Duration::hours(4));
    let release = LockReleaseService::new(pool.clone());

    let first = ScopeKey::new("EGWA", 1, "SBI-1");
    let second = ScopeKey::new("EGWA", 1, "SBI-2");
    acquisition.acquire_or_refresh(&first, "user-1").await.unwrap();
    acquisition.acquire_or_refresh(&second, "user-1").await.unwrap();

    assert_eq!(release.release_all_for_owner("user-1").await.unwrap(), 2);
    assert!(lock_repo::find_lock(&pool, &first).await.unwrap().is_none());
    assert!(lock_repo::find_lock(&pool, &second).await.unwrap().is_none());
}
