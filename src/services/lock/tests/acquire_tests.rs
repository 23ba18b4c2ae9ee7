use super::*;
use crate::test_utils::{count_locks, init_test_db, scope, seed_lock};

async fn setup() -> (LockAcquisitionService, SqlitePool) {
    let pool = init_test_db().await.pool;
    (
        LockAcquisitionService::new(pool.clone(), Duration::hours(4)),
        pool,
    )
}

fn acquired(outcome: AcquireOutcome) -> LockRecord {
    match outcome {
        AcquireOutcome::Acquired(lock) => lock,
        AcquireOutcome::Conflict => panic!("expected the lock to be granted"),
    }
}

#[tokio::test]
async fn test_first_acquire_sets_ttl() {
    let (service, _pool) = setup().await;
    let now = Utc::now();

    let lock = acquired(
        service
            .acquire_at(&scope("EGWA", 1, "SBI-106"), "user-1", now)
            .await
            .unwrap(),
    );

    assert_eq!(lock.owner_id, "user-1");
    assert_eq!(
        (lock.expires_at - lock.locked_at).num_milliseconds(),
        Duration::hours(4).num_milliseconds()
    );
}

#[tokio::test]
async fn test_mutual_exclusion_then_release_then_retry() {
    let (service, pool) = setup().await;
    let key = scope("EGWA", 1, "SBI-106");

    acquired(service.acquire_or_refresh(&key, "user-1").await.unwrap());
    assert_eq!(
        service.acquire_or_refresh(&key, "user-2").await.unwrap(),
        AcquireOutcome::Conflict
    );

    lock_repo::delete_owned_lock(&pool, &key, "user-1").await.unwrap();

    let lock = acquired(service.acquire_or_refresh(&key, "user-2").await.unwrap());
    assert_eq!(lock.owner_id, "user-2");
}

#[tokio::test]
async fn test_refresh_strictly_extends() {
    let (service, _pool) = setup().await;
    let key = scope("EGWA", 1, "SBI-106");
    let now = Utc::now();

    let first = acquired(service.acquire_at(&key, "user-1", now).await.unwrap());
    let second = acquired(service.acquire_at(&key, "user-1", now).await.unwrap());
    let third = acquired(service.acquire_at(&key, "user-1", now).await.unwrap());

    assert!(second.expires_at > first.expires_at);
    assert!(third.expires_at > second.expires_at);
}

#[tokio::test]
async fn test_expired_lock_is_taken_over() {
    let (service, pool) = setup().await;
    let key = scope("EGWA", 1, "SBI-106");
    let now = Utc::now();
    seed_lock(&pool, &key, "user-1", now - Duration::seconds(60)).await;

    let lock = acquired(service.acquire_at(&key, "user-2", now).await.unwrap());
    assert_eq!(lock.owner_id, "user-2");
    assert!(lock.expires_at > now);
    assert_eq!(count_locks(&pool).await, 1);
}

#[tokio::test]
async fn test_conflict_leaves_holder_untouched() {
    let (service, pool) = setup().await;
    let key = scope("EGWA", 1, "SBI-106");
    let now = Utc::now();
    let holder = acquired(service.acquire_at(&key, "user-1", now).await.unwrap());

    let outcome = service
        .acquire_at(&key, "user-2", now + Duration::minutes(1))
        .await
        .unwrap();
    assert_eq!(outcome, AcquireOutcome::Conflict);

    let stored = lock_repo::find_lock(&pool, &key).await.unwrap().unwrap();
    assert_eq!(stored, holder);
}

#[tokio::test]
async fn test_scopes_are_independent() {
    let (service, _pool) = setup().await;

    acquired(service.acquire_or_refresh(&scope("EGWA", 1, "SBI-106"), "user-1").await.unwrap());
    acquired(service.acquire_or_refresh(&scope("EGWA", 2, "SBI-106"), "user-2").await.unwrap());
    acquired(service.acquire_or_refresh(&scope("FPTT", 1, "SBI-106"), "user-3").await.unwrap());
}

#[tokio::test]
async fn test_active_lock_ignores_expired_rows() {
    let (service, pool) = setup().await;
    let key = scope("EGWA", 1, "SBI-106");
    seed_lock(&pool, &key, "user-1", Utc::now() - Duration::seconds(1)).await;

    assert!(service.active_lock(&key).await.unwrap().is_none());

    acquired(service.acquire_or_refresh(&key, "user-2").await.unwrap());
    let active = service.active_lock(&key).await.unwrap().unwrap();
    assert_eq!(active.owner_id, "user-2");
}

#[tokio::test]
async fn test_storage_fault_is_returned() {
    let (service, pool) = setup().await;
    pool.close().await;

    let result = service
        .acquire_or_refresh(&scope("EGWA", 1, "SBI-106"), "user-1")
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_oversized_ttl_saturates_instead_of_panicking() {
    let pool = init_test_db().await.pool;
    let service = LockAcquisitionService::new(pool, Duration::milliseconds(10_000_000_000_000_000));

    let lock = acquired(
        service
            .acquire_or_refresh(&scope("EGWA", 1, "SBI-106"), "user-1")
            .await
            .unwrap(),
    );
    assert!(lock.expires_at > Utc::now() + Duration::days(365));
}
