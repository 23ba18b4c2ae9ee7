//! Background removal of dead lock rows.
//!
//! Expiry is decided lazily by the acquisition statement, so this loop only
//! keeps the table small. Nothing depends on it running.

use crate::database::lock_repo;
use crate::services::app::log_codes::{log_event, LogCode};
use chrono::Utc;
use sqlx::SqlitePool;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Delete locks that expired at or before now. Returns how many were removed.
pub async fn sweep_expired_once(pool: &SqlitePool) -> Result<u64, sqlx::Error> {
    let removed = lock_repo::purge_expired(pool, Utc::now()).await?;
    if removed > 0 {
        log_event(LogCode::LockSweepCompleted, &[("removed", &removed)]);
    }
    Ok(removed)
}

/// Run [`sweep_expired_once`] every `interval` until `shutdown` flips to true.
pub fn spawn_expiry_sweep(
    pool: SqlitePool,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }

            if *shutdown.borrow() {
                break;
            }

            if let Err(e) = sweep_expired_once(&pool).await {
                log_event(LogCode::LockSweepFailed, &[("error", &e)]);
            }
        }
        log::debug!("Lock sweep stopped");
    })
}

#[cfg(test)]
#[path = "tests/sweeper_tests.rs"]
mod tests;
