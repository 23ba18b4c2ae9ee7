pub mod commands;
pub mod database;
pub mod services;
pub mod types;
#[cfg(test)]
pub mod test_utils;

use crate::commands::{build_router, AppState};
use crate::services::app::log_codes::{log_event, validate_log_codes, LogCode};
use crate::services::config::AppConfig;
use crate::services::lock::sweeper::spawn_expiry_sweep;
use crate::types::errors::AppError;
use std::future::Future;
use tokio::net::TcpListener;
use tokio::sync::watch;

/// Start the service and block until `shutdown` resolves.
pub async fn run<F>(config: AppConfig, shutdown: F) -> Result<(), AppError>
where
    F: Future<Output = ()> + Send + 'static,
{
    validate_log_codes().map_err(AppError::Config)?;

    let pool = database::connect(&config.database).await?;
    let state = AppState::new(pool.clone(), &config.lock, &config.service_auth);

    let (stop_tx, stop_rx) = watch::channel(false);
    let sweep = config
        .lock
        .sweep_interval
        .map(|interval| spawn_expiry_sweep(pool.clone(), interval, stop_rx.clone()));

    let listener = TcpListener::bind(config.server.bind_addr()).await?;
    let addr = listener.local_addr()?;
    log_event(LogCode::ServerStarted, &[("addr", &addr)]);

    let served = axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown)
        .await;

    // Background work stops with the server, including on error.
    let _ = stop_tx.send(true);
    if let Some(handle) = sweep {
        let _ = handle.await;
    }
    pool.close().await;

    served?;
    log::info!("Server stopped");
    Ok(())
}
