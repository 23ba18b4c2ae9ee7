//! HTTP surface: shared state, routing and handlers.

pub mod extract;
pub mod health_cmds;
pub mod lock_cmds;
pub mod state_cmds;
pub mod submission_cmds;

use crate::services::auth::{require_service_auth, ServiceAuthenticator};
use crate::services::config::{LockConfig, ServiceAuthConfig};
use crate::services::lock::{
    enforce_application_lock, LockAcquisitionService, LockEnforcer, LockReleaseService,
    LockTokenCodec,
};
use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{delete, get, patch, post};
use axum::Router;
use sqlx::SqlitePool;
use std::sync::Arc;

/// Shared handles passed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub codec: Arc<LockTokenCodec>,
    pub enforcer: Arc<LockEnforcer>,
    pub release: LockReleaseService,
    pub service_auth: Arc<ServiceAuthenticator>,
}

impl AppState {
    pub fn new(pool: SqlitePool, lock: &LockConfig, service_auth: &ServiceAuthConfig) -> Self {
        let codec = Arc::new(LockTokenCodec::new(lock.secret.clone()));
        let acquisition = LockAcquisitionService::new(pool.clone(), lock.ttl);
        let enforcer = LockEnforcer::new(codec.clone(), acquisition, pool.clone(), lock.read_policy);

        Self {
            release: LockReleaseService::new(pool.clone()),
            enforcer: Arc::new(enforcer),
            service_auth: Arc::new(ServiceAuthenticator::new(service_auth)),
            codec,
            pool,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let lock_guard =
        middleware::from_fn_with_state(state.enforcer.clone(), enforce_application_lock);

    let api = Router::new()
        .route(
            "/state",
            get(state_cmds::get_state)
                .post(state_cmds::save_state)
                .delete(state_cmds::delete_state)
                .route_layer(lock_guard.clone()),
        )
        .route(
            "/state/{sbi}/{grant_code}",
            patch(state_cmds::patch_state).route_layer(lock_guard.clone()),
        )
        .route(
            "/submissions",
            post(submission_cmds::add_submission)
                .route_layer(lock_guard)
                // Listing needs service auth only
                .get(submission_cmds::list_submissions),
        )
        .route(
            "/admin/application-lock",
            delete(lock_cmds::admin_release_lock),
        )
        .route("/application-locks", delete(lock_cmds::release_owner_locks))
        .route_layer(middleware::from_fn_with_state(
            state.service_auth.clone(),
            require_service_auth,
        ));

    Router::new()
        .route("/health", get(health_cmds::health))
        .merge(api)
        // Enforced while `JsonBody` buffers, so oversize bodies get the JSON 413
        .layer(DefaultBodyLimit::max(extract::MAX_BODY_BYTES))
        .with_state(state)
}
