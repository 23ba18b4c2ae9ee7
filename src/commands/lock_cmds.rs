use super::extract::{require_non_blank, QueryParams};
use super::AppState;
use crate::database::models::ScopeKey;
use crate::services::lock::token::LOCK_RELEASE_HEADER;
use crate::types::errors::{ApiError, ApiResult};
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AdminReleaseQuery {
    pub sbi: String,
    pub owner_id: String,
    pub grant_code: String,
    pub grant_version: i64,
}

/// Operator release of one lock, on behalf of its owner.
pub async fn admin_release_lock(
    State(app): State<AppState>,
    QueryParams(query): QueryParams<AdminReleaseQuery>,
) -> ApiResult<Json<Value>> {
    require_non_blank(&[
        ("sbi", &query.sbi),
        ("ownerId", &query.owner_id),
        ("grantCode", &query.grant_code),
    ])?;
    let scope = ScopeKey::new(query.grant_code, query.grant_version, query.sbi);

    let released = app
        .release
        .release(&scope, &query.owner_id)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(Json(json!({ "success": true, "released": released })))
}

/// Drop every lock held by the owner named in the release token.
pub async fn release_owner_locks(
    State(app): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<Value>> {
    let token = headers
        .get(LOCK_RELEASE_HEADER)
        .and_then(|v| v.to_str().ok());
    let verified = app.codec.verify_release_token(token)?;

    let deleted_count = app
        .release
        .release_all_for_owner(&verified.owner_id)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(Json(json!({ "success": true, "deletedCount": deleted_count })))
}
