use super::extract::{require_non_blank, JsonBody, QueryParams};
use super::AppState;
use crate::database::models::ScopeKey;
use crate::database::state_repo::{self, SaveOutcome};
use crate::services::app::log_codes::{log_event, LogCode};
use crate::services::lock::GrantedLock;
use crate::types::errors::{ApiError, ApiResult};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::{json, Map, Value};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateQuery {
    pub sbi: String,
    pub grant_code: String,
    pub grant_version: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveStateBody {
    pub sbi: String,
    pub grant_code: String,
    pub grant_version: i64,
    pub state: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchStateBody {
    pub state: Map<String, Value>,
    #[serde(default)]
    pub grant_version: Option<i64>,
}

pub async fn get_state(
    State(app): State<AppState>,
    Extension(granted): Extension<GrantedLock>,
    QueryParams(query): QueryParams<StateQuery>,
) -> ApiResult<Json<Value>> {
    let scope = authorize_query(&granted, &query)?;

    state_repo::get_state(&app.pool, &scope)
        .await
        .map_err(|e| state_failure("get", &scope, e))?
        .map(Json)
        .ok_or(ApiError::NotFound("State not found"))
}

pub async fn save_state(
    State(app): State<AppState>,
    Extension(granted): Extension<GrantedLock>,
    JsonBody(body): JsonBody<SaveStateBody>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    require_non_blank(&[("sbi", &body.sbi), ("grantCode", &body.grant_code)])?;
    let scope = granted.authorize(&body.sbi, &body.grant_code, Some(body.grant_version))?;

    let outcome = state_repo::save_state(&app.pool, &scope, &Value::Object(body.state))
        .await
        .map_err(|e| state_failure("save", &scope, e))?;

    Ok(match outcome {
        SaveOutcome::Created => (
            StatusCode::CREATED,
            Json(json!({ "success": true, "created": true })),
        ),
        SaveOutcome::Updated => (
            StatusCode::OK,
            Json(json!({ "success": true, "updated": true })),
        ),
    })
}

pub async fn patch_state(
    State(app): State<AppState>,
    Extension(granted): Extension<GrantedLock>,
    Path((sbi, grant_code)): Path<(String, String)>,
    JsonBody(body): JsonBody<PatchStateBody>,
) -> ApiResult<Json<Value>> {
    let scope = granted.authorize(&sbi, &grant_code, body.grant_version)?;

    let patched = state_repo::patch_state(&app.pool, &scope, &body.state)
        .await
        .map_err(|e| state_failure("patch", &scope, e))?;

    if !patched {
        return Err(ApiError::NotFound("State not found"));
    }
    Ok(Json(json!({ "success": true, "patched": true })))
}

pub async fn delete_state(
    State(app): State<AppState>,
    Extension(granted): Extension<GrantedLock>,
    QueryParams(query): QueryParams<StateQuery>,
) -> ApiResult<Json<Value>> {
    let scope = authorize_query(&granted, &query)?;

    let deleted = state_repo::delete_state(&app.pool, &scope)
        .await
        .map_err(|e| state_failure("delete", &scope, e))?;

    if !deleted {
        return Err(ApiError::NotFound("State not found"));
    }
    Ok(Json(json!({ "success": true, "deleted": true })))
}

fn authorize_query(granted: &GrantedLock, query: &StateQuery) -> ApiResult<ScopeKey> {
    require_non_blank(&[("sbi", &query.sbi), ("grantCode", &query.grant_code)])?;
    Ok(granted.authorize(&query.sbi, &query.grant_code, query.grant_version)?)
}

fn state_failure(operation: &str, scope: &ScopeKey, err: sqlx::Error) -> ApiError {
    log_event(
        LogCode::StateFailed,
        &[("operation", &operation), ("scope", scope), ("error", &err)],
    );
    ApiError::Internal(err.to_string())
}
