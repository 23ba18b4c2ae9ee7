use super::extract::{require_non_blank, JsonBody, QueryParams};
use super::AppState;
use crate::database::lock_repo::is_unique_violation;
use crate::database::models::Submission;
use crate::database::submission_repo::{self, NewSubmission, SubmissionFilter};
use crate::services::app::log_codes::{log_event, LogCode};
use crate::services::lock::GrantedLock;
use crate::types::errors::{ApiError, ApiResult, LockError};
use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AddSubmissionBody {
    pub crn: String,
    pub sbi: String,
    pub grant_code: String,
    pub grant_version: i64,
    pub reference_number: String,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SubmissionQuery {
    pub sbi: String,
    pub grant_code: String,
    pub crn: Option<String>,
    pub grant_version: Option<i64>,
    pub reference_number: Option<String>,
}

/// Record a submission, then drop the submitter's edit lock.
pub async fn add_submission(
    State(app): State<AppState>,
    Extension(granted): Extension<GrantedLock>,
    JsonBody(body): JsonBody<AddSubmissionBody>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    require_non_blank(&[
        ("crn", &body.crn),
        ("sbi", &body.sbi),
        ("grantCode", &body.grant_code),
        ("referenceNumber", &body.reference_number),
    ])?;
    let scope = granted.authorize(&body.sbi, &body.grant_code, Some(body.grant_version))?;

    let submission = NewSubmission {
        crn: body.crn,
        scope: scope.clone(),
        reference_number: body.reference_number,
        submitted_at: body.submitted_at,
    };

    if let Err(e) = submission_repo::insert_submission(&app.pool, &submission).await {
        if is_unique_violation(&e) {
            return Err(LockError::AlreadySubmitted.into());
        }
        log_event(
            LogCode::SubmissionFailed,
            &[
                ("operation", &"add"),
                ("scope", &scope),
                ("crn", &submission.crn),
                ("referenceNumber", &submission.reference_number),
                ("error", &e),
            ],
        );
        return Err(ApiError::Internal(e.to_string()));
    }

    // The submission stands even if this fails; the lease then just runs out.
    if let Err(e) = app.release.release(&scope, &granted.owner_id).await {
        log::debug!("Lock left to expire after submission of {scope}: {e}");
    }

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "created": true })),
    ))
}

/// List submissions for a business and grant, newest first.
pub async fn list_submissions(
    State(app): State<AppState>,
    QueryParams(query): QueryParams<SubmissionQuery>,
) -> ApiResult<Json<Vec<Submission>>> {
    require_non_blank(&[("sbi", &query.sbi), ("grantCode", &query.grant_code)])?;

    let filter = SubmissionFilter {
        sbi: query.sbi,
        grant_code: query.grant_code,
        crn: query.crn,
        grant_version: query.grant_version,
        reference_number: query.reference_number,
    };

    submission_repo::list_submissions(&app.pool, &filter)
        .await
        .map(Json)
        .map_err(|e| {
            log_event(
                LogCode::SubmissionFailed,
                &[
                    ("operation", &"retrieve"),
                    ("sbi", &filter.sbi),
                    ("grantCode", &filter.grant_code),
                    ("error", &e),
                ],
            );
            ApiError::Internal(e.to_string())
        })
}
