//! Request extractors that reject with the service's JSON error body.

use crate::services::app::log_codes::{log_event, LogCode};
use crate::types::errors::ApiError;
use axum::body::Bytes;
use axum::extract::{FromRequest, FromRequestParts, Query, Request};
use axum::http::request::Parts;
use axum::http::StatusCode;
use serde::de::DeserializeOwned;

/// Hard cap on request bodies.
pub const MAX_BODY_BYTES: usize = 1_048_576;
/// Bodies above this size are logged as approaching the cap.
pub const PAYLOAD_WARN_BYTES: usize = 500_000;

/// JSON body. Malformed or oversized payloads become `400`/`413` error bodies.
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let path = req.uri().path().to_owned();

        let bytes = Bytes::from_request(req, state).await.map_err(|rejection| {
            if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
                ApiError::PayloadTooLarge
            } else {
                ApiError::BadRequest(rejection.body_text())
            }
        })?;

        warn_if_large(&path, bytes.len());

        serde_json::from_slice(&bytes)
            .map(JsonBody)
            .map_err(|e| ApiError::BadRequest(format!("Invalid request payload: {e}")))
    }
}

/// Query string parameters.
pub struct QueryParams<T>(pub T);

impl<S, T> FromRequestParts<S> for QueryParams<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Query::<T>::try_from_uri(&parts.uri)
            .map(|Query(value)| QueryParams(value))
            .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
    }
}

/// Reject blank required strings; serde already rejects missing ones.
pub fn require_non_blank(fields: &[(&str, &str)]) -> Result<(), ApiError> {
    match fields.iter().find(|(_, value)| value.trim().is_empty()) {
        Some((name, _)) => Err(ApiError::BadRequest(format!("\"{name}\" is not allowed to be empty"))),
        None => Ok(()),
    }
}

fn warn_if_large(path: &str, size: usize) {
    if size > PAYLOAD_WARN_BYTES && size <= MAX_BODY_BYTES {
        log_event(
            LogCode::PayloadSizeWarning,
            &[
                ("size", &size),
                ("threshold", &PAYLOAD_WARN_BYTES),
                ("max", &MAX_BODY_BYTES),
                ("path", &path),
            ],
        );
    }
}
