//! Per-request lock enforcement.
//!
//! The HTTP layer reduces a request to a [`LockRequestContext`]; the
//! [`LockEnforcer`] turns that into a [`GrantedLock`] or a [`LockError`]:
//!
//! 1. verify the owner token;
//! 2. submitted applications are read-only: writes are refused, reads pass
//!    without touching the lock table;
//! 3. otherwise acquire or refresh the lease (reads may only check it,
//!    depending on [`ReadLockPolicy`]).

use super::acquire::{AcquireOutcome, LockAcquisitionService};
use super::token::{LockTokenCodec, LOCK_OWNER_HEADER};
use crate::database::models::{LockRecord, ScopeKey};
use crate::database::{lock_repo, submission_repo};
use crate::services::app::log_codes::{log_event, LogCode};
use crate::types::errors::LockError;
use axum::extract::{Request, State};
use axum::http::{HeaderMap, Method};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use sqlx::SqlitePool;
use std::sync::Arc;

/// How read-only requests interact with the lease.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadLockPolicy {
    /// Reads acquire or refresh the lock exactly like writes.
    #[default]
    AcquireOrRefresh,
    /// Reads are refused on a foreign active lock but never create or extend one.
    CheckOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Read,
    Mutating,
}

impl RequestKind {
    pub fn from_method(method: &Method) -> Self {
        if method == Method::GET || method == Method::HEAD || method == Method::OPTIONS {
            Self::Read
        } else {
            Self::Mutating
        }
    }
}

/// Everything lock enforcement needs to know about a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockRequestContext {
    pub kind: RequestKind,
    pub owner_token: Option<String>,
}

impl LockRequestContext {
    pub fn from_parts(method: &Method, headers: &HeaderMap) -> Self {
        // Undecodable bytes still count as a presented token, which then fails verification
        let owner_token = headers
            .get(LOCK_OWNER_HEADER)
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned());

        Self {
            kind: RequestKind::from_method(method),
            owner_token,
        }
    }
}

/// Proof that a request passed enforcement, attached to the request for handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantedLock {
    pub owner_id: String,
    pub scope: ScopeKey,
    /// The lease now held, if one was taken or refreshed.
    pub lock: Option<LockRecord>,
    /// The application is submitted and therefore read-only.
    pub submitted: bool,
}

impl GrantedLock {
    /// Check that the application a handler is about to touch is the one the
    /// token was granted for. An omitted version means the granted one.
    pub fn authorize(
        &self,
        sbi: &str,
        grant_code: &str,
        grant_version: Option<i64>,
    ) -> Result<ScopeKey, LockError> {
        let version = grant_version.unwrap_or(self.scope.grant_version);
        if sbi != self.scope.sbi
            || grant_code != self.scope.grant_code
            || version != self.scope.grant_version
        {
            return Err(LockError::ScopeMismatch);
        }
        Ok(self.scope.clone())
    }
}

pub struct LockEnforcer {
    codec: Arc<LockTokenCodec>,
    acquisition: LockAcquisitionService,
    pool: SqlitePool,
    read_policy: ReadLockPolicy,
}

impl LockEnforcer {
    pub fn new(
        codec: Arc<LockTokenCodec>,
        acquisition: LockAcquisitionService,
        pool: SqlitePool,
        read_policy: ReadLockPolicy,
    ) -> Self {
        Self {
            codec,
            acquisition,
            pool,
            read_policy,
        }
    }

    pub async fn evaluate(&self, ctx: &LockRequestContext) -> Result<GrantedLock, LockError> {
        let verified = self.codec.verify_owner_token(ctx.owner_token.as_deref())?;
        let scope = verified.scope;
        let owner_id = verified.owner_id;

        let submitted = submission_repo::is_submitted(&self.pool, &scope)
            .await
            .inspect_err(|e| {
                let code = lock_repo::driver_error_code(e).unwrap_or_else(|| "none".into());
                log_event(
                    LogCode::LockAcquireFailed,
                    &[
                        ("operation", &"submission_check"),
                        ("scope", &scope),
                        ("ownerId", &owner_id),
                        ("code", &code),
                        ("error", e),
                    ],
                )
            })?;

        if submitted {
            return match ctx.kind {
                RequestKind::Mutating => Err(LockError::AlreadySubmitted),
                RequestKind::Read => Ok(GrantedLock {
                    owner_id,
                    scope,
                    lock: None,
                    submitted: true,
                }),
            };
        }

        if ctx.kind == RequestKind::Read && self.read_policy == ReadLockPolicy::CheckOnly {
            return self.check_only(scope, owner_id).await;
        }

        match self.acquisition.acquire_or_refresh(&scope, &owner_id).await? {
            AcquireOutcome::Acquired(lock) => Ok(GrantedLock {
                owner_id,
                scope,
                lock: Some(lock),
                submitted: false,
            }),
            AcquireOutcome::Conflict => Err(LockError::LockConflict),
        }
    }

    async fn check_only(&self, scope: ScopeKey, owner_id: String) -> Result<GrantedLock, LockError> {
        let active = self.acquisition.active_lock(&scope).await.inspect_err(|e| {
            let code = lock_repo::driver_error_code(e).unwrap_or_else(|| "none".into());
            log_event(
                LogCode::LockAcquireFailed,
                &[
                    ("operation", &"check_only"),
                    ("scope", &scope),
                    ("ownerId", &owner_id),
                    ("code", &code),
                    ("error", e),
                ],
            )
        })?;
        match active {
            Some(lock) if lock.owner_id != owner_id => {
                log_event(
                    LogCode::LockConflict,
                    &[("scope", &scope), ("ownerId", &owner_id), ("read", &true)],
                );
                Err(LockError::LockConflict)
            }
            lock => Ok(GrantedLock {
                owner_id,
                scope,
                lock,
                submitted: false,
            }),
        }
    }
}

/// Axum middleware guarding lock-protected routes.
pub async fn enforce_application_lock(
    State(enforcer): State<Arc<LockEnforcer>>,
    mut request: Request,
    next: Next,
) -> Response {
    let ctx = LockRequestContext::from_parts(request.method(), request.headers());

    match enforcer.evaluate(&ctx).await {
        Ok(granted) => {
            request.extensions_mut().insert(granted);
            next.run(request).await
        }
        Err(err) => err.into_response(),
    }
}

#[cfg(test)]
#[path = "tests/enforcement_tests.rs"]
mod tests;
