//! Signed capability tokens for application locks.
//!
//! Two kinds are issued by the frontend and verified here:
//! - owner tokens (`typ = "lock"`) name the user and the application scope
//!   a request wants to edit;
//! - release tokens (`typ = "lock-release"`) let a user drop every lock they
//!   hold, typically on sign-out.
//!
//! Both are HS256 JWTs with a pinned issuer and audience. Verification only
//! proves who is asking and for what; lock ownership is decided by the store.

use crate::database::models::ScopeKey;
use crate::types::errors::LockError;
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const LOCK_ISSUER: &str = "grants-ui";
pub const LOCK_AUDIENCE: &str = "grants-backend";

pub const OWNER_TOKEN_TYPE: &str = "lock";
pub const RELEASE_TOKEN_TYPE: &str = "lock-release";

/// Header carrying an owner token.
pub const LOCK_OWNER_HEADER: &str = "x-application-lock-owner";
/// Header carrying a release token.
pub const LOCK_RELEASE_HEADER: &str = "x-application-lock-release";

const DEFAULT_GRANT_VERSION: i64 = 1;

/// Identity and scope proven by a valid owner token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedOwner {
    pub owner_id: String,
    pub scope: ScopeKey,
}

/// Identity proven by a valid release token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedRelease {
    pub owner_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OwnerClaims<'a> {
    sub: &'a str,
    sbi: &'a str,
    grant_code: &'a str,
    grant_version: i64,
    typ: &'static str,
    iss: &'static str,
    aud: &'static str,
    iat: i64,
}

#[derive(Debug, Serialize)]
struct ReleaseClaims<'a> {
    sub: &'a str,
    typ: &'static str,
    iss: &'static str,
    aud: &'static str,
    iat: i64,
}

/// Claims as they arrive. Everything is optional and loosely typed so that
/// each defect can be reported precisely.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IncomingClaims {
    #[serde(default)]
    sub: Option<Value>,
    #[serde(default)]
    sbi: Option<Value>,
    #[serde(default)]
    grant_code: Option<Value>,
    #[serde(default)]
    grant_version: Option<Value>,
    #[serde(default)]
    typ: Option<Value>,
}

/// Issues and verifies lock tokens. Holds no state beyond the signing secret.
pub struct LockTokenCodec {
    secret: SecretString,
    validation: Validation,
}

impl LockTokenCodec {
    pub fn new(secret: SecretString) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[LOCK_ISSUER]);
        validation.set_audience(&[LOCK_AUDIENCE]);
        // Tokens carry no expiry; `exp` is still honoured when present.
        validation.set_required_spec_claims(&["iss", "aud"]);
        Self { secret, validation }
    }

    pub fn issue_owner_token(
        &self,
        subject: &str,
        sbi: &str,
        grant_code: &str,
        grant_version: i64,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let claims = OwnerClaims {
            sub: subject,
            sbi,
            grant_code,
            grant_version,
            typ: OWNER_TOKEN_TYPE,
            iss: LOCK_ISSUER,
            aud: LOCK_AUDIENCE,
            iat: Utc::now().timestamp(),
        };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key())
    }

    pub fn issue_release_token(&self, subject: &str) -> Result<String, jsonwebtoken::errors::Error> {
        let claims = ReleaseClaims {
            sub: subject,
            typ: RELEASE_TOKEN_TYPE,
            iss: LOCK_ISSUER,
            aud: LOCK_AUDIENCE,
            iat: Utc::now().timestamp(),
        };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key())
    }

    /// Verify an owner token and extract the scope it grants.
    pub fn verify_owner_token(&self, token: Option<&str>) -> Result<VerifiedOwner, LockError> {
        let claims = self.decode(token)?;

        if claim_str(claims.typ.as_ref()).as_deref() != Some(OWNER_TOKEN_TYPE) {
            return Err(LockError::TokenWrongType);
        }

        let owner_id = claim_str(claims.sub.as_ref()).ok_or(LockError::MissingIdentity)?;
        let sbi = claim_str(claims.sbi.as_ref()).ok_or(LockError::MissingScopeClaim("sbi"))?;
        let grant_code = claim_str(claims.grant_code.as_ref())
            .ok_or(LockError::MissingScopeClaim("grantCode"))?;
        let grant_version = coerce_version(claims.grant_version.as_ref())?;

        Ok(VerifiedOwner {
            owner_id,
            scope: ScopeKey::new(grant_code, grant_version, sbi),
        })
    }

    /// Verify a release token and extract the owner whose locks may be dropped.
    pub fn verify_release_token(&self, token: Option<&str>) -> Result<VerifiedRelease, LockError> {
        let claims = self.decode(token)?;

        if claim_str(claims.typ.as_ref()).as_deref() != Some(RELEASE_TOKEN_TYPE) {
            return Err(LockError::TokenWrongType);
        }

        let owner_id = claim_str(claims.sub.as_ref()).ok_or(LockError::MissingIdentity)?;
        Ok(VerifiedRelease { owner_id })
    }

    fn decode(&self, token: Option<&str>) -> Result<IncomingClaims, LockError> {
        let token = token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(LockError::TokenMissing)?;

        let key = DecodingKey::from_secret(self.secret.expose_secret().as_bytes());
        jsonwebtoken::decode::<IncomingClaims>(token, &key, &self.validation)
            .map(|data| data.claims)
            .map_err(|err| {
                log::debug!("Lock token rejected: {err}");
                LockError::TokenInvalid
            })
    }

    fn encoding_key(&self) -> EncodingKey {
        EncodingKey::from_secret(self.secret.expose_secret().as_bytes())
    }
}

/// A non-blank string claim. Numbers are accepted and rendered as strings.
fn claim_str(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// `grantVersion` must be a non-negative integer. Absent or null means 1;
/// numeric strings such as `"3"` are accepted.
fn coerce_version(value: Option<&Value>) -> Result<i64, LockError> {
    let parsed = match value {
        None | Some(Value::Null) => return Ok(DEFAULT_GRANT_VERSION),
        Some(Value::Number(n)) => n.as_i64().or_else(|| integral(n.as_f64()?)),
        Some(Value::String(s)) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| integral(s.parse::<f64>().ok()?))
        }
        Some(_) => None,
    };

    parsed
        .filter(|v| *v >= 0)
        .ok_or(LockError::InvalidVersionClaim)
}

fn integral(f: f64) -> Option<i64> {
    (f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64).then_some(f as i64)
}

#[cfg(test)]
#[path = "tests/token_tests.rs"]
mod tests;
