use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies one lockable application draft.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeKey {
    pub grant_code: String,
    pub grant_version: i64,
    pub sbi: String,
}

impl ScopeKey {
    pub fn new(grant_code: impl Into<String>, grant_version: i64, sbi: impl Into<String>) -> Self {
        Self {
            grant_code: grant_code.into(),
            grant_version,
            sbi: sbi.into(),
        }
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "grantCode={} | grantVersion={} | sbi={}",
            self.grant_code, self.grant_version, self.sbi
        )
    }
}

/// Raw `application_locks` row. Timestamps are epoch milliseconds.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LockRow {
    pub grant_code: String,
    pub grant_version: i64,
    pub sbi: String,
    pub owner_id: String,
    pub locked_at: i64,
    pub expires_at: i64,
}

/// An edit lock as seen by the rest of the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LockRecord {
    pub grant_code: String,
    pub grant_version: i64,
    pub sbi: String,
    pub owner_id: String,
    pub locked_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl LockRecord {
    pub fn scope(&self) -> ScopeKey {
        ScopeKey::new(self.grant_code.clone(), self.grant_version, self.sbi.clone())
    }

    /// A lock is active strictly before its deadline.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

impl From<LockRow> for LockRecord {
    fn from(row: LockRow) -> Self {
        Self {
            grant_code: row.grant_code,
            grant_version: row.grant_version,
            sbi: row.sbi,
            owner_id: row.owner_id,
            locked_at: from_millis(row.locked_at),
            expires_at: from_millis(row.expires_at),
        }
    }
}

/// Raw `grant_application_submissions` row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SubmissionRow {
    pub id: String,
    pub crn: String,
    pub sbi: String,
    pub grant_code: String,
    pub grant_version: i64,
    pub reference_number: String,
    pub submitted_at: i64,
}

/// A submitted application, as returned by `GET /submissions`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: String,
    pub crn: String,
    pub sbi: String,
    pub grant_code: String,
    pub grant_version: i64,
    pub reference_number: String,
    pub submitted_at: DateTime<Utc>,
}

impl From<SubmissionRow> for Submission {
    fn from(row: SubmissionRow) -> Self {
        Self {
            id: row.id,
            crn: row.crn,
            sbi: row.sbi,
            grant_code: row.grant_code,
            grant_version: row.grant_version,
            reference_number: row.reference_number,
            submitted_at: from_millis(row.submitted_at),
        }
    }
}

pub fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

pub fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(ms).unwrap_or_default()
}

#[cfg(test)]
#[path = "tests/models_tests.rs"]
mod tests;
