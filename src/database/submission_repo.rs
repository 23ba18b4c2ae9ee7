use super::models::{to_millis, ScopeKey, Submission, SubmissionRow};
use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

/// Fields of a new submission.
#[derive(Debug, Clone)]
pub struct NewSubmission {
    pub crn: String,
    pub scope: ScopeKey,
    pub reference_number: String,
    pub submitted_at: DateTime<Utc>,
}

/// Optional filters for listing submissions. `sbi` and `grant_code` are required.
#[derive(Debug, Clone, Default)]
pub struct SubmissionFilter {
    pub sbi: String,
    pub grant_code: String,
    pub crn: Option<String>,
    pub grant_version: Option<i64>,
    pub reference_number: Option<String>,
}

/// Append a submission. Fails with a unique violation if the scope was already submitted.
pub async fn insert_submission(
    pool: &SqlitePool,
    submission: &NewSubmission,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO grant_application_submissions
            (id, crn, sbi, grant_code, grant_version, reference_number, submitted_at, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(uuid::Uuid::new_v4().to_string())
    .bind(&submission.crn)
    .bind(&submission.scope.sbi)
    .bind(&submission.scope.grant_code)
    .bind(submission.scope.grant_version)
    .bind(&submission.reference_number)
    .bind(to_millis(submission.submitted_at))
    .bind(to_millis(Utc::now()))
    .execute(pool)
    .await?;
    Ok(())
}

/// Whether the application identified by `scope` has been submitted.
pub async fn is_submitted(pool: &SqlitePool, scope: &ScopeKey) -> Result<bool, sqlx::Error> {
    let row: (i64,) = sqlx::query_as(
        "SELECT EXISTS(
            SELECT 1 FROM grant_application_submissions
            WHERE sbi = ? AND grant_code = ? AND grant_version = ?
         )",
    )
    .bind(&scope.sbi)
    .bind(&scope.grant_code)
    .bind(scope.grant_version)
    .fetch_one(pool)
    .await?;
    Ok(row.0 != 0)
}

/// List submissions matching `filter`, newest `submitted_at` first.
pub async fn list_submissions(
    pool: &SqlitePool,
    filter: &SubmissionFilter,
) -> Result<Vec<Submission>, sqlx::Error> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT id, crn, sbi, grant_code, grant_version, reference_number, submitted_at
         FROM grant_application_submissions WHERE sbi = ",
    );
    qb.push_bind(filter.sbi.clone());
    qb.push(" AND grant_code = ").push_bind(filter.grant_code.clone());

    if let Some(crn) = &filter.crn {
        qb.push(" AND crn = ").push_bind(crn.clone());
    }
    if let Some(version) = filter.grant_version {
        qb.push(" AND grant_version = ").push_bind(version);
    }
    if let Some(reference) = &filter.reference_number {
        qb.push(" AND reference_number = ").push_bind(reference.clone());
    }
    qb.push(" ORDER BY submitted_at DESC");

    let rows = qb.build_query_as::<SubmissionRow>().fetch_all(pool).await?;
    Ok(rows.into_iter().map(Submission::from).collect())
}

#[cfg(test)]
#[path = "tests/submission_repo_tests.rs"]
mod tests;
