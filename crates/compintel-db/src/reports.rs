//! Database operations for `reports`.

use chrono::{DateTime, Utc};
use compintel_core::{
    AnalysisResult, ErrorDetails, ExtractedPage, Report, ReportPatch, ReportStatus, SearchHit,
};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

const REPORT_COLUMNS: &str = "id, subject_id, status, progress_message, search_query, \
     competitor_data, selected_urls, extracted_content, analysis_result, error_details, \
     created_at, updated_at, completed_at";

/// A row from the `reports` table. Structured columns are JSONB and decode
/// straight into their domain types.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ReportRow {
    pub id: Uuid,
    pub subject_id: String,
    pub status: String,
    pub progress_message: String,
    pub search_query: Option<String>,
    pub competitor_data: Json<Vec<SearchHit>>,
    pub selected_urls: Json<Vec<String>>,
    pub extracted_content: Json<Vec<ExtractedPage>>,
    pub analysis_result: Option<Json<AnalysisResult>>,
    pub error_details: Json<ErrorDetails>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<ReportRow> for Report {
    type Error = DbError;

    fn try_from(row: ReportRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<ReportStatus>()
            .map_err(|e| DbError::InvalidValue {
                column: "status",
                reason: e.to_string(),
            })?;

        Ok(Report {
            id: row.id,
            subject_id: row.subject_id,
            status,
            progress_message: row.progress_message,
            search_query: row.search_query,
            competitor_data: row.competitor_data.0,
            selected_urls: row.selected_urls.0,
            extracted_content: row.extracted_content.0,
            analysis_result: row.analysis_result.map(|j| j.0),
            error_details: row.error_details.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
            completed_at: row.completed_at,
        })
    }
}

/// Inserts a `pending` report unless the subject already has one in flight.
///
/// Returns `None` when the partial unique index rejected the insert.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails for any other reason.
pub async fn insert_report_if_absent(
    pool: &PgPool,
    subject_id: &str,
) -> Result<Option<Report>, DbError> {
    let row = sqlx::query_as::<_, ReportRow>(&format!(
        "INSERT INTO reports (id, subject_id, status, progress_message) \
         VALUES ($1, $2, 'pending', 'Queued') \
         ON CONFLICT (subject_id) WHERE status NOT IN ('complete', 'failed') DO NOTHING \
         RETURNING {REPORT_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(subject_id)
    .fetch_optional(pool)
    .await?;

    row.map(Report::try_from).transpose()
}

/// Fetches a report by id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_report(pool: &PgPool, id: Uuid) -> Result<Option<Report>, DbError> {
    let row = sqlx::query_as::<_, ReportRow>(&format!(
        "SELECT {REPORT_COLUMNS} FROM reports WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.map(Report::try_from).transpose()
}

/// Fetches the subject's non-terminal report, if any.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_in_progress_report(
    pool: &PgPool,
    subject_id: &str,
) -> Result<Option<Report>, DbError> {
    let row = sqlx::query_as::<_, ReportRow>(&format!(
        "SELECT {REPORT_COLUMNS} FROM reports \
         WHERE subject_id = $1 AND status NOT IN ('complete', 'failed') \
         ORDER BY created_at DESC \
         LIMIT 1"
    ))
    .bind(subject_id)
    .fetch_optional(pool)
    .await?;

    row.map(Report::try_from).transpose()
}

/// Compare-and-set status transition that also applies the populated fields
/// of `patch`. Unset fields keep their value. Nothing is written when the
/// stored status is not `expected`.
///
/// Returns `Ok(None)` when the row moved, or `Ok(Some(actual))` with the
/// stored status when it was not `expected`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no report has `id`, or [`DbError::Sqlx`]
/// if the update fails.
pub async fn transition_report_status(
    pool: &PgPool,
    id: Uuid,
    expected: ReportStatus,
    next: ReportStatus,
    message: &str,
    patch: ReportPatch,
) -> Result<Option<ReportStatus>, DbError> {
    let result = sqlx::query(
        "UPDATE reports SET \
             status            = $3, \
             progress_message  = $4, \
             search_query      = COALESCE($5, search_query), \
             competitor_data   = COALESCE($6, competitor_data), \
             selected_urls     = COALESCE($7, selected_urls), \
             extracted_content = COALESCE($8, extracted_content), \
             analysis_result   = COALESCE($9, analysis_result), \
             error_details     = COALESCE($10, error_details), \
             updated_at        = NOW(), \
             completed_at      = CASE WHEN $3 = 'complete' THEN NOW() ELSE completed_at END \
         WHERE id = $1 AND status = $2",
    )
    .bind(id)
    .bind(expected.as_str())
    .bind(next.as_str())
    .bind(message)
    .bind(patch.search_query)
    .bind(patch.competitor_data.map(Json))
    .bind(patch.selected_urls.map(Json))
    .bind(patch.extracted_content.map(Json))
    .bind(patch.analysis_result.map(Json))
    .bind(patch.error_details.map(Json))
    .execute(pool)
    .await?;

    if result.rows_affected() > 0 {
        return Ok(None);
    }

    let actual: Option<String> = sqlx::query_scalar("SELECT status FROM reports WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    let actual = actual.ok_or(DbError::NotFound)?;
    let actual = actual
        .parse::<ReportStatus>()
        .map_err(|e| DbError::InvalidValue {
            column: "status",
            reason: e.to_string(),
        })?;
    Ok(Some(actual))
}

/// Outcome of [`delete_terminal_report`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    Missing,
    InProgress,
}

/// Deletes a report only if it is `complete` or `failed`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the delete fails.
pub async fn delete_terminal_report(pool: &PgPool, id: Uuid) -> Result<DeleteOutcome, DbError> {
    let result =
        sqlx::query("DELETE FROM reports WHERE id = $1 AND status IN ('complete', 'failed')")
            .bind(id)
            .execute(pool)
            .await?;

    if result.rows_affected() > 0 {
        return Ok(DeleteOutcome::Deleted);
    }

    let exists: Option<Uuid> = sqlx::query_scalar("SELECT id FROM reports WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(if exists.is_some() {
        DeleteOutcome::InProgress
    } else {
        DeleteOutcome::Missing
    })
}

/// Returns the most recent `limit` reports for a subject, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_reports_for_subject(
    pool: &PgPool,
    subject_id: &str,
    limit: i64,
) -> Result<Vec<Report>, DbError> {
    let rows = sqlx::query_as::<_, ReportRow>(&format!(
        "SELECT {REPORT_COLUMNS} FROM reports \
         WHERE subject_id = $1 \
         ORDER BY created_at DESC, id DESC \
         LIMIT $2"
    ))
    .bind(subject_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(Report::try_from).collect()
}

/// Completion time of the subject's newest `complete` report.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn last_completed_at(
    pool: &PgPool,
    subject_id: &str,
) -> Result<Option<DateTime<Utc>>, DbError> {
    let last: Option<DateTime<Utc>> = sqlx::query_scalar(
        "SELECT MAX(completed_at) FROM reports \
         WHERE subject_id = $1 AND status = 'complete'",
    )
    .bind(subject_id)
    .fetch_one(pool)
    .await?;

    Ok(last)
}
