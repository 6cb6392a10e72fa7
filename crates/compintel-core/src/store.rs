//! Collaborator interfaces for durable state.
//!
//! The pipeline never touches storage directly: reports, the subject catalog,
//! the response cache, and the credit ledger are all reached through these
//! traits. `crate::memory` provides in-process implementations and the
//! `compintel-db` crate provides Postgres ones.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::report::{Report, ReportPatch, ReportStatus};
use crate::subjects::Subject;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    /// A compare-and-set status transition lost: the stored status was not
    /// the one the caller expected.
    #[error("report {id} is {actual}, expected {expected}")]
    StatusConflict {
        id: Uuid,
        expected: ReportStatus,
        actual: ReportStatus,
    },

    #[error("report {0} is still in progress")]
    InProgress(Uuid),

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Result of [`ReportStore::create`].
#[derive(Debug, Clone)]
pub enum CreateOutcome {
    Created(Report),
    /// A non-terminal report already existed for the subject; nothing was created.
    Existing(Report),
}

/// Durable CRUD for [`Report`] records.
#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Inserts a `pending` report unless the subject already has a
    /// non-terminal one. The check and the insert are a single atomic step.
    async fn create(&self, subject_id: &str) -> Result<CreateOutcome, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Report>, StoreError>;

    /// The subject's non-terminal report, if one exists.
    async fn find_in_progress(&self, subject_id: &str) -> Result<Option<Report>, StoreError>;

    /// Applies `patch` and moves the report from `expected` to `next` in one
    /// atomic step, overwriting the progress message. Moving to `complete`
    /// stamps `completed_at`. `expected == next` writes in place.
    ///
    /// Returns [`StoreError::StatusConflict`] when the stored status is not
    /// `expected`; the patch is then not applied.
    async fn update_status(
        &self,
        id: Uuid,
        expected: ReportStatus,
        next: ReportStatus,
        message: &str,
        patch: ReportPatch,
    ) -> Result<(), StoreError>;

    /// Deletes a terminal report. Returns `false` when no such report exists
    /// and [`StoreError::InProgress`] when it is not terminal.
    async fn delete(&self, id: Uuid) -> Result<bool, StoreError>;

    /// Most recent reports for a subject, newest first.
    async fn find_by_subject(
        &self,
        subject_id: &str,
        limit: usize,
    ) -> Result<Vec<Report>, StoreError>;

    /// Completion time of the subject's newest `complete` report.
    async fn last_completed_at(
        &self,
        subject_id: &str,
    ) -> Result<Option<DateTime<Utc>>, StoreError>;
}

/// Resolves subject identifiers to catalog attributes.
#[async_trait]
pub trait SubjectCatalog: Send + Sync {
    async fn find_subject(&self, subject_id: &str) -> Result<Option<Subject>, StoreError>;
}

/// A live (unexpired) cache value.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub value: serde_json::Value,
    pub expires_at: DateTime<Utc>,
}

/// Keyed TTL storage shared by every pipeline run.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Returns the entry only if it has not expired.
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, StoreError>;

    async fn set(&self, key: &str, value: serde_json::Value, ttl: Duration)
        -> Result<(), StoreError>;

    async fn delete(&self, key: &str) -> Result<bool, StoreError>;

    /// Unions `entries` into the JSON object stored at `key`, overwriting only
    /// the keys present in `entries`. An expired or missing entry starts from
    /// an empty object. The entry's expiry becomes the later of the existing
    /// expiry and `now + ttl`.
    async fn merge(
        &self,
        key: &str,
        entries: serde_json::Map<String, serde_json::Value>,
        ttl: Duration,
    ) -> Result<(), StoreError>;
}

/// Per-UTC-day accumulator of third-party cost units.
#[async_trait]
pub trait CreditLedger: Send + Sync {
    /// Adds `credits` to `day`'s total. Concurrent adds never lose updates.
    async fn add(&self, day: NaiveDate, credits: f64) -> Result<(), StoreError>;

    async fn total(&self, day: NaiveDate) -> Result<f64, StoreError>;
}

/// The current UTC calendar day; the credit ledger rolls over at UTC midnight.
#[must_use]
pub fn utc_today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Converts a TTL into an absolute expiry, saturating on overflow.
#[must_use]
pub fn expiry_from(now: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|d| now.checked_add_signed(d))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
