//! [`PgStore`]: the Postgres implementation of every storage trait.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use compintel_core::{
    expiry_from, CacheEntry, CacheStore, CreateOutcome, CreditLedger, Report, ReportPatch,
    ReportStatus, ReportStore, StoreError, Subject, SubjectCatalog,
};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{cache, credits, reports, subjects};

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl ReportStore for PgStore {
    async fn create(&self, subject_id: &str) -> Result<CreateOutcome, StoreError> {
        if let Some(report) = reports::insert_report_if_absent(&self.pool, subject_id).await? {
            return Ok(CreateOutcome::Created(report));
        }
        // The conflicting row can finish between the insert and this read; the
        // retry insert then succeeds.
        match reports::get_in_progress_report(&self.pool, subject_id).await? {
            Some(existing) => Ok(CreateOutcome::Existing(existing)),
            None => reports::insert_report_if_absent(&self.pool, subject_id)
                .await?
                .map(CreateOutcome::Created)
                .ok_or_else(|| {
                    StoreError::Backend(format!(
                        "could not create or locate in-flight report for {subject_id}"
                    ))
                }),
        }
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Report>, StoreError> {
        Ok(reports::get_report(&self.pool, id).await?)
    }

    async fn find_in_progress(&self, subject_id: &str) -> Result<Option<Report>, StoreError> {
        Ok(reports::get_in_progress_report(&self.pool, subject_id).await?)
    }

    async fn update_status(
        &self,
        id: Uuid,
        expected: ReportStatus,
        next: ReportStatus,
        message: &str,
        patch: ReportPatch,
    ) -> Result<(), StoreError> {
        match reports::transition_report_status(&self.pool, id, expected, next, message, patch)
            .await?
        {
            None => Ok(()),
            Some(actual) => Err(StoreError::StatusConflict {
                id,
                expected,
                actual,
            }),
        }
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        match reports::delete_terminal_report(&self.pool, id).await? {
            reports::DeleteOutcome::Deleted => Ok(true),
            reports::DeleteOutcome::Missing => Ok(false),
            reports::DeleteOutcome::InProgress => Err(StoreError::InProgress(id)),
        }
    }

    async fn find_by_subject(
        &self,
        subject_id: &str,
        limit: usize,
    ) -> Result<Vec<Report>, StoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        Ok(reports::list_reports_for_subject(&self.pool, subject_id, limit).await?)
    }

    async fn last_completed_at(
        &self,
        subject_id: &str,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        Ok(reports::last_completed_at(&self.pool, subject_id).await?)
    }
}

#[async_trait]
impl SubjectCatalog for PgStore {
    async fn find_subject(&self, subject_id: &str) -> Result<Option<Subject>, StoreError> {
        Ok(subjects::get_subject(&self.pool, subject_id).await?)
    }
}

#[async_trait]
impl CacheStore for PgStore {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, StoreError> {
        Ok(cache::get_cache_entry(&self.pool, key).await?)
    }

    async fn set(
        &self,
        key: &str,
        value: serde_json::Value,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let expires_at = expiry_from(Utc::now(), ttl);
        Ok(cache::set_cache_entry(&self.pool, key, &value, expires_at).await?)
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        Ok(cache::delete_cache_entry(&self.pool, key).await?)
    }

    async fn merge(
        &self,
        key: &str,
        entries: serde_json::Map<String, serde_json::Value>,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let expires_at = expiry_from(Utc::now(), ttl);
        Ok(cache::merge_cache_entry(&self.pool, key, entries, expires_at).await?)
    }
}

#[async_trait]
impl CreditLedger for PgStore {
    async fn add(&self, day: NaiveDate, credits: f64) -> Result<(), StoreError> {
        Ok(credits::add_credits(&self.pool, day, credits).await?)
    }

    async fn total(&self, day: NaiveDate) -> Result<f64, StoreError> {
        Ok(credits::credits_for_day(&self.pool, day).await?)
    }
}
