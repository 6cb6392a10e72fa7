//! In-process implementations of the storage traits.
//!
//! Used by tests and by single-process deployments that do not need to
//! survive a restart. Each store guards its state with one mutex, which makes
//! `create`, `merge`, and `add` atomic.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::report::{Report, ReportPatch, ReportStatus};
use crate::store::{
    expiry_from, CacheEntry, CacheStore, CreateOutcome, CreditLedger, ReportStore, StoreError,
    SubjectCatalog,
};
use crate::subjects::Subject;

#[derive(Debug, Default)]
pub struct MemoryReportStore {
    reports: Mutex<HashMap<Uuid, Report>>,
}

impl MemoryReportStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored reports, any status.
    pub async fn len(&self) -> usize {
        self.reports.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.reports.lock().await.is_empty()
    }

    /// Inserts a report as-is. Lets tests seed historical runs.
    pub async fn insert(&self, report: Report) {
        self.reports.lock().await.insert(report.id, report);
    }
}

#[async_trait]
impl ReportStore for MemoryReportStore {
    async fn create(&self, subject_id: &str) -> Result<CreateOutcome, StoreError> {
        let mut reports = self.reports.lock().await;
        if let Some(existing) = reports
            .values()
            .find(|r| r.subject_id == subject_id && !r.status.is_terminal())
        {
            return Ok(CreateOutcome::Existing(existing.clone()));
        }
        let report = Report::new(subject_id);
        reports.insert(report.id, report.clone());
        Ok(CreateOutcome::Created(report))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Report>, StoreError> {
        Ok(self.reports.lock().await.get(&id).cloned())
    }

    async fn find_in_progress(&self, subject_id: &str) -> Result<Option<Report>, StoreError> {
        Ok(self
            .reports
            .lock()
            .await
            .values()
            .find(|r| r.subject_id == subject_id && !r.status.is_terminal())
            .cloned())
    }

    async fn update_status(
        &self,
        id: Uuid,
        expected: ReportStatus,
        next: ReportStatus,
        message: &str,
        patch: ReportPatch,
    ) -> Result<(), StoreError> {
        let mut reports = self.reports.lock().await;
        let report = reports.get_mut(&id).ok_or(StoreError::NotFound)?;
        if report.status != expected {
            return Err(StoreError::StatusConflict {
                id,
                expected,
                actual: report.status,
            });
        }
        patch.apply(report);
        report.status = next;
        report.progress_message = message.to_string();
        if next == ReportStatus::Complete {
            report.completed_at = Some(report.updated_at);
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut reports = self.reports.lock().await;
        match reports.get(&id) {
            None => Ok(false),
            Some(r) if !r.status.is_terminal() => Err(StoreError::InProgress(id)),
            Some(_) => Ok(reports.remove(&id).is_some()),
        }
    }

    async fn find_by_subject(
        &self,
        subject_id: &str,
        limit: usize,
    ) -> Result<Vec<Report>, StoreError> {
        let reports = self.reports.lock().await;
        let mut matching: Vec<Report> = reports
            .values()
            .filter(|r| r.subject_id == subject_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matching.truncate(limit);
        Ok(matching)
    }

    async fn last_completed_at(
        &self,
        subject_id: &str,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        Ok(self
            .reports
            .lock()
            .await
            .values()
            .filter(|r| r.subject_id == subject_id && r.status == ReportStatus::Complete)
            .filter_map(|r| r.completed_at)
            .max())
    }
}

#[derive(Debug, Default)]
pub struct MemorySubjectCatalog {
    subjects: Mutex<HashMap<String, Subject>>,
}

impl MemorySubjectCatalog {
    #[must_use]
    pub fn new(subjects: impl IntoIterator<Item = Subject>) -> Self {
        Self {
            subjects: Mutex::new(subjects.into_iter().map(|s| (s.id.clone(), s)).collect()),
        }
    }
}

#[async_trait]
impl SubjectCatalog for MemorySubjectCatalog {
    async fn find_subject(&self, subject_id: &str) -> Result<Option<Subject>, StoreError> {
        Ok(self.subjects.lock().await.get(subject_id).cloned())
    }
}

#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl MemoryCacheStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, StoreError> {
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some(entry) if entry.expires_at > Utc::now() => Ok(Some(entry.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(
        &self,
        key: &str,
        value: serde_json::Value,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let expires_at = expiry_from(Utc::now(), ttl);
        self.entries
            .lock()
            .await
            .insert(key.to_string(), CacheEntry { value, expires_at });
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.entries.lock().await.remove(key).is_some())
    }

    async fn merge(
        &self,
        key: &str,
        new_entries: serde_json::Map<String, serde_json::Value>,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let now = Utc::now();
        let expires_at = expiry_from(now, ttl);
        let mut entries = self.entries.lock().await;

        let (mut map, existing_expiry) = match entries.remove(key) {
            Some(CacheEntry {
                value: serde_json::Value::Object(map),
                expires_at,
            }) if expires_at > now => (map, Some(expires_at)),
            _ => (serde_json::Map::new(), None),
        };
        map.extend(new_entries);

        let expires_at = existing_expiry.map_or(expires_at, |e| e.max(expires_at));
        entries.insert(
            key.to_string(),
            CacheEntry {
                value: serde_json::Value::Object(map),
                expires_at,
            },
        );
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryCreditLedger {
    days: Mutex<HashMap<NaiveDate, f64>>,
}

impl MemoryCreditLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CreditLedger for MemoryCreditLedger {
    async fn add(&self, day: NaiveDate, credits: f64) -> Result<(), StoreError> {
        *self.days.lock().await.entry(day).or_insert(0.0) += credits;
        Ok(())
    }

    async fn total(&self, day: NaiveDate) -> Result<f64, StoreError> {
        Ok(self.days.lock().await.get(&day).copied().unwrap_or(0.0))
    }
}
