//! The `Report` entity and its lifecycle state machine.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::profile::{CompetitorProfile, FinalReport};
use crate::CoreError;

/// Pipeline stage a report is currently in.
///
/// Statuses only move forward along
/// `pending → searching → previewing → extracting → analyzing → complete`,
/// with `failed` reachable from every non-terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Pending,
    Searching,
    Previewing,
    Extracting,
    Analyzing,
    Complete,
    Failed,
}

impl ReportStatus {
    /// Every status that still accepts transitions.
    pub const NON_TERMINAL: [ReportStatus; 5] = [
        ReportStatus::Pending,
        ReportStatus::Searching,
        ReportStatus::Previewing,
        ReportStatus::Extracting,
        ReportStatus::Analyzing,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ReportStatus::Pending => "pending",
            ReportStatus::Searching => "searching",
            ReportStatus::Previewing => "previewing",
            ReportStatus::Extracting => "extracting",
            ReportStatus::Analyzing => "analyzing",
            ReportStatus::Complete => "complete",
            ReportStatus::Failed => "failed",
        }
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, ReportStatus::Complete | ReportStatus::Failed)
    }

    /// Returns `true` if `next` is a legal edge out of `self`.
    #[must_use]
    pub fn can_transition_to(self, next: ReportStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        if next == ReportStatus::Failed {
            return true;
        }
        matches!(
            (self, next),
            (ReportStatus::Pending, ReportStatus::Searching)
                | (ReportStatus::Searching, ReportStatus::Previewing)
                | (ReportStatus::Previewing, ReportStatus::Extracting)
                | (ReportStatus::Extracting, ReportStatus::Analyzing)
                | (ReportStatus::Analyzing, ReportStatus::Complete)
        )
    }
}

impl std::fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ReportStatus::Pending),
            "searching" => Ok(ReportStatus::Searching),
            "previewing" => Ok(ReportStatus::Previewing),
            "extracting" => Ok(ReportStatus::Extracting),
            "analyzing" => Ok(ReportStatus::Analyzing),
            "complete" => Ok(ReportStatus::Complete),
            "failed" => Ok(ReportStatus::Failed),
            other => Err(CoreError::InvalidStatus(other.to_string())),
        }
    }
}

/// One organic search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub url: String,
    pub title: String,
    pub snippet: String,
    #[serde(default)]
    pub score: Option<f64>,
}

/// Sanitized page text for one selected URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedPage {
    pub url: String,
    pub content: String,
    /// Image URLs the extractor found on the page.
    #[serde(default)]
    pub images: Vec<String>,
}

/// Failures accumulated across stages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetails {
    /// URLs that produced no usable content or no profile, in first-failure order.
    #[serde(default)]
    pub failed_urls: Vec<String>,
    /// Redacted one-line reason per failed URL.
    #[serde(default)]
    pub reasons: BTreeMap<String, String>,
    /// Redacted reason the whole report failed, if it did.
    #[serde(default)]
    pub fatal: Option<String>,
    #[serde(default)]
    pub cancelled: bool,
}

impl ErrorDetails {
    /// Records a per-URL failure. Repeated failures for the same URL keep the
    /// first reason.
    pub fn record_url_failure(&mut self, url: &str, reason: impl Into<String>) {
        if !self.failed_urls.iter().any(|u| u == url) {
            self.failed_urls.push(url.to_string());
        }
        self.reasons
            .entry(url.to_string())
            .or_insert_with(|| reason.into());
    }

    #[must_use]
    pub fn has_failed(&self, url: &str) -> bool {
        self.failed_urls.iter().any(|u| u == url)
    }
}

/// Analysis payload: a growing list of profiles while the client drives
/// per-URL analysis, replaced by the finalized report at the end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum AnalysisResult {
    Partial(Vec<CompetitorProfile>),
    Final(FinalReport),
}

/// The pipeline's unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: Uuid,
    pub subject_id: String,
    pub status: ReportStatus,
    pub progress_message: String,
    pub search_query: Option<String>,
    pub competitor_data: Vec<SearchHit>,
    pub selected_urls: Vec<String>,
    pub extracted_content: Vec<ExtractedPage>,
    pub analysis_result: Option<AnalysisResult>,
    pub error_details: ErrorDetails,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Report {
    /// A fresh `pending` report for `subject_id`.
    #[must_use]
    pub fn new(subject_id: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            subject_id: subject_id.to_string(),
            status: ReportStatus::Pending,
            progress_message: "Queued".to_string(),
            search_query: None,
            competitor_data: Vec::new(),
            selected_urls: Vec::new(),
            extracted_content: Vec::new(),
            analysis_result: None,
            error_details: ErrorDetails::default(),
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// Profiles accumulated so far. Empty once the report is finalized.
    #[must_use]
    pub fn partial_profiles(&self) -> &[CompetitorProfile] {
        match &self.analysis_result {
            Some(AnalysisResult::Partial(profiles)) => profiles,
            _ => &[],
        }
    }

    #[must_use]
    pub fn final_report(&self) -> Option<&FinalReport> {
        match &self.analysis_result {
            Some(AnalysisResult::Final(report)) => Some(report),
            _ => None,
        }
    }
}

/// Field-level update applied by [`crate::ReportStore::update_status`]. `None`
/// leaves the stored value untouched.
#[derive(Debug, Clone, Default)]
pub struct ReportPatch {
    pub search_query: Option<String>,
    pub competitor_data: Option<Vec<SearchHit>>,
    pub selected_urls: Option<Vec<String>>,
    pub extracted_content: Option<Vec<ExtractedPage>>,
    pub analysis_result: Option<AnalysisResult>,
    pub error_details: Option<ErrorDetails>,
}

impl ReportPatch {
    /// Applies every populated field to `report` and bumps `updated_at`.
    pub fn apply(self, report: &mut Report) {
        if let Some(query) = self.search_query {
            report.search_query = Some(query);
        }
        if let Some(hits) = self.competitor_data {
            report.competitor_data = hits;
        }
        if let Some(urls) = self.selected_urls {
            report.selected_urls = urls;
        }
        if let Some(pages) = self.extracted_content {
            report.extracted_content = pages;
        }
        if let Some(result) = self.analysis_result {
            report.analysis_result = Some(result);
        }
        if let Some(details) = self.error_details {
            report.error_details = details;
        }
        report.updated_at = Utc::now();
    }
}
