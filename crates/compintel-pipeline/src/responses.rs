//! Response shapes of the pipeline entry points.
//!
//! Every type serializes to the JSON the server returns under `data`.

use chrono::{DateTime, NaiveDate, Utc};
use compintel_core::{CompetitorProfile, FinalReport, Report, ReportStatus, SearchHit};
use serde::Serialize;
use uuid::Uuid;

use crate::analysis::Progress;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StartResearchResponse {
    Started {
        report_id: Uuid,
        status: ReportStatus,
        search_results: Vec<SearchHit>,
        urls: Vec<String>,
        query: String,
    },
    /// The subject already had a report in flight; nothing new was started.
    Resuming {
        resuming: bool,
        report_id: Uuid,
        status: ReportStatus,
    },
}

impl StartResearchResponse {
    pub(crate) fn resuming(report: &Report) -> Self {
        StartResearchResponse::Resuming {
            resuming: true,
            report_id: report.id,
            status: report.status,
        }
    }

    #[must_use]
    pub fn report_id(&self) -> Uuid {
        match self {
            StartResearchResponse::Started { report_id, .. }
            | StartResearchResponse::Resuming { report_id, .. } => *report_id,
        }
    }

    #[must_use]
    pub fn status(&self) -> ReportStatus {
        match self {
            StartResearchResponse::Started { status, .. }
            | StartResearchResponse::Resuming { status, .. } => *status,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfirmUrlsResponse {
    pub status: ReportStatus,
    /// Pages with usable content, i.e. the number of analysable indexes.
    pub total_urls: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyzeUrlResponse {
    pub profile: Option<CompetitorProfile>,
    pub error: Option<String>,
    pub skipped: bool,
    pub progress: Progress,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinalizeResponse {
    pub status: ReportStatus,
    pub report: FinalReport,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CancelResponse {
    pub status: ReportStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusResponse {
    pub status: ReportStatus,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportResponse {
    pub report_id: Uuid,
    pub subject_id: String,
    pub status: ReportStatus,
    pub message: String,
    pub report: Option<FinalReport>,
    pub failed_urls: Vec<String>,
    pub error: Option<String>,
    pub created: DateTime<Utc>,
    pub completed: Option<DateTime<Utc>>,
}

impl From<Report> for ReportResponse {
    fn from(report: Report) -> Self {
        let final_report = report.final_report().cloned();
        Self {
            report_id: report.id,
            subject_id: report.subject_id,
            status: report.status,
            message: report.progress_message,
            report: final_report,
            failed_urls: report.error_details.failed_urls,
            error: report.error_details.fatal,
            created: report.created_at,
            completed: report.completed_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportListItem {
    pub report_id: Uuid,
    pub status: ReportStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub total_competitors: Option<usize>,
}

impl From<&Report> for ReportListItem {
    fn from(report: &Report) -> Self {
        Self {
            report_id: report.id,
            status: report.status,
            created_at: report.created_at,
            completed_at: report.completed_at,
            total_competitors: report.final_report().map(|r| r.summary.total_competitors),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageResponse {
    pub day: NaiveDate,
    pub credits_used: f64,
    /// `0.0` means no ceiling.
    pub daily_budget: f64,
    pub remaining: Option<f64>,
}
