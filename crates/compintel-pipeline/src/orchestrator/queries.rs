use compintel_core::{ReportPatch, ReportStatus, StoreError};
use uuid::Uuid;

use super::Pipeline;
use crate::error::PipelineError;
use crate::responses::{
    CancelResponse, ReportListItem, ReportResponse, StatusResponse, UsageResponse,
};

const CANCELLED_REASON: &str = "cancelled by operator";
const CANCELLED_MESSAGE: &str = "Cancelled by operator";
const CANCEL_ATTEMPTS: usize = 3;
pub const MAX_LIST_LIMIT: usize = 100;

impl Pipeline {
    /// Moves a non-terminal report to `failed` and drops its extracted
    /// content, then records the cancellation marker. An external call
    /// already in flight finishes, but its result is discarded because the
    /// stage's own compare-and-set no longer matches.
    ///
    /// # Errors
    ///
    /// `InvalidState` for terminal reports.
    pub async fn cancel(&self, report_id: Uuid) -> Result<CancelResponse, PipelineError> {
        for _ in 0..CANCEL_ATTEMPTS {
            let report = self.load_report(report_id).await?;
            if report.status.is_terminal() {
                return Err(PipelineError::InvalidState(format!(
                    "report is already {}",
                    report.status
                )));
            }

            match self
                .reports
                .update_status(
                    report_id,
                    report.status,
                    ReportStatus::Failed,
                    CANCELLED_MESSAGE,
                    ReportPatch {
                        extracted_content: Some(Vec::new()),
                        ..ReportPatch::default()
                    },
                )
                .await
            {
                Ok(()) => {
                    tracing::info!(report_id = %report_id, from = %report.status, "report cancelled");
                    self.mark_cancelled(report_id).await?;
                    return Ok(CancelResponse {
                        status: ReportStatus::Failed,
                    });
                }
                Err(StoreError::StatusConflict { actual, .. }) => {
                    tracing::debug!(report_id = %report_id, actual = %actual, "status moved while cancelling, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(PipelineError::InvalidState(
            "report kept changing status while cancelling".to_string(),
        ))
    }

    /// Writes the cancellation marker onto a report this call just failed.
    /// No stage write can land once the report is `failed`.
    async fn mark_cancelled(&self, report_id: Uuid) -> Result<(), PipelineError> {
        let report = self.load_report(report_id).await?;
        let mut details = report.error_details;
        details.cancelled = true;
        details.fatal = Some(CANCELLED_REASON.to_string());
        self.reports
            .update_status(
                report_id,
                ReportStatus::Failed,
                ReportStatus::Failed,
                CANCELLED_MESSAGE,
                ReportPatch {
                    error_details: Some(details),
                    ..ReportPatch::default()
                },
            )
            .await?;
        Ok(())
    }

    /// # Errors
    ///
    /// `NotFound` for unknown reports.
    pub async fn status(&self, report_id: Uuid) -> Result<StatusResponse, PipelineError> {
        let report = self.load_report(report_id).await?;
        Ok(StatusResponse {
            status: report.status,
            message: report.progress_message,
        })
    }

    /// # Errors
    ///
    /// `NotFound` for unknown reports.
    pub async fn report(&self, report_id: Uuid) -> Result<ReportResponse, PipelineError> {
        Ok(self.load_report(report_id).await?.into())
    }

    /// Most recent reports for a subject, newest first. `limit` is clamped
    /// to `1..=100`.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn list_reports(
        &self,
        subject_id: &str,
        limit: usize,
    ) -> Result<Vec<ReportListItem>, PipelineError> {
        let reports = self
            .reports
            .find_by_subject(subject_id, limit.clamp(1, MAX_LIST_LIMIT))
            .await?;
        Ok(reports.iter().map(ReportListItem::from).collect())
    }

    /// Deletes a terminal report.
    ///
    /// # Errors
    ///
    /// `NotFound` when no such report exists, `InvalidState` when it is
    /// still in progress.
    pub async fn delete_report(&self, report_id: Uuid) -> Result<(), PipelineError> {
        match self.reports.delete(report_id).await {
            Ok(true) => {
                tracing::info!(report_id = %report_id, "report deleted");
                Ok(())
            }
            Ok(false) => Err(PipelineError::report_not_found(report_id)),
            Err(StoreError::InProgress(_)) => Err(PipelineError::InvalidState(
                "in-progress reports cannot be deleted; cancel it first".to_string(),
            )),
            Err(e) => Err(e.into()),
        }
    }

    /// Credits used today against the configured ceiling.
    ///
    /// # Errors
    ///
    /// Propagates ledger failures.
    pub async fn usage(&self) -> Result<UsageResponse, PipelineError> {
        let day = compintel_core::utc_today();
        let credits_used = self.ledger.total(day).await?;
        let daily_budget = self.settings().daily_credit_budget;
        let remaining = (daily_budget > 0.0).then(|| (daily_budget - credits_used).max(0.0));
        Ok(UsageResponse {
            day,
            credits_used,
            daily_budget,
            remaining,
        })
    }
}
