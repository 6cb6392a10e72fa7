use compintel_core::{AnalysisResult, FinalReport, ReportPatch, ReportStatus};
use uuid::Uuid;

use super::Pipeline;
use crate::error::PipelineError;
use crate::responses::FinalizeResponse;
use crate::summary::summarize;

impl Pipeline {
    /// Normalizes currencies, builds the summary, and completes the report.
    /// Calling it on a complete report returns the stored result.
    ///
    /// # Errors
    ///
    /// `InvalidState` unless the report is `analyzing`; `Fatal` when no
    /// profile was extracted (the report is then `failed`).
    pub async fn finalize(&self, report_id: Uuid) -> Result<FinalizeResponse, PipelineError> {
        let report = self.load_report(report_id).await?;
        if let (ReportStatus::Complete, Some(final_report)) =
            (report.status, report.final_report())
        {
            return Ok(FinalizeResponse {
                status: ReportStatus::Complete,
                report: final_report.clone(),
            });
        }
        if report.status != ReportStatus::Analyzing {
            return Err(PipelineError::InvalidState(format!(
                "only an analyzing report can be finalized; report is {}",
                report.status
            )));
        }

        let mut profiles = report.partial_profiles().to_vec();
        if profiles.is_empty() {
            return Err(self
                .fail_report(
                    report.id,
                    ReportStatus::Analyzing,
                    report.error_details.clone(),
                    "no competitor profile could be extracted",
                )
                .await);
        }

        let page_position = |url: &str| {
            report
                .extracted_content
                .iter()
                .position(|p| p.url == url)
                .unwrap_or(usize::MAX)
        };
        profiles.sort_by_key(|p| page_position(&p.source_url));

        let settings = self.settings();
        self.normalizer
            .normalize(&mut profiles, &settings.store_currency, settings.rate_cache_ttl)
            .await;
        let summary = summarize(&profiles, &settings.store_currency);
        let final_report = FinalReport {
            competitors: profiles,
            summary,
        };

        self.transition(
            report_id,
            ReportStatus::Analyzing,
            ReportStatus::Complete,
            &format!(
                "Report complete: {} competitors",
                final_report.summary.total_competitors
            ),
            ReportPatch {
                analysis_result: Some(AnalysisResult::Final(final_report.clone())),
                extracted_content: Some(Vec::new()),
                ..ReportPatch::default()
            },
        )
        .await?;

        Ok(FinalizeResponse {
            status: ReportStatus::Complete,
            report: final_report,
        })
    }
}
