use compintel_core::{AnalysisResult, ReportPatch, ReportStatus};
use uuid::Uuid;

use super::Pipeline;
use crate::analysis::{truncate_chars, AnalysisState, Outcome, Step};
use crate::error::{PipelineError, Rejection};
use crate::responses::AnalyzeUrlResponse;

impl Pipeline {
    /// Analyses the extracted page at `url_index`.
    ///
    /// A page that already has a profile returns it without calling the
    /// extraction service again; a page that already failed returns the
    /// recorded reason. A failed extraction is recorded against the URL and
    /// reported as skipped; it never fails the report.
    ///
    /// # Errors
    ///
    /// `InvalidState` unless the report is `analyzing` (checked again after
    /// the extraction call), `Rejected` for an index past the last page.
    pub async fn analyze_url(
        &self,
        report_id: Uuid,
        url_index: usize,
    ) -> Result<AnalyzeUrlResponse, PipelineError> {
        let report = self.load_report(report_id).await?;
        if report.status != ReportStatus::Analyzing {
            return Err(PipelineError::InvalidState(format!(
                "pages can only be analysed while analyzing; report is {}",
                report.status
            )));
        }

        let state = AnalysisState::from_report(&report);
        let step = state.step(url_index).ok_or_else(|| {
            Rejection::InvalidInput(format!(
                "url index {url_index} is out of range; report has {} pages",
                state.pages.len()
            ))
        })?;

        let (url, content, images) = match step {
            Step::Done(profile) => {
                tracing::debug!(report_id = %report.id, url_index, "profile already recorded");
                return Ok(AnalyzeUrlResponse {
                    profile: Some(profile),
                    error: None,
                    skipped: false,
                    progress: state.progress(),
                });
            }
            Step::Skipped { reason, .. } => {
                return Ok(AnalyzeUrlResponse {
                    profile: None,
                    error: Some(reason),
                    skipped: true,
                    progress: state.progress(),
                });
            }
            Step::Run {
                url,
                content,
                images,
            } => (url, content, images),
        };

        let subject = self.load_subject(&report.subject_id).await?;
        let settings = self.settings();
        let content = truncate_chars(&content, settings.analysis_max_chars);
        let outcome = match self.extractor.extract(&subject, &url, content).await {
            Ok(mut profile) => {
                if profile.images.is_empty() {
                    profile.images = images;
                }
                Outcome::Profile(profile)
            }
            Err(failure) => {
                tracing::warn!(report_id = %report.id, url = %url, reason = %failure.0, "skipping page");
                Outcome::Failed(failure.0)
            }
        };

        // the call may have taken a while; another caller may have recorded
        // pages meanwhile, and cancellation makes the write below conflict
        let fresh = self.load_report(report_id).await?;
        if fresh.status != ReportStatus::Analyzing {
            return Err(PipelineError::InvalidState(format!(
                "report moved to {} during analysis",
                fresh.status
            )));
        }
        let mut state = AnalysisState::from_report(&fresh);
        state.record(&url, outcome);
        let progress = state.progress();

        let profile = state.profiles.iter().find(|p| p.source_url == url).cloned();
        let error = if profile.is_none() {
            state.errors.reasons.get(&url).cloned()
        } else {
            None
        };

        self.transition(
            report_id,
            ReportStatus::Analyzing,
            ReportStatus::Analyzing,
            &format!("Analyzed {} of {} pages", progress.current, progress.total),
            ReportPatch {
                analysis_result: Some(AnalysisResult::Partial(state.profiles)),
                error_details: Some(state.errors),
                ..ReportPatch::default()
            },
        )
        .await?;

        Ok(AnalyzeUrlResponse {
            skipped: profile.is_none(),
            profile,
            error,
            progress,
        })
    }
}
