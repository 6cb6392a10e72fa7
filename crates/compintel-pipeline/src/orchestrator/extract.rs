use compintel_client::{ExtractOutcome, RawPage};
use compintel_core::{
    AnalysisResult, ErrorDetails, ExtractedPage, Report, ReportPatch, ReportStatus,
};
use reqwest::Url;
use uuid::Uuid;

use super::Pipeline;
use crate::cache::{cache_key, url_set_discriminator, CacheKind};
use crate::error::{PipelineError, Rejection};
use crate::responses::ConfirmUrlsResponse;
use crate::sanitizer::ContentSanitizer;

/// Trims, checks, and dedupes the operator's selection, keeping its order.
///
/// # Errors
///
/// Returns [`Rejection::InvalidInput`] for an empty selection or a URL that
/// is not absolute http(s).
pub fn validate_selection(urls: &[String]) -> Result<Vec<String>, Rejection> {
    let mut selected: Vec<String> = Vec::with_capacity(urls.len());
    for raw in urls {
        let url = raw.trim();
        let valid = Url::parse(url)
            .is_ok_and(|u| matches!(u.scheme(), "http" | "https") && u.host().is_some());
        if !valid {
            return Err(Rejection::InvalidInput(format!(
                "'{url}' is not an http(s) URL"
            )));
        }
        if !selected.iter().any(|s| s == url) {
            selected.push(url.to_string());
        }
    }
    if selected.is_empty() {
        return Err(Rejection::InvalidInput(
            "at least one URL must be selected".to_string(),
        ));
    }
    Ok(selected)
}

impl Pipeline {
    /// Stores the URL selection and runs the extract stage.
    ///
    /// Re-entry while `extracting` resumes with the stored selection;
    /// re-entry once `analyzing` returns the page count without any call.
    ///
    /// # Errors
    ///
    /// `Rejected` for an invalid selection, `InvalidState` outside
    /// `previewing`/`extracting`/`analyzing`, `Fatal` when the extract call
    /// fails or no URL yields usable content.
    pub async fn confirm_urls(
        &self,
        report_id: Uuid,
        urls: &[String],
    ) -> Result<ConfirmUrlsResponse, PipelineError> {
        let mut report = self.load_report(report_id).await?;
        match report.status {
            ReportStatus::Previewing => {
                let selected = validate_selection(urls)?;
                self.transition(
                    report.id,
                    ReportStatus::Previewing,
                    ReportStatus::Extracting,
                    &format!("Extracting {} selected pages", selected.len()),
                    ReportPatch {
                        selected_urls: Some(selected.clone()),
                        ..ReportPatch::default()
                    },
                )
                .await?;
                report.selected_urls = selected;
                report.status = ReportStatus::Extracting;
                self.run_extract(report).await
            }
            ReportStatus::Extracting => {
                tracing::info!(report_id = %report.id, "resuming extract stage");
                self.run_extract(report).await
            }
            ReportStatus::Analyzing => Ok(ConfirmUrlsResponse {
                status: ReportStatus::Analyzing,
                total_urls: report.extracted_content.len(),
            }),
            other => Err(PipelineError::InvalidState(format!(
                "URLs can only be confirmed while previewing; report is {other}"
            ))),
        }
    }

    async fn run_extract(&self, report: Report) -> Result<ConfirmUrlsResponse, PipelineError> {
        let settings = self.settings();
        let subject_terms = match self.subjects.find_subject(&report.subject_id).await? {
            Some(subject) => subject.title_tokens(),
            None => Vec::new(),
        };
        let selected = report.selected_urls.clone();

        let key = cache_key(
            &report.subject_id,
            CacheKind::Extract,
            &url_set_discriminator(&selected),
        );
        let outcome = if let Some(outcome) = self.cache.get_json::<ExtractOutcome>(&key).await {
            tracing::debug!(report_id = %report.id, "extract served from cache");
            outcome
        } else {
            match self.search.extract(&selected, &settings.extract_depth).await {
                Ok(outcome) => {
                    self.cache.put_json(&key, &outcome, settings.cache_ttl).await;
                    outcome
                }
                Err(e) => {
                    return Err(self
                        .fail_report(
                            report.id,
                            ReportStatus::Extracting,
                            report.error_details.clone(),
                            &format!("extract failed: {}", e.summary()),
                        )
                        .await);
                }
            }
        };

        let sanitizer = ContentSanitizer::new(settings.content_token_budget);
        let mut errors = report.error_details.clone();
        let mut pages: Vec<ExtractedPage> = Vec::with_capacity(selected.len());

        let mut push_page = |url: &str, raw: &RawPage, errors: &mut ErrorDetails| {
            let content = sanitizer.sanitize(&raw.raw_content, &subject_terms);
            if content.trim().is_empty() {
                tracing::warn!(report_id = %report.id, url, "page had no usable content after cleanup");
                errors.record_url_failure(url, "no usable content after cleanup");
            } else if !pages.iter().any(|p| p.url == url) {
                pages.push(ExtractedPage {
                    url: url.to_string(),
                    content,
                    images: raw.images.clone(),
                });
            }
        };

        for url in &selected {
            if let Some(page) = outcome.pages.iter().find(|p| p.url == *url) {
                push_page(url, page, &mut errors);
            } else if let Some(failed) = outcome.failed.iter().find(|f| f.url == *url) {
                tracing::warn!(report_id = %report.id, url = %url, reason = %failed.reason, "extraction failed");
                errors.record_url_failure(url, compintel_core::redact_secrets(&failed.reason));
            } else {
                errors.record_url_failure(url, "not returned by the extractor");
            }
        }
        // pages the provider returned under a normalized URL
        for page in &outcome.pages {
            if !selected.contains(&page.url) {
                push_page(&page.url, page, &mut errors);
            }
        }

        if pages.is_empty() {
            return Err(self
                .fail_report(
                    report.id,
                    ReportStatus::Extracting,
                    errors,
                    "no selected URL produced usable content",
                )
                .await);
        }

        let total = pages.len();
        self.transition(
            report.id,
            ReportStatus::Extracting,
            ReportStatus::Analyzing,
            &format!("Analyzing 0 of {total} pages"),
            ReportPatch {
                extracted_content: Some(pages),
                error_details: Some(errors),
                analysis_result: Some(AnalysisResult::Partial(Vec::new())),
                ..ReportPatch::default()
            },
        )
        .await?;

        Ok(ConfirmUrlsResponse {
            status: ReportStatus::Analyzing,
            total_urls: total,
        })
    }
}
