//! The pipeline orchestrator.
//!
//! Each entry point loads the report, checks its status, and does the stage
//! work. The result is persisted together with the status move in one
//! compare-and-set, so a report that went terminal meanwhile is never
//! written to. Stage
//! methods are re-entrant: calling one again after a crash or a client
//! timeout finishes the stage without repeating completed external work.

mod analyze;
mod extract;
mod finalize;
mod queries;
mod search;

use std::sync::Arc;

use compintel_client::{RateSource, SearchProvider, StructuredExtractionService};
use compintel_core::{
    CacheStore, ConfigProvider, CreditLedger, ErrorDetails, PipelineSettings, Report, ReportPatch,
    ReportStatus, ReportStore, Subject, SubjectCatalog,
};
use uuid::Uuid;

use crate::cache::ResponseCache;
use crate::currency::CurrencyNormalizer;
use crate::error::{PipelineError, Rejection};
use crate::extraction::ProfileExtractor;

pub use extract::validate_selection;
pub use queries::MAX_LIST_LIMIT;
pub use search::build_query;

/// Collaborators injected into [`Pipeline`].
#[derive(Clone)]
pub struct PipelineDeps {
    pub reports: Arc<dyn ReportStore>,
    pub subjects: Arc<dyn SubjectCatalog>,
    pub cache: Arc<dyn CacheStore>,
    pub ledger: Arc<dyn CreditLedger>,
    pub config: Arc<dyn ConfigProvider>,
    pub search: Arc<dyn SearchProvider>,
    pub rates: Arc<dyn RateSource>,
    pub extraction: Arc<dyn StructuredExtractionService>,
}

#[derive(Clone)]
pub struct Pipeline {
    reports: Arc<dyn ReportStore>,
    subjects: Arc<dyn SubjectCatalog>,
    ledger: Arc<dyn CreditLedger>,
    config: Arc<dyn ConfigProvider>,
    search: Arc<dyn SearchProvider>,
    cache: ResponseCache,
    extractor: ProfileExtractor,
    normalizer: CurrencyNormalizer,
}

impl Pipeline {
    #[must_use]
    pub fn new(deps: PipelineDeps) -> Self {
        let cache = ResponseCache::new(deps.cache);
        Self {
            reports: deps.reports,
            subjects: deps.subjects,
            ledger: deps.ledger,
            config: deps.config,
            search: deps.search,
            normalizer: CurrencyNormalizer::new(deps.rates, cache.clone()),
            extractor: ProfileExtractor::new(deps.extraction),
            cache,
        }
    }

    fn settings(&self) -> PipelineSettings {
        let mut settings = self.config.settings();
        settings.store_currency = settings.store_currency.trim().to_ascii_uppercase();
        settings
    }

    async fn load_report(&self, id: Uuid) -> Result<Report, PipelineError> {
        self.reports
            .find_by_id(id)
            .await?
            .ok_or_else(|| PipelineError::report_not_found(id))
    }

    async fn load_subject(&self, subject_id: &str) -> Result<Subject, PipelineError> {
        self.subjects
            .find_subject(subject_id)
            .await?
            .ok_or_else(|| Rejection::UnknownSubject(subject_id.to_string()).into())
    }

    /// Applies `patch` and moves `id` from `from` to `to`. Staying in the
    /// same status writes in place.
    async fn transition(
        &self,
        id: Uuid,
        from: ReportStatus,
        to: ReportStatus,
        message: &str,
        patch: ReportPatch,
    ) -> Result<(), PipelineError> {
        if from != to && !from.can_transition_to(to) {
            return Err(PipelineError::InvalidState(format!(
                "illegal transition {from} -> {to}"
            )));
        }
        self.reports
            .update_status(id, from, to, message, patch)
            .await?;
        if from != to {
            tracing::info!(report_id = %id, from = %from, to = %to, "report status changed");
        }
        Ok(())
    }

    /// Records `reason` as the report's fatal error and moves it to
    /// `failed`. Returns the error the stage should surface.
    async fn fail_report(
        &self,
        id: Uuid,
        from: ReportStatus,
        mut details: ErrorDetails,
        reason: &str,
    ) -> PipelineError {
        let reason = compintel_core::redact_secrets(reason);
        tracing::error!(report_id = %id, stage = %from, reason = %reason, "report failed");
        details.fatal = Some(reason.clone());

        let patch = ReportPatch {
            error_details: Some(details),
            extracted_content: Some(Vec::new()),
            ..ReportPatch::default()
        };
        if let Err(e) = self
            .transition(
                id,
                from,
                ReportStatus::Failed,
                &format!("Failed: {reason}"),
                patch,
            )
            .await
        {
            tracing::warn!(report_id = %id, error = %e, "could not mark report failed");
        }
        PipelineError::Fatal(reason)
    }
}
