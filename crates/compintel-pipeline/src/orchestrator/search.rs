use chrono::{DateTime, Utc};
use compintel_client::{SearchOutcome, SearchParams};
use compintel_core::{CreateOutcome, PipelineSettings, Report, ReportPatch, ReportStatus, Subject};

use super::Pipeline;
use crate::cache::{cache_key, CacheKind};
use crate::error::PipelineError;
use crate::guard;
use crate::responses::StartResearchResponse;

const QUERY_SUFFIX: &str = "price buy online";
const SEARCHING_MESSAGE: &str = "Searching for competitor listings";

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// `"<title>" <category> <brand> price buy online`, with quotes inside the
/// title removed.
#[must_use]
pub fn build_query(subject: &Subject) -> String {
    let mut parts = vec![format!("\"{}\"", collapse(&subject.title.replace('"', " ")))];
    for attribute in [subject.category.as_deref(), subject.brand.as_deref()]
        .into_iter()
        .flatten()
    {
        let attribute = collapse(attribute);
        if !attribute.is_empty() {
            parts.push(attribute);
        }
    }
    parts.push(QUERY_SUFFIX.to_string());
    parts.join(" ")
}

fn search_abandoned(report: &Report, settings: &PipelineSettings, now: DateTime<Utc>) -> bool {
    (now - report.updated_at)
        .to_std()
        .is_ok_and(|idle| idle >= settings.search_stale_after)
}

impl Pipeline {
    /// Starts (or resumes) research for `subject_id` and runs the search
    /// stage.
    ///
    /// A subject with a report already in flight gets that report back as
    /// `Resuming`. A report stuck in `pending`, or in `searching` for longer
    /// than `search_stale_after`, has its search re-run. `force_refresh`
    /// skips the cooldown and the search cache.
    ///
    /// # Errors
    ///
    /// `Rejected` for unknown subjects, cooldown, and budget; `Fatal` when
    /// the search call fails (the report is then `failed`).
    pub async fn start_research(
        &self,
        subject_id: &str,
        force_refresh: bool,
    ) -> Result<StartResearchResponse, PipelineError> {
        let subject = self.load_subject(subject_id).await?;
        let settings = self.settings();

        if let Some(existing) = self.reports.find_in_progress(&subject.id).await? {
            tracing::info!(
                report_id = %existing.id,
                subject_id = %subject.id,
                status = %existing.status,
                "report already in progress"
            );
            return self
                .resume_or_search(existing, &subject, &settings, force_refresh)
                .await;
        }

        if !force_refresh {
            let last = self.reports.last_completed_at(&subject.id).await?;
            guard::check_cooldown(last, settings.cooldown, Utc::now())?;
        }
        let used = guard::credits_used_today(self.ledger.as_ref()).await?;
        guard::check_budget(used, settings.daily_credit_budget)?;

        match self.reports.create(&subject.id).await? {
            CreateOutcome::Created(report) => {
                tracing::info!(report_id = %report.id, subject_id = %subject.id, "report created");
                self.run_search(report, &subject, &settings, force_refresh)
                    .await
            }
            CreateOutcome::Existing(report) => Ok(StartResearchResponse::resuming(&report)),
        }
    }

    async fn resume_or_search(
        &self,
        report: Report,
        subject: &Subject,
        settings: &PipelineSettings,
        force_refresh: bool,
    ) -> Result<StartResearchResponse, PipelineError> {
        match report.status {
            ReportStatus::Pending => {
                self.run_search(report, subject, settings, force_refresh)
                    .await
            }
            ReportStatus::Searching if search_abandoned(&report, settings, Utc::now()) => {
                tracing::warn!(report_id = %report.id, "re-running abandoned search");
                // refreshes updated_at so callers arriving next see a live search
                match self
                    .transition(
                        report.id,
                        ReportStatus::Searching,
                        ReportStatus::Searching,
                        SEARCHING_MESSAGE,
                        ReportPatch::default(),
                    )
                    .await
                {
                    Ok(()) => {
                        self.run_search(report, subject, settings, force_refresh)
                            .await
                    }
                    Err(PipelineError::InvalidState(_)) => {
                        let current = self.load_report(report.id).await?;
                        Ok(StartResearchResponse::resuming(&current))
                    }
                    Err(e) => Err(e),
                }
            }
            _ => Ok(StartResearchResponse::resuming(&report)),
        }
    }

    async fn run_search(
        &self,
        mut report: Report,
        subject: &Subject,
        settings: &PipelineSettings,
        force_refresh: bool,
    ) -> Result<StartResearchResponse, PipelineError> {
        if report.status == ReportStatus::Pending {
            match self
                .transition(
                    report.id,
                    ReportStatus::Pending,
                    ReportStatus::Searching,
                    SEARCHING_MESSAGE,
                    ReportPatch::default(),
                )
                .await
            {
                Ok(()) => report.status = ReportStatus::Searching,
                Err(PipelineError::InvalidState(_)) => {
                    // another caller moved it first
                    let current = self.load_report(report.id).await?;
                    return Ok(StartResearchResponse::resuming(&current));
                }
                Err(e) => return Err(e),
            }
        }

        let query = build_query(subject);
        let key = cache_key(&subject.id, CacheKind::Search, &query);
        let cached = if force_refresh {
            None
        } else {
            self.cache.get_json::<SearchOutcome>(&key).await
        };

        let outcome = if let Some(outcome) = cached {
            tracing::debug!(report_id = %report.id, "search served from cache");
            outcome
        } else {
            let params = SearchParams {
                query: query.clone(),
                depth: settings.search_depth.clone(),
                max_results: settings.max_results,
                include_images: false,
            };
            match self.search.search(&params).await {
                Ok(outcome) => {
                    self.cache.put_json(&key, &outcome, settings.cache_ttl).await;
                    outcome
                }
                Err(e) => {
                    return Err(self
                        .fail_report(
                            report.id,
                            ReportStatus::Searching,
                            report.error_details.clone(),
                            &format!("search failed: {}", e.summary()),
                        )
                        .await);
                }
            }
        };

        let mut hits = outcome.hits;
        hits.retain(|h| !h.url.trim().is_empty());
        let mut urls: Vec<String> = Vec::with_capacity(hits.len());
        hits.retain(|h| {
            if urls.contains(&h.url) {
                return false;
            }
            urls.push(h.url.clone());
            true
        });

        self.transition(
            report.id,
            ReportStatus::Searching,
            ReportStatus::Previewing,
            &format!("Found {} candidate listings", hits.len()),
            ReportPatch {
                search_query: Some(query.clone()),
                competitor_data: Some(hits.clone()),
                ..ReportPatch::default()
            },
        )
        .await
        .map_err(|e| match e {
            PipelineError::InvalidState(_) => PipelineError::InvalidState(
                "report changed status during search".to_string(),
            ),
            other => other,
        })?;

        Ok(StartResearchResponse::Started {
            report_id: report.id,
            status: ReportStatus::Previewing,
            search_results: hits,
            urls,
            query,
        })
    }
}
