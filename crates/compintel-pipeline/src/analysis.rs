//! Per-URL analysis as a pure transition over persisted partial state.
//!
//! [`AnalysisState::step`] decides what `AnalyzeUrl(i)` must do without
//! touching the network; [`AnalysisState::record`] folds the outcome back in.
//! The orchestrator reads the state from the report, runs the external call
//! only for [`Step::Run`], and persists what `record` returns.

use compintel_core::{CompetitorProfile, ErrorDetails, ExtractedPage, Report};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub current: usize,
    pub total: usize,
}

/// What analysing one page index requires.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// A profile for this page already exists.
    Done(CompetitorProfile),
    /// The page already failed; it is not retried.
    Skipped { url: String, reason: String },
    /// The page needs an extraction call.
    Run {
        url: String,
        content: String,
        images: Vec<String>,
    },
}

/// Result of one extraction call, recorded into the state.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Profile(CompetitorProfile),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisState {
    pub pages: Vec<ExtractedPage>,
    pub profiles: Vec<CompetitorProfile>,
    pub errors: ErrorDetails,
}

impl AnalysisState {
    #[must_use]
    pub fn from_report(report: &Report) -> Self {
        Self {
            pages: report.extracted_content.clone(),
            profiles: report.partial_profiles().to_vec(),
            errors: report.error_details.clone(),
        }
    }

    /// `None` when `index` is past the last page.
    #[must_use]
    pub fn step(&self, index: usize) -> Option<Step> {
        let page = self.pages.get(index)?;
        if let Some(profile) = self.profile_for(&page.url) {
            return Some(Step::Done(profile.clone()));
        }
        if self.errors.has_failed(&page.url) {
            let reason = self
                .errors
                .reasons
                .get(&page.url)
                .cloned()
                .unwrap_or_else(|| "analysis failed".to_string());
            return Some(Step::Skipped {
                url: page.url.clone(),
                reason,
            });
        }
        Some(Step::Run {
            url: page.url.clone(),
            content: page.content.clone(),
            images: page.images.clone(),
        })
    }

    /// Folds `outcome` for `url` into the state. A profile for a URL that
    /// already has one is dropped, so repeated calls never duplicate.
    pub fn record(&mut self, url: &str, outcome: Outcome) {
        match outcome {
            Outcome::Profile(profile) => {
                if self.profile_for(url).is_none() {
                    self.profiles.push(profile);
                }
            }
            Outcome::Failed(reason) => self.errors.record_url_failure(url, reason),
        }
    }

    /// Pages handled so far (profiled or failed) out of all pages.
    #[must_use]
    pub fn progress(&self) -> Progress {
        let current = self
            .pages
            .iter()
            .filter(|p| self.profile_for(&p.url).is_some() || self.errors.has_failed(&p.url))
            .count();
        Progress {
            current,
            total: self.pages.len(),
        }
    }

    fn profile_for(&self, url: &str) -> Option<&CompetitorProfile> {
        self.profiles.iter().find(|p| p.source_url == url)
    }
}

/// Cuts `content` to at most `max_chars` characters.
#[must_use]
pub fn truncate_chars(content: &str, max_chars: usize) -> &str {
    match content.char_indices().nth(max_chars) {
        Some((idx, _)) => &content[..idx],
        None => content,
    }
}
