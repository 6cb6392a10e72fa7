//! The competitor-intelligence pipeline: response cache, content sanitizer,
//! structured extraction, currency normalization, entry guards, and the
//! orchestrator that drives a report through its stages.

pub mod analysis;
pub mod cache;
pub mod currency;
pub mod error;
pub mod extraction;
pub mod guard;
pub mod orchestrator;
pub mod responses;
pub mod sanitizer;
pub mod summary;

pub use analysis::{AnalysisState, Outcome, Progress, Step};
pub use cache::{cache_key, url_set_discriminator, CacheKind, ResponseCache};
pub use currency::CurrencyNormalizer;
pub use error::{ErrorClass, PipelineError, Rejection};
pub use extraction::{profile_schema, validate_profile, ProfileExtractor, ProfileFailure};
pub use orchestrator::{build_query, validate_selection, Pipeline, PipelineDeps, MAX_LIST_LIMIT};
pub use responses::{
    AnalyzeUrlResponse, CancelResponse, ConfirmUrlsResponse, FinalizeResponse, ReportListItem,
    ReportResponse, StartResearchResponse, StatusResponse, UsageResponse,
};
pub use sanitizer::ContentSanitizer;
pub use summary::summarize;
