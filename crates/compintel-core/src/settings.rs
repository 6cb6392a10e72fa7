//! Runtime knobs the pipeline reads on every call.

use std::time::Duration;

use crate::app_config::AppConfig;

/// Settings consulted by the orchestrator, guard, and normalizer.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    /// ISO-4217 code every competitor price is converted into.
    pub store_currency: String,
    pub search_depth: String,
    pub extract_depth: String,
    pub max_results: u32,
    pub cache_ttl: Duration,
    pub rate_cache_ttl: Duration,
    pub cooldown: Duration,
    /// A `searching` report untouched for this long is treated as abandoned
    /// and its search is re-run on the next start.
    pub search_stale_after: Duration,
    /// Daily credit ceiling; `0.0` disables the check.
    pub daily_credit_budget: f64,
    pub content_token_budget: usize,
    pub analysis_max_chars: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            store_currency: "USD".to_string(),
            search_depth: "advanced".to_string(),
            extract_depth: "advanced".to_string(),
            max_results: 10,
            cache_ttl: Duration::from_secs(86_400),
            rate_cache_ttl: Duration::from_secs(43_200),
            cooldown: Duration::from_secs(3_600),
            search_stale_after: Duration::from_secs(180),
            daily_credit_budget: 0.0,
            content_token_budget: 3_000,
            analysis_max_chars: 12_000,
        }
    }
}

/// Source of [`PipelineSettings`], injected into the orchestrator.
pub trait ConfigProvider: Send + Sync {
    fn settings(&self) -> PipelineSettings;
}

impl ConfigProvider for PipelineSettings {
    fn settings(&self) -> PipelineSettings {
        self.clone()
    }
}

impl ConfigProvider for AppConfig {
    fn settings(&self) -> PipelineSettings {
        PipelineSettings {
            store_currency: self.store_currency.clone(),
            search_depth: self.search_depth.clone(),
            extract_depth: self.extract_depth.clone(),
            max_results: self.max_results,
            cache_ttl: Duration::from_secs(self.cache_ttl_secs),
            rate_cache_ttl: Duration::from_secs(self.rate_cache_ttl_secs),
            cooldown: Duration::from_secs(self.cooldown_secs),
            search_stale_after: search_stale_after(self),
            daily_credit_budget: self.daily_credit_budget,
            content_token_budget: self.content_token_budget,
            analysis_max_chars: self.analysis_max_chars,
        }
    }
}

/// Longest a search call can run with every retry spent: each attempt gets
/// its timeout plus the 30 s back-off ceiling.
fn search_stale_after(config: &AppConfig) -> Duration {
    let per_attempt = config.search_timeout_secs.saturating_add(30);
    Duration::from_secs(per_attempt.saturating_mul(u64::from(config.http_max_attempts.max(1))))
}
