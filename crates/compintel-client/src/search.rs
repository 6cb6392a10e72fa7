//! Client for the search and batch-extract API.
//!
//! Both endpoints are JSON `POST`s authenticated with a bearer token. The
//! provider reports cost units in `usage.credits`; successful calls add them
//! to the [`CreditLedger`] for the current UTC day.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use compintel_core::{utc_today, AppConfig, CreditLedger, SearchHit};
use reqwest::Client;

use crate::error::ClientError;
use crate::http::{build_http_client, normalize_base_url, read_json};
use crate::provider::SearchProvider;
use crate::retry::{retry_with_backoff, RetryPolicy};
use crate::types::{
    ExtractOutcome, ExtractRequestBody, ExtractResponseBody, FailedPage, RawPage, SearchOutcome,
    SearchParams, SearchRequestBody, SearchResponseBody,
};

const SEARCH_SERVICE: &str = "search";
const EXTRACT_SERVICE: &str = "extract";

pub struct SearchClient {
    client: Client,
    api_key: String,
    base_url: String,
    search_timeout: Duration,
    extract_timeout: Duration,
    policy: RetryPolicy,
    ledger: Option<Arc<dyn CreditLedger>>,
}

impl SearchClient {
    /// Creates a client against `base_url` (for tests, a wiremock server).
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidConfig`] for a non-http(s) base URL or
    /// [`ClientError::Http`] if the `reqwest::Client` cannot be built.
    pub fn new(
        api_key: &str,
        base_url: &str,
        search_timeout: Duration,
        extract_timeout: Duration,
        policy: RetryPolicy,
    ) -> Result<Self, ClientError> {
        Ok(Self {
            client: build_http_client()?,
            api_key: api_key.to_owned(),
            base_url: normalize_base_url(base_url)?,
            search_timeout,
            extract_timeout,
            policy,
            ledger: None,
        })
    }

    /// # Errors
    ///
    /// Returns [`ClientError::MissingApiKey`] when `SEARCH_API_KEY` is unset,
    /// plus any error from [`SearchClient::new`].
    pub fn from_config(config: &AppConfig) -> Result<Self, ClientError> {
        let api_key = config
            .search_api_key
            .as_deref()
            .ok_or(ClientError::MissingApiKey("SEARCH_API_KEY"))?;
        Self::new(
            api_key,
            &config.search_api_base_url,
            Duration::from_secs(config.search_timeout_secs),
            Duration::from_secs(config.extract_timeout_secs),
            RetryPolicy::new(config.http_max_attempts, config.http_backoff_base_ms),
        )
    }

    /// Records reported credits into `ledger` after each successful call.
    #[must_use]
    pub fn with_ledger(mut self, ledger: Arc<dyn CreditLedger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    async fn record_credits(&self, service: &'static str, credits: Option<f64>) {
        let (Some(ledger), Some(credits)) = (&self.ledger, credits) else {
            return;
        };
        if credits <= 0.0 || !credits.is_finite() {
            return;
        }
        // The call already succeeded; a ledger outage must not fail it.
        if let Err(e) = ledger.add(utc_today(), credits).await {
            tracing::warn!(service, credits, error = %e, "failed to record API credits");
        }
    }
}

#[async_trait]
impl SearchProvider for SearchClient {
    async fn search(&self, params: &SearchParams) -> Result<SearchOutcome, ClientError> {
        let url = format!("{}/search", self.base_url);
        let body = SearchRequestBody {
            query: &params.query,
            search_depth: &params.depth,
            max_results: params.max_results,
            include_images: params.include_images,
            include_raw_content: false,
            include_answer: false,
            include_usage: true,
        };

        let response: SearchResponseBody = retry_with_backoff(self.policy, SEARCH_SERVICE, || {
            let request = self
                .client
                .post(&url)
                .bearer_auth(&self.api_key)
                .timeout(self.search_timeout)
                .json(&body);
            async move { read_json(request.send().await?, SEARCH_SERVICE).await }
        })
        .await?;

        let credits = response.usage.and_then(|u| u.credits);
        self.record_credits(SEARCH_SERVICE, credits).await;

        let hits = response
            .results
            .into_iter()
            .map(|r| SearchHit {
                url: r.url,
                title: r.title,
                snippet: r.content,
                score: r.score,
            })
            .collect::<Vec<_>>();

        tracing::debug!(hits = hits.len(), ?credits, "search call succeeded");
        Ok(SearchOutcome { hits, credits })
    }

    async fn extract(&self, urls: &[String], depth: &str) -> Result<ExtractOutcome, ClientError> {
        if urls.is_empty() {
            return Ok(ExtractOutcome {
                pages: Vec::new(),
                failed: Vec::new(),
                credits: None,
            });
        }

        let url = format!("{}/extract", self.base_url);
        let body = ExtractRequestBody {
            urls,
            extract_depth: depth,
            include_images: true,
            include_usage: true,
        };

        let response: ExtractResponseBody =
            retry_with_backoff(self.policy, EXTRACT_SERVICE, || {
                let request = self
                    .client
                    .post(&url)
                    .bearer_auth(&self.api_key)
                    .timeout(self.extract_timeout)
                    .json(&body);
                async move { read_json(request.send().await?, EXTRACT_SERVICE).await }
            })
            .await?;

        let credits = response.usage.and_then(|u| u.credits);
        self.record_credits(EXTRACT_SERVICE, credits).await;

        let mut pages = Vec::with_capacity(response.results.len());
        let mut failed: Vec<FailedPage> = response
            .failed_results
            .into_iter()
            .map(|f| FailedPage {
                url: f.url,
                reason: f.error.as_deref().map_or_else(
                    || "extraction failed".to_string(),
                    compintel_core::redact_secrets,
                ),
            })
            .collect();

        for item in response.results {
            match item.raw_content {
                Some(raw_content) if !raw_content.trim().is_empty() => pages.push(RawPage {
                    url: item.url,
                    raw_content,
                    images: item.images,
                }),
                _ => failed.push(FailedPage {
                    url: item.url,
                    reason: "empty content".to_string(),
                }),
            }
        }

        tracing::debug!(
            requested = urls.len(),
            pages = pages.len(),
            failed = failed.len(),
            "extract call succeeded"
        );
        Ok(ExtractOutcome {
            pages,
            failed,
            credits,
        })
    }
}
