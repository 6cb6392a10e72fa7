//! Exchange-rate client (`GET {base}/latest?from=XXX&to=AAA,BBB`).

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use compintel_core::AppConfig;
use reqwest::Client;

use crate::error::ClientError;
use crate::http::{build_http_client, normalize_base_url, read_json};
use crate::provider::RateSource;
use crate::retry::{retry_with_backoff, RetryPolicy};
use crate::types::RatesResponseBody;

const SERVICE: &str = "exchange-rates";

pub struct ExchangeRateClient {
    client: Client,
    base_url: String,
    timeout: Duration,
    policy: RetryPolicy,
}

impl ExchangeRateClient {
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidConfig`] for a non-http(s) base URL or
    /// [`ClientError::Http`] if the `reqwest::Client` cannot be built.
    pub fn new(base_url: &str, timeout: Duration, policy: RetryPolicy) -> Result<Self, ClientError> {
        Ok(Self {
            client: build_http_client()?,
            base_url: normalize_base_url(base_url)?,
            timeout,
            policy,
        })
    }

    /// # Errors
    ///
    /// See [`ExchangeRateClient::new`].
    pub fn from_config(config: &AppConfig) -> Result<Self, ClientError> {
        Self::new(
            &config.exchange_rate_base_url,
            Duration::from_secs(config.search_timeout_secs),
            RetryPolicy::new(config.http_max_attempts, config.http_backoff_base_ms),
        )
    }
}

#[async_trait]
impl RateSource for ExchangeRateClient {
    async fn fetch_rates(
        &self,
        base: &str,
        codes: &[String],
    ) -> Result<BTreeMap<String, f64>, ClientError> {
        let wanted: Vec<String> = codes
            .iter()
            .map(|c| c.trim().to_ascii_uppercase())
            .filter(|c| !c.is_empty() && !c.eq_ignore_ascii_case(base))
            .collect();
        if wanted.is_empty() {
            return Ok(BTreeMap::new());
        }

        let url = format!("{}/latest", self.base_url);
        let to = wanted.join(",");
        let from = base.to_ascii_uppercase();

        let response: RatesResponseBody = retry_with_backoff(self.policy, SERVICE, || {
            let request = self
                .client
                .get(&url)
                .query(&[("from", from.as_str()), ("to", to.as_str())])
                .timeout(self.timeout);
            async move { read_json(request.send().await?, SERVICE).await }
        })
        .await?;

        let rates: BTreeMap<String, f64> = response
            .rates
            .into_iter()
            .map(|(code, rate)| (code.to_ascii_uppercase(), rate))
            .filter(|(code, rate)| wanted.contains(code) && rate.is_finite() && *rate > 0.0)
            .collect();

        tracing::debug!(
            base = %from,
            requested = %to,
            received = rates.len(),
            "fetched exchange rates"
        );
        Ok(rates)
    }
}
