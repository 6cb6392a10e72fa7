//! Retry with exponential back-off and jitter for outbound API calls.
//!
//! [`retry_with_backoff`] wraps any fallible async operation and retries on
//! transient errors (transport failures, 429, 5xx). Permanent errors are
//! returned on the first attempt so a bad request never burns the budget.

use std::future::Future;
use std::time::Duration;

use crate::error::ClientError;

const MAX_DELAY_MS: u64 = 30_000;

/// Attempt budget and back-off base shared by every client.
///
/// Delays strictly increase only while `1.25 × backoff_base_ms × 2ⁿ` stays
/// under the 30 s ceiling. Past that every retry sleeps exactly 30 s, so a
/// policy whose last retry reaches the ceiling plateaus. The default policy
/// tops out at 2.5 s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Always at least 1.
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base_ms: 1_000,
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn new(max_attempts: u32, backoff_base_ms: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff_base_ms,
        }
    }

    /// Delay before retry number `retry` (1-based), with `unit` in `[0, 1)`
    /// selecting a point in the ±25 % jitter band.
    ///
    /// The bands of consecutive retries never overlap (`1.25 × 2ⁿ < 1.5 × 2ⁿ`),
    /// so delays strictly increase until the 30 s cap.
    #[must_use]
    pub fn delay_for(&self, retry: u32, unit: f64) -> Duration {
        let computed = self
            .backoff_base_ms
            .saturating_mul(1u64 << retry.saturating_sub(1).min(20));
        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            clippy::cast_precision_loss
        )]
        let jittered = (computed as f64 * (unit.clamp(0.0, 1.0) * 0.5 + 0.75)) as u64;
        Duration::from_millis(jittered.min(MAX_DELAY_MS))
    }
}

/// Runs `operation` until it succeeds, fails permanently, or the policy's
/// attempt budget is spent.
///
/// Back-off schedule with `backoff_base_ms = 1_000`:
///
/// | Attempt failed | Sleep before next attempt |
/// |----------------|---------------------------|
/// | 1              | 1 000 ms × 2⁰ ± 25 %      |
/// | 2              | 1 000 ms × 2¹ ± 25 %      |
///
/// # Errors
///
/// Returns the first permanent error unchanged, or
/// [`ClientError::RetriesExhausted`] wrapping the last transient error.
pub async fn retry_with_backoff<T, F, Fut>(
    policy: RetryPolicy,
    service: &'static str,
    mut operation: F,
) -> Result<T, ClientError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ClientError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if !err.is_retriable() => return Err(err),
            Err(err) if attempt >= max_attempts => {
                tracing::error!(
                    service,
                    attempts = attempt,
                    error = %err.summary(),
                    "retry budget exhausted"
                );
                return Err(ClientError::RetriesExhausted {
                    attempts: attempt,
                    last: Box::new(err),
                });
            }
            Err(err) => {
                let delay = policy.delay_for(attempt, rand::random::<f64>());
                tracing::warn!(
                    service,
                    attempt,
                    max_attempts,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %err.summary(),
                    "transient error, retrying after back-off"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
