//! Conversion of competitor prices into the store currency.
//!
//! Rates are "foreign units per one base unit", the shape the exchange-rate
//! API returns for `from=BASE`, so a foreign price converts as
//! `price / rate`.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use compintel_client::RateSource;
use compintel_core::{CompetitorProfile, ConversionStatus};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::cache::ResponseCache;

/// Converts `price` at `rate` foreign units per base unit, rounded to cents.
#[must_use]
pub fn convert(price: Decimal, rate: f64) -> Option<Decimal> {
    let rate = Decimal::from_f64(rate).filter(|r| *r > Decimal::ZERO)?;
    price
        .checked_div(rate)
        .map(|v| v.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
}

fn foreign_code(profile: &CompetitorProfile, base: &str) -> Option<String> {
    let code = profile.currency.as_deref()?.trim().to_ascii_uppercase();
    (!code.is_empty() && code != base).then_some(code)
}

/// Applies `rates` to one profile. A profile without a currency, or already
/// in `base`, is `same_currency`; a missing rate is `failed` and keeps the
/// raw prices as its converted values.
pub fn normalize_profile(profile: &mut CompetitorProfile, base: &str, rates: &BTreeMap<String, f64>) {
    profile.store_currency = Some(base.to_string());
    let Some(code) = foreign_code(profile, base) else {
        profile.conversion_status = Some(ConversionStatus::SameCurrency);
        profile.converted_price = profile.current_price;
        profile.converted_original_price = profile.original_price;
        return;
    };

    let rate = rates.get(&code).copied();
    let converted = rate.and_then(|rate| match profile.current_price {
        Some(price) => convert(price, rate).map(Some),
        None => Some(None),
    });

    match (rate, converted) {
        (Some(rate), Some(converted_price)) => {
            profile.conversion_status = Some(ConversionStatus::Converted);
            profile.converted_price = converted_price;
            profile.converted_original_price =
                profile.original_price.and_then(|p| convert(p, rate));
        }
        _ => {
            tracing::warn!(
                currency = %code,
                url = %profile.source_url,
                "no exchange rate available, price left unconverted"
            );
            profile.conversion_status = Some(ConversionStatus::Failed);
            profile.converted_price = profile.current_price;
            profile.converted_original_price = profile.original_price;
        }
    }
}

/// Cache-first batched rate lookup plus per-profile conversion.
#[derive(Clone)]
pub struct CurrencyNormalizer {
    source: Arc<dyn RateSource>,
    cache: ResponseCache,
}

impl CurrencyNormalizer {
    #[must_use]
    pub fn new(source: Arc<dyn RateSource>, cache: ResponseCache) -> Self {
        Self { source, cache }
    }

    /// Rates for every foreign currency in `profiles`. Only codes missing
    /// from the cache are fetched, in one call, and the result is merged
    /// back into the shared rate entry. A failed fetch leaves those codes
    /// without a rate.
    pub async fn rates_for(
        &self,
        profiles: &[CompetitorProfile],
        base: &str,
        ttl: Duration,
    ) -> BTreeMap<String, f64> {
        let wanted: BTreeSet<String> = profiles
            .iter()
            .filter_map(|p| foreign_code(p, base))
            .collect();
        if wanted.is_empty() {
            return BTreeMap::new();
        }

        let mut rates = self.cache.cached_rates(base, ttl).await;
        rates.retain(|code, _| wanted.contains(code));

        let missing: Vec<String> = wanted
            .iter()
            .filter(|code| !rates.contains_key(*code))
            .cloned()
            .collect();
        if missing.is_empty() {
            tracing::debug!(base, codes = wanted.len(), "all exchange rates served from cache");
            return rates;
        }

        match self.source.fetch_rates(base, &missing).await {
            Ok(fetched) => {
                self.cache.merge_rates(base, &fetched, ttl).await;
                rates.extend(fetched);
            }
            Err(e) => {
                tracing::warn!(base, missing = ?missing, error = %e.summary(), "exchange rate fetch failed");
            }
        }
        rates
    }

    /// Normalizes every profile in place into `base`.
    pub async fn normalize(&self, profiles: &mut [CompetitorProfile], base: &str, ttl: Duration) {
        let base = base.trim().to_ascii_uppercase();
        let rates = self.rates_for(profiles, &base, ttl).await;
        for profile in profiles.iter_mut() {
            normalize_profile(profile, &base, &rates);
        }
    }
}
