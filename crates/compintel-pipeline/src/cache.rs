//! Content-addressed response cache on top of [`CacheStore`].
//!
//! Keys are the SHA-256 of `(subject, kind, discriminator)`. Storage problems
//! degrade to misses: the cache only ever saves third-party calls, so a broken
//! cache must not fail a stage.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use compintel_core::CacheStore;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Rate entries are shared across subjects.
const RATES_SUBJECT: &str = "*";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheKind {
    Search,
    Extract,
    Rates,
}

impl CacheKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CacheKind::Search => "search",
            CacheKind::Extract => "extract",
            CacheKind::Rates => "fx",
        }
    }
}

/// Deterministic cache key for `(subject_id, kind, discriminator)`.
#[must_use]
pub fn cache_key(subject_id: &str, kind: CacheKind, discriminator: &str) -> String {
    let mut hasher = Sha256::new();
    for part in [subject_id, kind.as_str(), discriminator] {
        hasher.update(part.as_bytes());
        hasher.update([0x1f]);
    }
    format!("{:x}", hasher.finalize())
}

/// Discriminator for a batch extract: the URL set, order-insensitive.
#[must_use]
pub fn url_set_discriminator(urls: &[String]) -> String {
    let mut sorted: Vec<&str> = urls.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    sorted.dedup();
    sorted.join("\n")
}

/// One cached exchange rate. Each code carries its own fetch time so codes
/// merged in at different moments age out independently.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct CachedRate {
    rate: f64,
    fetched_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct ResponseCache {
    store: Arc<dyn CacheStore>,
}

impl ResponseCache {
    #[must_use]
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    /// Typed read. An entry that no longer decodes as `T` is deleted and
    /// reported as a miss.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.store.get(key).await {
            Ok(Some(entry)) => match serde_json::from_value(entry.value) {
                Ok(value) => Some(value),
                Err(e) => {
                    tracing::warn!(key, error = %e, "discarding undecodable cache entry");
                    self.invalidate(key).await;
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(key, error = %e, "cache read failed, treating as miss");
                None
            }
        }
    }

    pub async fn put_json<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        let value = match serde_json::to_value(value) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key, error = %e, "could not encode cache entry");
                return;
            }
        };
        if let Err(e) = self.store.set(key, value, ttl).await {
            tracing::warn!(key, error = %e, "cache write failed");
        }
    }

    async fn invalidate(&self, key: &str) {
        if let Err(e) = self.store.delete(key).await {
            tracing::warn!(key, error = %e, "cache delete failed");
        }
    }

    /// Rates for `base` fetched less than `ttl` ago, keyed by currency code.
    pub async fn cached_rates(&self, base: &str, ttl: Duration) -> BTreeMap<String, f64> {
        let key = rates_key(base);
        let Some(raw) = self
            .get_json::<BTreeMap<String, serde_json::Value>>(&key)
            .await
        else {
            return BTreeMap::new();
        };

        let now = Utc::now();
        raw.into_iter()
            .filter_map(|(code, value)| {
                let cached: CachedRate = serde_json::from_value(value).ok()?;
                let fresh = compintel_core::expiry_from(cached.fetched_at, ttl) > now;
                (fresh && cached.rate > 0.0).then_some((code, cached.rate))
            })
            .collect()
    }

    /// Unions `rates` into the shared rate entry for `base`. Codes already
    /// cached and absent from `rates` are left untouched.
    pub async fn merge_rates(&self, base: &str, rates: &BTreeMap<String, f64>, ttl: Duration) {
        if rates.is_empty() {
            return;
        }
        let key = rates_key(base);
        let fetched_at = Utc::now();
        let mut entries = serde_json::Map::new();
        for (code, rate) in rates {
            match serde_json::to_value(CachedRate {
                rate: *rate,
                fetched_at,
            }) {
                Ok(value) => {
                    entries.insert(code.clone(), value);
                }
                Err(e) => tracing::warn!(code = %code, error = %e, "could not encode rate"),
            }
        }
        if let Err(e) = self.store.merge(&key, entries, ttl).await {
            tracing::warn!(base, error = %e, "rate cache merge failed");
        }
    }
}

fn rates_key(base: &str) -> String {
    cache_key(RATES_SUBJECT, CacheKind::Rates, &base.to_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use compintel_core::memory::MemoryCacheStore;

    fn cache() -> (ResponseCache, Arc<MemoryCacheStore>) {
        let store = Arc::new(MemoryCacheStore::new());
        (ResponseCache::new(store.clone()), store)
    }

    #[test]
    fn keys_are_deterministic_and_distinct_per_kind() {
        let a = cache_key("sku-1", CacheKind::Search, "q");
        assert_eq!(a, cache_key("sku-1", CacheKind::Search, "q"));
        assert_ne!(a, cache_key("sku-1", CacheKind::Extract, "q"));
        assert_ne!(a, cache_key("sku-2", CacheKind::Search, "q"));
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn key_parts_do_not_run_together() {
        assert_ne!(
            cache_key("ab", CacheKind::Search, "c"),
            cache_key("a", CacheKind::Search, "bc")
        );
    }

    #[test]
    fn url_set_ignores_order_and_duplicates() {
        let one = url_set_discriminator(&["b".to_string(), "a".to_string()]);
        let two = url_set_discriminator(&["a".to_string(), "b".to_string(), "a".to_string()]);
        assert_eq!(one, two);
    }

    #[tokio::test]
    async fn json_round_trips_through_store() {
        let (cache, _) = cache();
        cache
            .put_json("k", &vec!["x".to_string()], Duration::from_secs(60))
            .await;
        let value: Option<Vec<String>> = cache.get_json("k").await;
        assert_eq!(value, Some(vec!["x".to_string()]));
    }

    #[tokio::test]
    async fn undecodable_entry_is_deleted_on_read() {
        let (cache, store) = cache();
        store
            .set("k", serde_json::json!({"not": "a list"}), Duration::from_secs(60))
            .await
            .unwrap();

        assert!(cache.get_json::<Vec<String>>("k").await.is_none());
        assert!(store.get("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn rate_merges_accumulate_codes() {
        let (cache, _) = cache();
        let ttl = Duration::from_secs(600);

        cache
            .merge_rates("usd", &BTreeMap::from([("EUR".to_string(), 0.9)]), ttl)
            .await;
        cache
            .merge_rates("USD", &BTreeMap::from([("GBP".to_string(), 0.8)]), ttl)
            .await;

        let rates = cache.cached_rates("USD", ttl).await;
        assert_eq!(rates.keys().collect::<Vec<_>>(), vec!["EUR", "GBP"]);
    }

    #[tokio::test]
    async fn stale_rate_codes_are_filtered_on_read() {
        let (cache, store) = cache();
        let old = Utc::now() - chrono::Duration::hours(2);
        let mut entries = serde_json::Map::new();
        entries.insert(
            "EUR".to_string(),
            serde_json::json!({"rate": 0.9, "fetched_at": old}),
        );
        entries.insert(
            "GBP".to_string(),
            serde_json::json!({"rate": 0.8, "fetched_at": Utc::now()}),
        );
        store
            .merge(&rates_key("USD"), entries, Duration::from_secs(86_400))
            .await
            .unwrap();

        let rates = cache.cached_rates("USD", Duration::from_secs(3_600)).await;
        assert_eq!(rates.keys().collect::<Vec<_>>(), vec!["GBP"]);
    }
}
