//! Postgres-backed response cache.
//!
//! Rows whose `expires_at` has passed are invisible to reads and are replaced
//! wholesale by writes. [`purge_expired_cache_entries`] reclaims their space.

use chrono::{DateTime, Utc};
use compintel_core::CacheEntry;
use sqlx::types::Json;
use sqlx::PgPool;

use crate::DbError;

#[derive(Debug, sqlx::FromRow)]
struct CacheRow {
    value: Json<serde_json::Value>,
    expires_at: DateTime<Utc>,
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_cache_entry(pool: &PgPool, key: &str) -> Result<Option<CacheEntry>, DbError> {
    let row = sqlx::query_as::<_, CacheRow>(
        "SELECT value, expires_at FROM cache_entries WHERE key = $1 AND expires_at > NOW()",
    )
    .bind(key)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| CacheEntry {
        value: r.value.0,
        expires_at: r.expires_at,
    }))
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn set_cache_entry(
    pool: &PgPool,
    key: &str,
    value: &serde_json::Value,
    expires_at: DateTime<Utc>,
) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO cache_entries (key, value, expires_at) VALUES ($1, $2, $3) \
         ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, expires_at = EXCLUDED.expires_at",
    )
    .bind(key)
    .bind(Json(value))
    .bind(expires_at)
    .execute(pool)
    .await?;
    Ok(())
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the delete fails.
pub async fn delete_cache_entry(pool: &PgPool, key: &str) -> Result<bool, DbError> {
    let result = sqlx::query("DELETE FROM cache_entries WHERE key = $1")
        .bind(key)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Unions `entries` into the object at `key` in a single statement.
///
/// A live object row is merged with `||` (right side wins per key) and keeps
/// the later expiry. An expired or non-object row is replaced.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn merge_cache_entry(
    pool: &PgPool,
    key: &str,
    entries: serde_json::Map<String, serde_json::Value>,
    expires_at: DateTime<Utc>,
) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO cache_entries (key, value, expires_at) VALUES ($1, $2, $3) \
         ON CONFLICT (key) DO UPDATE SET \
             value = CASE \
                 WHEN cache_entries.expires_at > NOW() \
                      AND jsonb_typeof(cache_entries.value) = 'object' \
                 THEN cache_entries.value || EXCLUDED.value \
                 ELSE EXCLUDED.value \
             END, \
             expires_at = CASE \
                 WHEN cache_entries.expires_at > NOW() \
                 THEN GREATEST(cache_entries.expires_at, EXCLUDED.expires_at) \
                 ELSE EXCLUDED.expires_at \
             END",
    )
    .bind(key)
    .bind(Json(serde_json::Value::Object(entries)))
    .bind(expires_at)
    .execute(pool)
    .await?;
    Ok(())
}

/// Deletes every expired cache row. Returns how many were removed.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the delete fails.
pub async fn purge_expired_cache_entries(pool: &PgPool) -> Result<u64, DbError> {
    let result = sqlx::query("DELETE FROM cache_entries WHERE expires_at <= NOW()")
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
