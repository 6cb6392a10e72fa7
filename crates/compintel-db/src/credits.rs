use chrono::NaiveDate;
use sqlx::PgPool;

use crate::DbError;

/// Adds `credits` to the day's running total. The additive upsert is a single
/// statement, so concurrent writers never lose an increment.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn add_credits(pool: &PgPool, day: NaiveDate, credits: f64) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO api_credit_usage (day, credits) VALUES ($1, $2) \
         ON CONFLICT (day) DO UPDATE SET \
             credits = api_credit_usage.credits + EXCLUDED.credits, \
             updated_at = NOW()",
    )
    .bind(day)
    .bind(credits)
    .execute(pool)
    .await?;
    Ok(())
}

/// Total credits recorded for `day`; zero when nothing was recorded.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn credits_for_day(pool: &PgPool, day: NaiveDate) -> Result<f64, DbError> {
    let total: Option<f64> =
        sqlx::query_scalar("SELECT credits FROM api_credit_usage WHERE day = $1")
            .bind(day)
            .fetch_optional(pool)
            .await?;
    Ok(total.unwrap_or(0.0))
}
