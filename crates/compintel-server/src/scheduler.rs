//! Background job scheduler.
//!
//! Registers the recurring maintenance jobs at server startup.

use sqlx::PgPool;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

/// Every hour at minute 15.
const CACHE_PURGE_SCHEDULE: &str = "0 15 * * * *";

/// Builds and starts the background job scheduler.
///
/// Returns the running [`JobScheduler`] handle, which must be kept alive for
/// the lifetime of the process. Dropping it shuts down all scheduled jobs.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised, a
/// job cannot be registered, or the scheduler fails to start.
pub async fn build_scheduler(pool: PgPool) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;
    register_cache_purge_job(&scheduler, pool).await?;
    scheduler.start().await?;
    Ok(scheduler)
}

/// Deletes expired response-cache rows. Reads already ignore them; this only
/// keeps the table from growing.
async fn register_cache_purge_job(
    scheduler: &JobScheduler,
    pool: PgPool,
) -> Result<(), JobSchedulerError> {
    let job = Job::new_async(CACHE_PURGE_SCHEDULE, move |_uuid, _lock| {
        let pool = pool.clone();
        Box::pin(async move {
            match compintel_db::purge_expired_cache_entries(&pool).await {
                Ok(0) => tracing::debug!("scheduler: no expired cache entries"),
                Ok(purged) => tracing::info!(purged, "scheduler: purged expired cache entries"),
                Err(e) => tracing::error!(error = %e, "scheduler: cache purge failed"),
            }
        })
    })?;

    scheduler.add(job).await?;
    Ok(())
}
