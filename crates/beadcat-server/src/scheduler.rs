//! Background job scheduler.
//!
//! When `BEADCAT_CRAWL_CRON` is set, every registered crawler is queued on
//! that schedule with default options. Runs go through the same queue as
//! admin requests.

use beadcat_core::CrawlOptions;
use sqlx::PgPool;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

use crate::jobs::JobQueue;

/// Builds and starts the background job scheduler.
///
/// Returns the running [`JobScheduler`] handle, which must be kept alive for
/// the lifetime of the process. Dropping it shuts down all scheduled jobs.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised, the
/// cron expression is invalid, or the scheduler fails to start.
pub async fn build_scheduler(
    crawl_cron: Option<&str>,
    pool: PgPool,
    jobs: JobQueue,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    match crawl_cron {
        Some(cron) => register_crawl_job(&scheduler, cron, pool, jobs).await?,
        None => tracing::info!("BEADCAT_CRAWL_CRON not set; scheduled crawls disabled"),
    }

    scheduler.start().await?;
    Ok(scheduler)
}

async fn register_crawl_job(
    scheduler: &JobScheduler,
    cron: &str,
    pool: PgPool,
    jobs: JobQueue,
) -> Result<(), JobSchedulerError> {
    let job = Job::new_async(cron, move |_uuid, _lock| {
        let pool = pool.clone();
        let jobs = jobs.clone();

        Box::pin(async move {
            tracing::info!("scheduler: queueing scheduled crawls");
            enqueue_all(&pool, &jobs).await;
        })
    })?;

    scheduler.add(job).await?;
    tracing::info!(cron, "scheduler: crawl job registered");
    Ok(())
}

/// Records and queues one run per registered crawler. A failure for one
/// crawler is logged and does not stop the others.
async fn enqueue_all(pool: &PgPool, jobs: &JobQueue) {
    for name in beadcat_crawler::crawler_names() {
        let run = match beadcat_crawler::request_run(name, CrawlOptions::default()) {
            Ok(run) => run,
            Err(e) => {
                tracing::error!(crawler = name, error = %e, "scheduler: cannot request run");
                continue;
            }
        };

        if let Err(e) = beadcat_db::record_crawl_run(pool, &run).await {
            tracing::error!(crawler = name, error = %e, "scheduler: failed to record run");
            continue;
        }

        match jobs.submit(run.clone()) {
            Ok(()) => tracing::info!(crawler = name, run_id = %run.run_id, "scheduler: crawl queued"),
            Err(e) => tracing::warn!(crawler = name, error = %e, "scheduler: crawl not queued"),
        }
    }
}
