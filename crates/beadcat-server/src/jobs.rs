//! In-process crawl job queue.
//!
//! Admin requests and the scheduler submit queued runs; a single worker task
//! drains the queue and drives each run through the orchestrator, so at most
//! one crawl executes at a time.

use std::sync::Arc;

use beadcat_core::{AppConfig, ColorAliases, CrawlRunState};
use beadcat_crawler::{
    crawl_into_catalog, CatalogStore, ResponseCache, RunOrchestrator, RunOutcome, RunRecorder,
};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub const QUEUE_CAPACITY: usize = 32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum JobQueueError {
    #[error("crawl queue is full")]
    Full,
    #[error("crawl worker is not running")]
    Closed,
}

#[derive(Debug, Clone)]
pub struct JobQueue {
    tx: mpsc::Sender<CrawlRunState>,
}

impl JobQueue {
    #[must_use]
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<CrawlRunState>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Hands `run` to the worker without waiting for queue space.
    ///
    /// # Errors
    ///
    /// Returns [`JobQueueError::Full`] when the queue is at capacity and
    /// [`JobQueueError::Closed`] when the worker has stopped.
    pub fn submit(&self, run: CrawlRunState) -> Result<(), JobQueueError> {
        self.tx.try_send(run).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => JobQueueError::Full,
            mpsc::error::TrySendError::Closed(_) => JobQueueError::Closed,
        })
    }
}

/// Everything the worker needs to execute a run.
pub struct Worker<R, S> {
    pub config: Arc<AppConfig>,
    pub orchestrator: RunOrchestrator<R>,
    pub store: S,
    pub aliases: ColorAliases,
}

impl<R: RunRecorder, S: CatalogStore> Worker<R, S> {
    /// Executes queued runs one by one until `shutdown` fires or every
    /// [`JobQueue`] handle is dropped.
    pub async fn run(self, mut rx: mpsc::Receiver<CrawlRunState>, shutdown: CancellationToken) {
        loop {
            let run = tokio::select! {
                () = shutdown.cancelled() => break,
                next = rx.recv() => match next {
                    Some(run) => run,
                    None => break,
                },
            };
            self.execute(run).await;
        }
        tracing::info!("crawl worker stopped");
    }

    async fn execute(&self, mut run: CrawlRunState) {
        let config = self.config.as_ref();
        let (store, aliases) = (&self.store, &self.aliases);
        let cache = ResponseCache::new();
        let cache = &cache;

        let result = self
            .orchestrator
            .execute(&mut run, |state, token| {
                let state = state.clone();
                async move {
                    crawl_into_catalog(config, &state, cache, store, aliases, token).await
                }
            })
            .await;

        match result {
            Ok(RunOutcome::Succeeded(summary)) => tracing::info!(
                run_id = %run.run_id,
                crawler = %summary.crawler,
                records_found = summary.records_found,
                upserted = summary.upserted,
                created = summary.created,
                upsert_failures = summary.upsert_failures.len(),
                pages_fetched = summary.pages_fetched,
                pages_failed = summary.pages_failed,
                details_fetched = summary.details_fetched,
                details_failed = summary.details_failed,
                "crawl job finished"
            ),
            // The orchestrator already logged the discard.
            Ok(RunOutcome::Discarded(_)) => {}
            Err(e) => tracing::error!(
                run_id = %run.run_id,
                crawler = %run.crawler_name,
                error = %e,
                "crawl job could not be executed"
            ),
        }
    }
}
