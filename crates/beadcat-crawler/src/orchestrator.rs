//! Run-level retry and status tracking.
//!
//! A run is attempted up to `max_attempts` times. Between attempts the
//! orchestrator sleeps `backoff_base * 2^attempt`. Failures marked
//! non-retryable, an exhausted budget, or cancellation during backoff
//! discard the run. Every status change is handed to a [`RunRecorder`].

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use beadcat_core::{AppConfig, CoreError, CrawlOptions, CrawlRunState, RunStatus};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::error::{CrawlError, UnknownCrawlerError};
use crate::sites;

/// Why a single attempt failed, and whether another attempt may help.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct RunFailure {
    message: String,
    retryable: bool,
}

impl RunFailure {
    pub fn retryable(err: impl Display) -> Self {
        Self {
            message: err.to_string(),
            retryable: true,
        }
    }

    pub fn fatal(err: impl Display) -> Self {
        Self {
            message: err.to_string(),
            retryable: false,
        }
    }

    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.retryable
    }
}

impl From<CrawlError> for RunFailure {
    fn from(err: CrawlError) -> Self {
        let retryable = err.is_retryable();
        Self {
            message: err.to_string(),
            retryable,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            max_attempts: config.run_max_attempts,
            backoff_base: Duration::from_secs(config.run_backoff_base_secs),
        }
    }

    /// Wait after failed attempt number `attempt` (1-based).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff_base
            .saturating_mul(1u32 << attempt.min(16))
    }
}

/// Persists run state snapshots. Recording is best effort: implementations
/// log their own failures rather than failing the run.
pub trait RunRecorder: Send + Sync {
    fn record(&self, run: &CrawlRunState) -> impl Future<Output = ()> + Send;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRecorder;

impl RunRecorder for NoopRecorder {
    async fn record(&self, _run: &CrawlRunState) {}
}

#[derive(Debug)]
pub enum RunOutcome<T> {
    Succeeded(T),
    Discarded(RunFailure),
}

/// Validates `crawler_name` against the registry and builds a queued run.
///
/// # Errors
///
/// Returns [`UnknownCrawlerError`] if no crawler is registered under the name.
pub fn request_run(
    crawler_name: &str,
    options: CrawlOptions,
) -> Result<CrawlRunState, UnknownCrawlerError> {
    if !sites::is_registered(crawler_name) {
        return Err(UnknownCrawlerError {
            name: crawler_name.to_string(),
        });
    }
    Ok(CrawlRunState::new(crawler_name, options))
}

pub struct RunOrchestrator<R> {
    policy: RetryPolicy,
    recorder: R,
    cancel: CancellationToken,
}

impl<R: RunRecorder> RunOrchestrator<R> {
    pub fn new(policy: RetryPolicy, recorder: R, cancel: CancellationToken) -> Self {
        Self {
            policy,
            recorder,
            cancel,
        }
    }

    #[must_use]
    pub fn recorder(&self) -> &R {
        &self.recorder
    }

    /// Records a freshly requested run in its `queued` state.
    pub async fn enqueue(&self, run: &CrawlRunState) {
        self.recorder.record(run).await;
    }

    /// Executes `run` to a terminal status, calling `attempt` once per try.
    /// `attempt` receives the current run state and a cancellation token it
    /// should pass down to the crawl.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::IllegalTransition`] if `run` is not `queued`.
    pub async fn execute<T, F, Fut>(
        &self,
        run: &mut CrawlRunState,
        mut attempt: F,
    ) -> Result<RunOutcome<T>, CoreError>
    where
        F: FnMut(&CrawlRunState, CancellationToken) -> Fut,
        Fut: Future<Output = Result<T, RunFailure>>,
    {
        self.advance(run, RunStatus::Running).await?;

        loop {
            tracing::info!(
                run_id = %run.run_id,
                crawler = %run.crawler_name,
                attempt = run.attempt,
                "crawl attempt started"
            );

            let failure = match attempt(run, self.cancel.child_token()).await {
                Ok(value) => {
                    run.last_error = None;
                    self.advance(run, RunStatus::Succeeded).await?;
                    tracing::info!(
                        run_id = %run.run_id,
                        crawler = %run.crawler_name,
                        attempt = run.attempt,
                        "crawl run succeeded"
                    );
                    return Ok(RunOutcome::Succeeded(value));
                }
                Err(failure) => failure,
            };

            run.last_error = Some(failure.to_string());
            let exhausted = run.attempt >= self.policy.max_attempts;
            if !failure.is_retryable() || exhausted || self.cancel.is_cancelled() {
                return self.discard(run, failure).await;
            }

            self.advance(run, RunStatus::Retrying).await?;
            let delay = self.policy.delay_for(run.attempt);
            tracing::warn!(
                run_id = %run.run_id,
                crawler = %run.crawler_name,
                attempt = run.attempt,
                max_attempts = self.policy.max_attempts,
                delay_secs = delay.as_secs_f64(),
                error = %failure,
                "crawl attempt failed, retrying after backoff"
            );

            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = self.cancel.cancelled() => {
                    return self.discard(run, failure).await;
                }
            }
            self.advance(run, RunStatus::Running).await?;
        }
    }

    async fn advance(&self, run: &mut CrawlRunState, next: RunStatus) -> Result<(), CoreError> {
        run.transition(next)?;
        self.recorder.record(run).await;
        Ok(())
    }

    async fn discard<T>(
        &self,
        run: &mut CrawlRunState,
        failure: RunFailure,
    ) -> Result<RunOutcome<T>, CoreError> {
        self.advance(run, RunStatus::Discarded).await?;
        tracing::error!(
            run_id = %run.run_id,
            crawler = %run.crawler_name,
            attempt = run.attempt,
            retryable = failure.is_retryable(),
            error = %failure,
            "crawl run discarded"
        );
        Ok(RunOutcome::Discarded(failure))
    }
}

#[cfg(test)]
#[path = "orchestrator_test.rs"]
mod tests;
