//! Crawl run options and the run state record owned by the orchestrator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::CoreError;

pub const DEFAULT_CONCURRENCY: usize = 2;
pub const MAX_CONCURRENCY: usize = 16;
pub const DEFAULT_DELAY_SECONDS: f64 = 1.0;
pub const MAX_DELAY_SECONDS: f64 = 60.0;

/// Options as they arrive from a caller (admin request body, CLI flags).
/// Every field is optional; [`CrawlOptionsRequest::validate`] applies the
/// defaults and bounds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CrawlOptionsRequest {
    #[serde(default)]
    pub max_pages: Option<usize>,
    #[serde(default)]
    pub concurrency: Option<usize>,
    #[serde(default, alias = "delay")]
    pub delay_seconds: Option<f64>,
    #[serde(default)]
    pub cache_responses: Option<bool>,
    #[serde(default)]
    pub fetch_details: Option<bool>,
}

/// Validated options for one crawl run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlOptions {
    /// Upper bound on listing pages fetched; `None` crawls until pagination ends.
    pub max_pages: Option<usize>,
    /// Number of page tasks allowed in flight at once.
    pub concurrency: usize,
    /// Politeness delay slept before every request.
    pub delay_seconds: f64,
    /// Memoize fetched bodies by URL for the lifetime of the run.
    pub cache_responses: bool,
    /// Follow each record's detail link for description, specifications and
    /// extra images.
    #[serde(default)]
    pub fetch_details: bool,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            max_pages: None,
            concurrency: DEFAULT_CONCURRENCY,
            delay_seconds: DEFAULT_DELAY_SECONDS,
            cache_responses: false,
            fetch_details: false,
        }
    }
}

impl CrawlOptions {
    #[must_use]
    pub fn delay(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(self.delay_seconds)
    }
}

impl CrawlOptionsRequest {
    /// Applies defaults and rejects out-of-range values.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidOption`] naming the first offending field.
    pub fn validate(&self) -> Result<CrawlOptions, CoreError> {
        if self.max_pages == Some(0) {
            return Err(CoreError::InvalidOption {
                option: "max_pages",
                reason: "must be at least 1 when set".to_string(),
            });
        }

        let concurrency = self.concurrency.unwrap_or(DEFAULT_CONCURRENCY);
        if !(1..=MAX_CONCURRENCY).contains(&concurrency) {
            return Err(CoreError::InvalidOption {
                option: "concurrency",
                reason: format!("must be between 1 and {MAX_CONCURRENCY}, got {concurrency}"),
            });
        }

        let delay_seconds = self.delay_seconds.unwrap_or(DEFAULT_DELAY_SECONDS);
        if !delay_seconds.is_finite() || !(0.0..=MAX_DELAY_SECONDS).contains(&delay_seconds) {
            return Err(CoreError::InvalidOption {
                option: "delay_seconds",
                reason: format!("must be between 0 and {MAX_DELAY_SECONDS}, got {delay_seconds}"),
            });
        }

        Ok(CrawlOptions {
            max_pages: self.max_pages,
            concurrency,
            delay_seconds,
            cache_responses: self.cache_responses.unwrap_or(false),
            fetch_details: self.fetch_details.unwrap_or(false),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Queued,
    Running,
    Retrying,
    Succeeded,
    Discarded,
}

impl RunStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Queued => "queued",
            RunStatus::Running => "running",
            RunStatus::Retrying => "retrying",
            RunStatus::Succeeded => "succeeded",
            RunStatus::Discarded => "discarded",
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Succeeded | RunStatus::Discarded)
    }

    /// Whether the state machine permits moving from `self` to `next`.
    #[must_use]
    pub fn can_transition_to(self, next: RunStatus) -> bool {
        matches!(
            (self, next),
            (RunStatus::Queued, RunStatus::Running | RunStatus::Discarded)
                | (
                    RunStatus::Running,
                    RunStatus::Succeeded | RunStatus::Retrying | RunStatus::Discarded
                )
                | (RunStatus::Retrying, RunStatus::Running | RunStatus::Discarded)
        )
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One requested crawl, tracked from enqueue to a terminal status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlRunState {
    pub run_id: Uuid,
    pub crawler_name: String,
    pub options: CrawlOptions,
    /// 1-based attempt number of the current (or last) execution.
    pub attempt: u32,
    pub status: RunStatus,
    pub last_error: Option<String>,
    pub requested_at: DateTime<Utc>,
}

impl CrawlRunState {
    #[must_use]
    pub fn new(crawler_name: impl Into<String>, options: CrawlOptions) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            crawler_name: crawler_name.into(),
            options,
            attempt: 1,
            status: RunStatus::Queued,
            last_error: None,
            requested_at: Utc::now(),
        }
    }

    /// Moves the run to `next`. Re-entering `Running` from `Retrying`
    /// increments the attempt counter.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::IllegalTransition`] when the state machine does
    /// not allow the move; the state is left unchanged.
    pub fn transition(&mut self, next: RunStatus) -> Result<(), CoreError> {
        if !self.status.can_transition_to(next) {
            return Err(CoreError::IllegalTransition {
                from: self.status,
                to: next,
            });
        }
        if self.status == RunStatus::Retrying && next == RunStatus::Running {
            self.attempt += 1;
        }
        self.status = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_request_yields_defaults() {
        let opts = CrawlOptionsRequest::default().validate().unwrap();
        assert_eq!(opts, CrawlOptions::default());
        assert_eq!(opts.concurrency, 2);
        assert!((opts.delay_seconds - 1.0).abs() < f64::EPSILON);
        assert!(opts.max_pages.is_none());
        assert!(!opts.cache_responses);
        assert!(!opts.fetch_details);
    }

    #[test]
    fn stored_options_without_detail_flag_deserialize() {
        let opts: CrawlOptions = serde_json::from_str(
            r#"{"max_pages": null, "concurrency": 2, "delay_seconds": 1.0, "cache_responses": true}"#,
        )
        .unwrap();
        assert!(opts.cache_responses);
        assert!(!opts.fetch_details);
    }

    #[test]
    fn rejects_zero_max_pages() {
        let req = CrawlOptionsRequest {
            max_pages: Some(0),
            ..Default::default()
        };
        let err = req.validate().unwrap_err();
        assert!(matches!(err, CoreError::InvalidOption { option: "max_pages", .. }));
    }

    #[test]
    fn rejects_out_of_range_concurrency() {
        for concurrency in [0, MAX_CONCURRENCY + 1] {
            let req = CrawlOptionsRequest {
                concurrency: Some(concurrency),
                ..Default::default()
            };
            let err = req.validate().unwrap_err();
            assert!(matches!(err, CoreError::InvalidOption { option: "concurrency", .. }));
        }
    }

    #[test]
    fn rejects_negative_and_non_finite_delay() {
        for delay in [-0.5, f64::NAN, f64::INFINITY, 61.0] {
            let req = CrawlOptionsRequest {
                delay_seconds: Some(delay),
                ..Default::default()
            };
            assert!(req.validate().is_err(), "delay {delay} should be rejected");
        }
    }

    #[test]
    fn deserializes_legacy_delay_key() {
        let req: CrawlOptionsRequest =
            serde_json::from_str(r#"{"max_pages": 10, "delay": 0.25}"#).unwrap();
        let opts = req.validate().unwrap();
        assert_eq!(opts.max_pages, Some(10));
        assert!((opts.delay_seconds - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn rejects_unknown_option_keys() {
        let result = serde_json::from_str::<CrawlOptionsRequest>(r#"{"threads": 4}"#);
        assert!(result.is_err());
    }

    #[test]
    fn new_run_starts_queued_on_attempt_one() {
        let run = CrawlRunState::new("fire_mountain_gems", CrawlOptions::default());
        assert_eq!(run.status, RunStatus::Queued);
        assert_eq!(run.attempt, 1);
        assert!(run.last_error.is_none());
    }

    #[test]
    fn retry_cycle_increments_attempt() {
        let mut run = CrawlRunState::new("fire_mountain_gems", CrawlOptions::default());
        run.transition(RunStatus::Running).unwrap();
        run.transition(RunStatus::Retrying).unwrap();
        run.transition(RunStatus::Running).unwrap();
        assert_eq!(run.attempt, 2);
        run.transition(RunStatus::Succeeded).unwrap();
        assert!(run.status.is_terminal());
    }

    #[test]
    fn terminal_states_reject_further_transitions() {
        let mut run = CrawlRunState::new("fire_mountain_gems", CrawlOptions::default());
        run.transition(RunStatus::Running).unwrap();
        run.transition(RunStatus::Discarded).unwrap();
        for next in [
            RunStatus::Queued,
            RunStatus::Running,
            RunStatus::Retrying,
            RunStatus::Succeeded,
        ] {
            let err = run.transition(next).unwrap_err();
            assert!(matches!(err, CoreError::IllegalTransition { .. }));
        }
        assert_eq!(run.status, RunStatus::Discarded);
    }

    #[test]
    fn queued_cannot_jump_to_succeeded() {
        assert!(!RunStatus::Queued.can_transition_to(RunStatus::Succeeded));
        assert!(!RunStatus::Queued.can_transition_to(RunStatus::Retrying));
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&RunStatus::Discarded).unwrap(),
            "\"discarded\""
        );
        assert_eq!(RunStatus::Retrying.to_string(), "retrying");
    }
}
