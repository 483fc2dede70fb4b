//! Database operations for `crawl_runs`.

use beadcat_core::{CrawlRunState, RunStatus};
use beadcat_crawler::RunRecorder;
use chrono::{DateTime, Utc};
use sqlx::{types::Json, PgPool};
use uuid::Uuid;

use crate::DbError;

/// A row from the `crawl_runs` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CrawlRunRow {
    pub id: i64,
    pub public_id: Uuid,
    pub crawler_name: String,
    pub status: String,
    pub attempt: i32,
    pub options: serde_json::Value,
    pub error_message: Option<String>,
    pub requested_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

const RUN_COLUMNS: &str = "id, public_id, crawler_name, status, attempt, options, \
                           error_message, requested_at, completed_at, updated_at";

/// Writes the current state of `run`, inserting it on first sight.
///
/// A row that already reached `succeeded` or `discarded` is never
/// overwritten; `completed_at` is stamped when the run turns terminal.
///
/// # Errors
///
/// Returns [`DbError::InvalidRunTransition`] if the stored row is already
/// terminal, or [`DbError::Sqlx`] if the write fails.
pub async fn record_crawl_run(pool: &PgPool, run: &CrawlRunState) -> Result<(), DbError> {
    let attempt = i32::try_from(run.attempt).unwrap_or(i32::MAX);

    let result = sqlx::query(
        "INSERT INTO crawl_runs \
             (public_id, crawler_name, status, attempt, options, error_message, requested_at, completed_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, CASE WHEN $8 THEN NOW() END) \
         ON CONFLICT (public_id) DO UPDATE SET \
             status = EXCLUDED.status, \
             attempt = EXCLUDED.attempt, \
             error_message = EXCLUDED.error_message, \
             completed_at = EXCLUDED.completed_at, \
             updated_at = NOW() \
         WHERE crawl_runs.status NOT IN ('succeeded', 'discarded')",
    )
    .bind(run.run_id)
    .bind(&run.crawler_name)
    .bind(run.status.as_str())
    .bind(attempt)
    .bind(Json(&run.options))
    .bind(run.last_error.as_deref())
    .bind(run.requested_at)
    .bind(run.status.is_terminal())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        let status = get_crawl_run(pool, run.run_id)
            .await?
            .map_or_else(|| RunStatus::Queued.to_string(), |row| row.status);
        return Err(DbError::InvalidRunTransition {
            run_id: run.run_id,
            status,
        });
    }

    Ok(())
}

/// Lists the most recently requested runs, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_crawl_runs(pool: &PgPool, limit: i64) -> Result<Vec<CrawlRunRow>, DbError> {
    let rows = sqlx::query_as::<_, CrawlRunRow>(&format!(
        "SELECT {RUN_COLUMNS} FROM crawl_runs ORDER BY requested_at DESC, id DESC LIMIT $1"
    ))
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Fetches a run by its public UUID.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_crawl_run(pool: &PgPool, public_id: Uuid) -> Result<Option<CrawlRunRow>, DbError> {
    let row = sqlx::query_as::<_, CrawlRunRow>(&format!(
        "SELECT {RUN_COLUMNS} FROM crawl_runs WHERE public_id = $1"
    ))
    .bind(public_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Persists every run transition the orchestrator reports.
///
/// Write failures are logged and swallowed so bookkeeping never aborts a crawl.
#[derive(Debug, Clone)]
pub struct PgRunRecorder {
    pool: PgPool,
}

impl PgRunRecorder {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl RunRecorder for PgRunRecorder {
    async fn record(&self, run: &CrawlRunState) {
        if let Err(e) = record_crawl_run(&self.pool, run).await {
            tracing::error!(
                run_id = %run.run_id,
                crawler = %run.crawler_name,
                status = %run.status,
                error = %e,
                "failed to record crawl run"
            );
        }
    }
}
