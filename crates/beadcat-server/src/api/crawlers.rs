use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use beadcat_core::{CrawlOptionsRequest, CrawlRunState, RunStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::jobs::JobQueueError;
use crate::middleware::RequestId;

use super::{map_db_error, normalize_limit, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Serialize)]
pub(super) struct CrawlerItem {
    name: &'static str,
    seed_url: String,
}

#[derive(Debug, Serialize)]
pub(super) struct JobEnqueued {
    message: String,
    job_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub(super) struct CrawlRunsQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(super) struct CrawlRunItem {
    run_id: Uuid,
    crawler_name: String,
    status: String,
    attempt: i32,
    options: serde_json::Value,
    error_message: Option<String>,
    requested_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
}

impl From<beadcat_db::CrawlRunRow> for CrawlRunItem {
    fn from(row: beadcat_db::CrawlRunRow) -> Self {
        Self {
            run_id: row.public_id,
            crawler_name: row.crawler_name,
            status: row.status,
            attempt: row.attempt,
            options: row.options,
            error_message: row.error_message,
            requested_at: row.requested_at,
            completed_at: row.completed_at,
            updated_at: row.updated_at,
        }
    }
}

pub(super) async fn list_crawlers(
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<Vec<CrawlerItem>>>, ApiError> {
    let mut data = Vec::new();
    for name in beadcat_crawler::crawler_names() {
        let crawler = beadcat_crawler::resolve(name).map_err(|e| {
            tracing::error!(crawler = name, error = %e, "registered crawler failed to build");
            ApiError::new(req_id.0.clone(), "internal_error", "crawler registry error")
        })?;
        data.push(CrawlerItem {
            name,
            seed_url: crawler.seed_url().to_string(),
        });
    }

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// `POST /admin/crawlers/{name}/run`: validates the request, records the run
/// as queued and hands it to the worker.
pub(super) async fn run_crawler(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(name): Path<String>,
    body: Bytes,
) -> Result<(StatusCode, Json<ApiResponse<JobEnqueued>>), ApiError> {
    let request = parse_options(&body)
        .map_err(|e| ApiError::new(req_id.0.clone(), "validation_error", e))?;
    let options = request
        .validate()
        .map_err(|e| ApiError::new(req_id.0.clone(), "validation_error", e.to_string()))?;
    let mut run = beadcat_crawler::request_run(&name, options)
        .map_err(|e| ApiError::new(req_id.0.clone(), "bad_request", e.to_string()))?;

    beadcat_db::record_crawl_run(&state.pool, &run)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    if let Err(e) = state.jobs.submit(run.clone()) {
        discard_best_effort(&state, &mut run, &e).await;
        let code = match e {
            JobQueueError::Full => "queue_full",
            JobQueueError::Closed => "service_unavailable",
        };
        return Err(ApiError::new(req_id.0, code, e.to_string()));
    }

    tracing::info!(run_id = %run.run_id, crawler = %name, "crawl job enqueued");
    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse {
            data: JobEnqueued {
                message: format!("Crawler {name} job enqueued"),
                job_id: run.run_id,
            },
            meta: ResponseMeta::new(req_id.0),
        }),
    ))
}

pub(super) async fn list_crawl_runs(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<CrawlRunsQuery>,
) -> Result<Json<ApiResponse<Vec<CrawlRunItem>>>, ApiError> {
    let rows = beadcat_db::list_crawl_runs(&state.pool, normalize_limit(query.limit))
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: rows.into_iter().map(CrawlRunItem::from).collect(),
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn get_crawl_run(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(run_id): Path<Uuid>,
) -> Result<Json<ApiResponse<CrawlRunItem>>, ApiError> {
    let row = beadcat_db::get_crawl_run(&state.pool, run_id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?
        .ok_or_else(|| {
            ApiError::new(
                req_id.0.clone(),
                "not_found",
                format!("crawl run {run_id} not found"),
            )
        })?;

    Ok(Json(ApiResponse {
        data: CrawlRunItem::from(row),
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// An empty body means default options.
fn parse_options(body: &[u8]) -> Result<CrawlOptionsRequest, String> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(CrawlOptionsRequest::default());
    }
    serde_json::from_slice(body).map_err(|e| format!("invalid crawl options: {e}"))
}

/// Marks a run that never reached the worker as discarded so it does not sit
/// in `queued` forever.
async fn discard_best_effort(state: &AppState, run: &mut CrawlRunState, reason: &JobQueueError) {
    run.last_error = Some(reason.to_string());
    if run.transition(RunStatus::Discarded).is_err() {
        return;
    }
    if let Err(e) = beadcat_db::record_crawl_run(&state.pool, run).await {
        tracing::error!(run_id = %run.run_id, error = %e, "failed to mark unqueued run as discarded");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_body_yields_default_options() {
        assert_eq!(parse_options(b"").unwrap(), CrawlOptionsRequest::default());
        assert_eq!(parse_options(b"  \n").unwrap(), CrawlOptionsRequest::default());
    }

    #[test]
    fn body_fields_are_parsed() {
        let request = parse_options(br#"{"max_pages": 3, "cache_responses": true}"#).unwrap();
        assert_eq!(request.max_pages, Some(3));
        assert_eq!(request.cache_responses, Some(true));
    }

    #[test]
    fn malformed_body_is_reported() {
        let err = parse_options(b"{not json").unwrap_err();
        assert!(err.starts_with("invalid crawl options"));
    }

    #[test]
    fn crawl_run_item_is_serializable() {
        let item = CrawlRunItem {
            run_id: Uuid::new_v4(),
            crawler_name: "fire_mountain_gems".to_string(),
            status: "retrying".to_string(),
            attempt: 2,
            options: serde_json::json!({"concurrency": 2}),
            error_message: Some("seed page returned 503".to_string()),
            requested_at: Utc::now(),
            completed_at: None,
            updated_at: Utc::now(),
        };

        let json = serde_json::to_string(&item).expect("serialize crawl run");
        assert!(json.contains("\"crawler_name\":\"fire_mountain_gems\""));
        assert!(json.contains("\"attempt\":2"));
    }
}
