//! Offline tests for beadcat-db pool configuration and row types.
//! These tests do not require a live database connection.

use beadcat_core::{AppConfig, Environment};
use beadcat_db::{CrawlRunRow, PoolConfig, SeedReport, STARTER_COLORS, STARTER_FINISHES};
use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

#[test]
fn pool_config_from_app_config_uses_core_values() {
    let app_config = AppConfig {
        database_url: "postgres://example".to_string(),
        env: Environment::Test,
        bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 3000),
        log_level: "info".to_string(),
        db_max_connections: 42,
        db_min_connections: 7,
        db_acquire_timeout_secs: 9,
        crawler_request_timeout_secs: 30,
        crawler_user_agent: "ua".to_string(),
        crawler_max_retries: 2,
        crawler_retry_backoff_base_ms: 500,
        run_max_attempts: 3,
        run_backoff_base_secs: 5,
        color_aliases_path: None,
        crawl_cron: None,
        api_keys: None,
    };

    let pool_config = PoolConfig::from_app_config(&app_config);
    assert_eq!(pool_config.max_connections, 42);
    assert_eq!(pool_config.min_connections, 7);
    assert_eq!(pool_config.acquire_timeout_secs, 9);
}

/// Compile-time smoke test: confirm that [`CrawlRunRow`] has all expected
/// fields with the correct types. No database required.
#[test]
fn crawl_run_row_has_expected_fields() {
    use chrono::Utc;
    use uuid::Uuid;

    let row = CrawlRunRow {
        id: 1_i64,
        public_id: Uuid::new_v4(),
        crawler_name: "fire_mountain_gems".to_string(),
        status: "queued".to_string(),
        attempt: 1_i32,
        options: serde_json::json!({"concurrency": 2}),
        error_message: None,
        requested_at: Utc::now(),
        completed_at: None,
        updated_at: Utc::now(),
    };

    assert_eq!(row.id, 1);
    assert_eq!(row.crawler_name, "fire_mountain_gems");
    assert_eq!(row.status, "queued");
    assert_eq!(row.options["concurrency"], 2);
    assert!(row.completed_at.is_none());
}

#[test]
fn seed_report_defaults_to_zero() {
    let report = SeedReport::default();
    assert_eq!(report.sizes, 0);
    assert_eq!(report.brand_id, 0);
}

#[test]
fn starter_taxonomy_has_no_case_insensitive_duplicates() {
    let colors: HashSet<String> = STARTER_COLORS.iter().map(|c| c.to_lowercase()).collect();
    let finishes: HashSet<String> = STARTER_FINISHES.iter().map(|f| f.to_lowercase()).collect();
    assert_eq!(colors.len(), STARTER_COLORS.len());
    assert_eq!(finishes.len(), STARTER_FINISHES.len());
    assert!(finishes.contains("silver lined"));
}
