mod api;
mod jobs;
mod middleware;
mod scheduler;

use std::sync::Arc;

use beadcat_crawler::{RetryPolicy, RunOrchestrator};
use beadcat_db::{PgCatalogStore, PgRunRecorder};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use crate::{
    api::{build_app, AppState},
    jobs::{JobQueue, Worker, QUEUE_CAPACITY},
    middleware::AuthState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Arc::new(beadcat_core::load_app_config()?);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = beadcat_db::PoolConfig::from_app_config(&config);
    let pool = beadcat_db::connect_pool(&config.database_url, pool_config).await?;
    beadcat_db::run_migrations(&pool).await?;

    let aliases = beadcat_core::configured_color_aliases(&config)?;
    let shutdown = CancellationToken::new();

    let (jobs, rx) = JobQueue::new(QUEUE_CAPACITY);
    let worker = Worker {
        config: Arc::clone(&config),
        orchestrator: RunOrchestrator::new(
            RetryPolicy::from_config(&config),
            PgRunRecorder::new(pool.clone()),
            shutdown.clone(),
        ),
        store: PgCatalogStore::new(pool.clone()),
        aliases,
    };
    let worker_handle = tokio::spawn(worker.run(rx, shutdown.clone()));

    let _scheduler =
        scheduler::build_scheduler(config.crawl_cron.as_deref(), pool.clone(), jobs.clone())
            .await?;

    let auth = AuthState::from_keys(
        config.api_keys.as_deref(),
        matches!(config.env, beadcat_core::Environment::Development),
    )?;
    let app = build_app(AppState { pool, jobs }, auth);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "beadcat server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    // In-flight pages finish; the current run ends as discarded.
    shutdown.cancel();
    if let Err(e) = worker_handle.await {
        tracing::error!(error = %e, "crawl worker panicked");
    }
    Ok(())
}

async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
    shutdown.cancel();
}
