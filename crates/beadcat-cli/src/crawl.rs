//! `crawl`, `crawlers` and `import` command handlers.
//!
//! A crawl runs through the same orchestrator as server jobs, so retries and
//! run bookkeeping behave identically. With `--export` the records are
//! written to a JSON file instead of the catalog and no run is persisted;
//! `import` later loads such a file into the catalog without crawling.

use std::path::{Path, PathBuf};

use anyhow::Context;
use beadcat_core::{AppConfig, CrawlOptions, CrawlOptionsRequest};
use beadcat_crawler::{
    crawl_into_catalog, crawl_only, load_taxonomy, read_export, request_run, write_export,
    CatalogUpsertSink, NoopRecorder, ResponseCache, RetryPolicy, RunOrchestrator, RunOutcome,
    TaxonomyCache, UpsertFailure,
};
use beadcat_db::{PgCatalogStore, PgRunRecorder};
use clap::Args;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Args)]
pub struct CrawlArgs {
    /// Registered crawler name (see `crawlers`)
    pub name: String,

    /// Stop after this many pages, the seed page included
    #[arg(long)]
    pub max_pages: Option<usize>,

    /// Pages fetched concurrently
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Seconds to wait before each request
    #[arg(long = "delay")]
    pub delay_seconds: Option<f64>,

    /// Reuse fetched pages within the run, retries included
    #[arg(long)]
    pub cache_responses: bool,

    /// Also fetch each product's detail page
    #[arg(long)]
    pub details: bool,

    /// Write records and skips to this JSON file instead of the catalog
    #[arg(long)]
    pub export: Option<PathBuf>,
}

impl CrawlArgs {
    pub(crate) fn options(&self) -> anyhow::Result<CrawlOptions> {
        let request = CrawlOptionsRequest {
            max_pages: self.max_pages,
            concurrency: self.concurrency,
            delay_seconds: self.delay_seconds,
            cache_responses: Some(self.cache_responses),
            fetch_details: Some(self.details),
        };
        Ok(request.validate()?)
    }
}

pub(crate) fn print_crawlers() {
    for name in beadcat_crawler::crawler_names() {
        println!("{name}");
    }
}

pub(crate) async fn run_crawl(
    config: &AppConfig,
    args: &CrawlArgs,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let options = args.options()?;
    let run = request_run(&args.name, options)?;

    match &args.export {
        Some(path) => export(config, run, path, cancel).await,
        None => into_catalog(config, run, cancel).await,
    }
}

async fn into_catalog(
    config: &AppConfig,
    mut run: beadcat_core::CrawlRunState,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let aliases = beadcat_core::configured_color_aliases(config)?;
    let pool = crate::db::connect(config).await?;
    let store = PgCatalogStore::new(pool.clone());
    let orchestrator = RunOrchestrator::new(
        RetryPolicy::from_config(config),
        PgRunRecorder::new(pool),
        cancel,
    );

    orchestrator.enqueue(&run).await;
    let cache = ResponseCache::new();
    let outcome = orchestrator
        .execute(&mut run, |state, token| {
            let state = state.clone();
            let (cache, store, aliases) = (&cache, &store, &aliases);
            async move {
                crawl_into_catalog(config, &state, cache, store, aliases, token).await
            }
        })
        .await?;

    match outcome {
        RunOutcome::Succeeded(summary) => {
            println!(
                "{}: {} records found, {} upserted ({} new), {} pages fetched, {} failed",
                summary.crawler,
                summary.records_found,
                summary.upserted,
                summary.created,
                summary.pages_fetched,
                summary.pages_failed,
            );
            if summary.details_fetched + summary.details_failed > 0 {
                println!(
                    "  details: {} fetched, {} failed",
                    summary.details_fetched, summary.details_failed
                );
            }
            for (kind, count) in &summary.skipped {
                println!("  skipped {count} ({kind:?})");
            }
            print_upsert_failures(&summary.upsert_failures);
            Ok(())
        }
        RunOutcome::Discarded(failure) => {
            anyhow::bail!(
                "crawl run {} discarded after {} attempts: {failure}",
                run.run_id,
                run.attempt
            )
        }
    }
}

async fn export(
    config: &AppConfig,
    mut run: beadcat_core::CrawlRunState,
    path: &Path,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let taxonomy = export_taxonomy(config).await;
    let cache = ResponseCache::new();
    let orchestrator =
        RunOrchestrator::new(RetryPolicy::from_config(config), NoopRecorder, cancel);

    let outcome = orchestrator
        .execute(&mut run, |state, token| {
            let state = state.clone();
            let (cache, taxonomy) = (&cache, &taxonomy);
            async move { crawl_only(config, &state, cache, taxonomy, token).await }
        })
        .await?;

    match outcome {
        RunOutcome::Succeeded(output) => {
            write_export(path, &output)
                .with_context(|| format!("failed to export {}", output.crawler))?;
            println!(
                "exported {} records and {} skips to {}",
                output.records.len(),
                output.skipped.len(),
                path.display()
            );
            Ok(())
        }
        RunOutcome::Discarded(failure) => {
            anyhow::bail!("export crawl discarded after {} attempts: {failure}", run.attempt)
        }
    }
}

/// Colors and finishes from the catalog when it is reachable. Export still
/// works offline; every record then falls back to its residual color.
async fn export_taxonomy(config: &AppConfig) -> TaxonomyCache {
    let pool = match crate::db::connect(config).await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::warn!(error = %e, "catalog unavailable, exporting with an empty taxonomy");
            return TaxonomyCache::default();
        }
    };
    match load_taxonomy(&PgCatalogStore::new(pool)).await {
        Ok(taxonomy) => taxonomy,
        Err(e) => {
            tracing::warn!(error = %e, "failed to load taxonomy, exporting with an empty taxonomy");
            TaxonomyCache::default()
        }
    }
}

#[derive(Debug, Args)]
pub struct ImportArgs {
    /// JSON file written by `crawl --export`
    pub path: PathBuf,
}

/// Upserts the records of an earlier export into the catalog.
pub(crate) async fn run_import(config: &AppConfig, args: &ImportArgs) -> anyhow::Result<()> {
    let output = read_export(&args.path)?;
    let aliases = beadcat_core::configured_color_aliases(config)?;
    let pool = crate::db::connect(config).await?;
    let store = PgCatalogStore::new(pool);

    tracing::info!(
        crawler = %output.crawler,
        records = output.records.len(),
        path = %args.path.display(),
        "importing crawl export"
    );
    let report = CatalogUpsertSink::new(&store, &aliases)
        .upsert_all(&output.records)
        .await
        .with_context(|| format!("import of {} aborted", args.path.display()))?;

    println!(
        "{}: {} records imported, {} upserted ({} new)",
        output.crawler,
        output.records.len(),
        report.upserted,
        report.created,
    );
    print_upsert_failures(&report.failures);
    Ok(())
}

fn print_upsert_failures(failures: &[UpsertFailure]) {
    for failure in failures {
        println!("  upsert failed for {}: {}", failure.product_code, failure.reason);
    }
}
