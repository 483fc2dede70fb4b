//! One crawl attempt end to end: taxonomy snapshot, crawl, catalog upsert.
//!
//! These functions are the `attempt` closures handed to
//! [`RunOrchestrator::execute`](crate::orchestrator::RunOrchestrator::execute).
//! The caller owns the [`ResponseCache`] so retried attempts reuse pages an
//! earlier attempt already fetched.

use std::collections::BTreeMap;

use beadcat_core::{AppConfig, ColorAliases, CrawlOptions, CrawlRunState};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::engine::{CrawlEngine, CrawlOutput};
use crate::error::SkipKind;
use crate::fetch::{FetcherSettings, HttpFetcher, PageSource, ResponseCache};
use crate::orchestrator::RunFailure;
use crate::sink::{load_taxonomy, CatalogStore, CatalogUpsertSink, UpsertFailure};
use crate::sites::{self, SiteCrawler};
use crate::taxonomy::TaxonomyCache;

/// Counts reported for a finished crawl-and-upsert attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub crawler: String,
    pub records_found: usize,
    pub upserted: usize,
    pub created: usize,
    pub upsert_failures: Vec<UpsertFailure>,
    pub skipped: BTreeMap<SkipKind, usize>,
    pub pages_fetched: usize,
    pub pages_failed: usize,
    pub details_fetched: usize,
    pub details_failed: usize,
}

/// Crawls `crawler` through `source` and upserts the results into `store`.
///
/// # Errors
///
/// Returns a retryable [`RunFailure`] if the taxonomy snapshot cannot be
/// loaded or the store fails mid-upsert, and whatever the engine reports for
/// crawl-level failures.
pub async fn crawl_site<P, S>(
    crawler: &dyn SiteCrawler,
    source: P,
    options: &CrawlOptions,
    store: &S,
    aliases: &ColorAliases,
    cancel: &CancellationToken,
) -> Result<RunSummary, RunFailure>
where
    P: PageSource,
    S: CatalogStore,
{
    let taxonomy = load_taxonomy(store).await.map_err(RunFailure::retryable)?;
    let output = CrawlEngine::new(source)
        .run(crawler, options, &taxonomy, cancel)
        .await?;

    let report = CatalogUpsertSink::new(store, aliases)
        .upsert_all(&output.records)
        .await
        .map_err(RunFailure::retryable)?;

    Ok(RunSummary {
        skipped: output.skip_counts(),
        crawler: output.crawler,
        records_found: output.records.len(),
        upserted: report.upserted,
        created: report.created,
        upsert_failures: report.failures,
        pages_fetched: output.pages_fetched,
        pages_failed: output.pages_failed,
        details_fetched: output.details_fetched,
        details_failed: output.details_failed,
    })
}

/// Resolves `run`'s crawler and runs [`crawl_site`] over HTTP.
///
/// # Errors
///
/// Unknown crawlers and HTTP client construction failures are fatal; the
/// rest follow [`crawl_site`].
pub async fn crawl_into_catalog<S: CatalogStore>(
    config: &AppConfig,
    run: &CrawlRunState,
    cache: &ResponseCache,
    store: &S,
    aliases: &ColorAliases,
    cancel: CancellationToken,
) -> Result<RunSummary, RunFailure> {
    let crawler = sites::resolve(&run.crawler_name).map_err(RunFailure::fatal)?;
    let settings = FetcherSettings::new(config, &run.options);
    let fetcher = HttpFetcher::with_cache(&settings, cache.clone()).map_err(RunFailure::fatal)?;
    crawl_site(crawler.as_ref(), fetcher, &run.options, store, aliases, &cancel).await
}

/// Crawls without touching the catalog, for export.
///
/// # Errors
///
/// Same classification as [`crawl_into_catalog`].
pub async fn crawl_only(
    config: &AppConfig,
    run: &CrawlRunState,
    cache: &ResponseCache,
    taxonomy: &TaxonomyCache,
    cancel: CancellationToken,
) -> Result<CrawlOutput, RunFailure> {
    let crawler = sites::resolve(&run.crawler_name).map_err(RunFailure::fatal)?;
    let settings = FetcherSettings::new(config, &run.options);
    let fetcher = HttpFetcher::with_cache(&settings, cache.clone()).map_err(RunFailure::fatal)?;
    Ok(CrawlEngine::new(fetcher)
        .run(crawler.as_ref(), &run.options, taxonomy, &cancel)
        .await?)
}
