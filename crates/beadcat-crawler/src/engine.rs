//! The crawl engine.
//!
//! A run moves through
//! `Idle → Discovering → Fetching → Enriching → Aggregating → Done`.
//! Discovery fetches the seed page and asks the crawler for listing pages;
//! fetching works through the frontier with at most `concurrency` page tasks
//! in flight and folds every page's records into one set keyed by product
//! code. When `fetch_details` is set, enriching follows each record's detail
//! link under the same concurrency bound. Page-level and tile-level failures
//! are recorded as skips, and a failed detail page only leaves its record
//! without detail. Only a failed seed fetch or cancellation aborts the run.

use std::collections::BTreeMap;
use std::sync::Mutex;

use beadcat_core::{CrawlOptions, ParsedProductRecord, ProductDetail};
use futures::stream::{FuturesUnordered, StreamExt};
use reqwest::Url;
use scraper::Html;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::{CrawlError, FetchError, SkipKind, SkipReason};
use crate::extract::DetailExtractor;
use crate::fetch::PageSource;
use crate::pagination::Frontier;
use crate::sites::SiteCrawler;
use crate::taxonomy::TaxonomyCache;
use crate::types::FetchedPage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlPhase {
    Idle,
    Discovering,
    Fetching,
    Enriching,
    Aggregating,
    Done,
}

/// An item left out of the output, with the reason it was dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipEntry {
    /// Detail URL, page URL, or `page#tile-N` for tiles without a link.
    pub item_ref: String,
    pub kind: SkipKind,
    pub reason: String,
}

impl SkipEntry {
    fn new(item_ref: String, reason: &SkipReason) -> Self {
        Self {
            item_ref,
            kind: reason.kind(),
            reason: reason.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlOutput {
    pub crawler: String,
    /// One record per product code, ordered by code.
    pub records: Vec<ParsedProductRecord>,
    /// Ordered by `item_ref`, then `reason`.
    pub skipped: Vec<SkipEntry>,
    pub pages_fetched: usize,
    pub pages_failed: usize,
    /// Records dropped because another page carried the same product code.
    pub duplicates: usize,
    #[serde(default)]
    pub details_fetched: usize,
    #[serde(default)]
    pub details_failed: usize,
}

impl CrawlOutput {
    #[must_use]
    pub fn skip_counts(&self) -> BTreeMap<SkipKind, usize> {
        let mut counts = BTreeMap::new();
        for entry in &self.skipped {
            *counts.entry(entry.kind).or_insert(0) += 1;
        }
        counts
    }
}

/// Everything one listing page contributed.
#[derive(Debug, Default)]
struct PageHarvest {
    records: Vec<ParsedProductRecord>,
    skipped: Vec<SkipEntry>,
    next_pages: Vec<Url>,
}

#[derive(Debug, Default)]
struct Aggregate {
    by_code: BTreeMap<String, ParsedProductRecord>,
    skipped: Vec<SkipEntry>,
    pages_fetched: usize,
    pages_failed: usize,
    duplicates: usize,
    details_fetched: usize,
    details_failed: usize,
}

impl Aggregate {
    fn absorb(&mut self, harvest: PageHarvest, frontier: &mut Frontier) {
        self.pages_fetched += 1;
        self.skipped.extend(harvest.skipped);
        for record in harvest.records {
            self.insert(record);
        }
        for next in harvest.next_pages {
            frontier.push(next);
        }
    }

    /// Same-code records collapse to the one with the smallest
    /// `(source_url, name)`, so the result does not depend on page order.
    fn insert(&mut self, record: ParsedProductRecord) {
        match self.by_code.get_mut(&record.product_code) {
            None => {
                self.by_code.insert(record.product_code.clone(), record);
            }
            Some(existing) => {
                self.duplicates += 1;
                if (&record.source_url, &record.name) < (&existing.source_url, &existing.name) {
                    *existing = record;
                }
            }
        }
    }

    fn page_failed(&mut self, url: &Url, err: FetchError) {
        self.pages_failed += 1;
        self.skipped
            .push(SkipEntry::new(url.to_string(), &SkipReason::Fetch(err)));
    }

    /// Detail links of every record, keyed by product code.
    fn detail_targets(&self) -> Vec<(String, Url)> {
        self.by_code
            .values()
            .filter_map(|record| {
                let url = Url::parse(&record.source_url).ok()?;
                Some((record.product_code.clone(), url))
            })
            .collect()
    }

    fn attach_detail(&mut self, product_code: &str, detail: ProductDetail) {
        self.details_fetched += 1;
        if detail.is_empty() {
            return;
        }
        if let Some(record) = self.by_code.get_mut(product_code) {
            record.detail = Some(detail);
        }
    }

    fn finish(mut self, crawler: &str) -> CrawlOutput {
        self.skipped.sort_by(|a, b| {
            (&a.item_ref, &a.reason).cmp(&(&b.item_ref, &b.reason))
        });
        CrawlOutput {
            crawler: crawler.to_string(),
            records: self.by_code.into_values().collect(),
            skipped: self.skipped,
            pages_fetched: self.pages_fetched,
            pages_failed: self.pages_failed,
            duplicates: self.duplicates,
            details_fetched: self.details_fetched,
            details_failed: self.details_failed,
        }
    }
}

fn discover_listings(crawler: &dyn SiteCrawler, seed: &FetchedPage) -> Vec<Url> {
    let document = Html::parse_document(&seed.body);
    crawler.discover(&document, &seed.url)
}

fn harvest_listing(
    crawler: &dyn SiteCrawler,
    page: &FetchedPage,
    taxonomy: &TaxonomyCache,
) -> PageHarvest {
    let document = Html::parse_document(&page.body);
    let extractor = crawler.extractor();
    let mut harvest = PageHarvest {
        next_pages: extractor.next_pages(&document, &page.url),
        ..PageHarvest::default()
    };

    for tile in extractor.tiles(&document, &page.url) {
        let (item_ref, outcome) = match tile {
            Ok(tile) => (tile.detail_link.to_string(), crawler.normalize(tile, taxonomy)),
            Err(err) => (err.item_ref(), Err(SkipReason::Extraction(err))),
        };
        match outcome {
            Ok(record) => harvest.records.push(record),
            Err(reason) => {
                tracing::debug!(item = %item_ref, reason = %reason, "skipping item");
                harvest.skipped.push(SkipEntry::new(item_ref, &reason));
            }
        }
    }
    harvest
}

fn read_detail(details: &DetailExtractor, page: &FetchedPage) -> ProductDetail {
    let document = Html::parse_document(&page.body);
    details.detail(&document, &page.url)
}

/// Drives one [`SiteCrawler`] over a [`PageSource`].
pub struct CrawlEngine<P> {
    source: P,
    phase: Mutex<CrawlPhase>,
}

impl<P: PageSource> CrawlEngine<P> {
    pub fn new(source: P) -> Self {
        Self {
            source,
            phase: Mutex::new(CrawlPhase::Idle),
        }
    }

    #[must_use]
    pub fn phase(&self) -> CrawlPhase {
        *self
            .phase
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn enter(&self, crawler: &str, phase: CrawlPhase) {
        *self
            .phase
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = phase;
        tracing::debug!(crawler, ?phase, "crawl phase");
    }

    /// Crawls `crawler` from its seed URL.
    ///
    /// # Errors
    ///
    /// - [`CrawlError::Discovery`] if the seed page cannot be fetched.
    /// - [`CrawlError::Cancelled`] if `cancel` fires before the run completes;
    ///   pages already in flight are allowed to finish first.
    pub async fn run(
        &self,
        crawler: &dyn SiteCrawler,
        options: &CrawlOptions,
        taxonomy: &TaxonomyCache,
        cancel: &CancellationToken,
    ) -> Result<CrawlOutput, CrawlError> {
        let name = crawler.name();
        if cancel.is_cancelled() {
            return Err(CrawlError::Cancelled);
        }

        self.enter(name, CrawlPhase::Discovering);
        let seed_url = crawler.seed_url().clone();
        let seed = self
            .source
            .fetch(&seed_url)
            .await
            .map_err(|source| CrawlError::Discovery {
                crawler: name.to_string(),
                source,
            })?;

        let mut frontier = Frontier::new(options.max_pages);
        frontier.mark_fetched(&seed_url);
        frontier.mark_seen(&seed.url);
        let mut aggregate = Aggregate::default();

        let listings = discover_listings(crawler, &seed);
        if listings.is_empty() {
            tracing::info!(crawler = name, "no listing links on seed page, treating seed as listing");
            aggregate.absorb(harvest_listing(crawler, &seed, taxonomy), &mut frontier);
        } else {
            tracing::info!(crawler = name, listings = listings.len(), "discovered listing pages");
            aggregate.pages_fetched += 1;
            for url in listings {
                frontier.push(url);
            }
        }

        self.enter(name, CrawlPhase::Fetching);
        let mut in_flight = FuturesUnordered::new();
        loop {
            while in_flight.len() < options.concurrency && !cancel.is_cancelled() {
                let Some(url) = frontier.pop() else {
                    break;
                };
                in_flight.push(self.fetch_listing(crawler, url, taxonomy));
            }
            let Some((url, result)) = in_flight.next().await else {
                break;
            };
            match result {
                Ok(harvest) => aggregate.absorb(harvest, &mut frontier),
                Err(err) => {
                    tracing::warn!(crawler = name, url = %url, error = %err, "listing page fetch failed");
                    aggregate.page_failed(&url, err);
                }
            }
        }

        if cancel.is_cancelled() {
            return Err(self.cancelled(name, &aggregate));
        }

        if let (true, Some(details)) = (options.fetch_details, crawler.details()) {
            self.enter(name, CrawlPhase::Enriching);
            self.enrich(name, details, &mut aggregate, options, cancel)
                .await;
            if cancel.is_cancelled() {
                return Err(self.cancelled(name, &aggregate));
            }
        }

        self.enter(name, CrawlPhase::Aggregating);
        let output = aggregate.finish(name);
        tracing::info!(
            crawler = name,
            records = output.records.len(),
            skipped = output.skipped.len(),
            pages_fetched = output.pages_fetched,
            pages_failed = output.pages_failed,
            duplicates = output.duplicates,
            details_fetched = output.details_fetched,
            details_failed = output.details_failed,
            "crawl finished"
        );
        self.enter(name, CrawlPhase::Done);
        Ok(output)
    }

    fn cancelled(&self, name: &str, aggregate: &Aggregate) -> CrawlError {
        tracing::info!(
            crawler = name,
            pages_fetched = aggregate.pages_fetched,
            "crawl cancelled"
        );
        self.enter(name, CrawlPhase::Done);
        CrawlError::Cancelled
    }

    /// Fetches every record's detail page with at most `concurrency` in
    /// flight. Stops scheduling new pages once `cancel` fires.
    async fn enrich(
        &self,
        name: &str,
        details: &DetailExtractor,
        aggregate: &mut Aggregate,
        options: &CrawlOptions,
        cancel: &CancellationToken,
    ) {
        let mut pending = aggregate.detail_targets().into_iter();
        tracing::info!(crawler = name, products = pending.len(), "fetching product details");

        let mut in_flight = FuturesUnordered::new();
        loop {
            while in_flight.len() < options.concurrency && !cancel.is_cancelled() {
                let Some((code, url)) = pending.next() else {
                    break;
                };
                in_flight.push(self.fetch_detail(details, code, url));
            }
            let Some((code, url, result)) = in_flight.next().await else {
                break;
            };
            match result {
                Ok(detail) => aggregate.attach_detail(&code, detail),
                Err(err) => {
                    tracing::warn!(crawler = name, url = %url, error = %err, "detail page fetch failed");
                    aggregate.details_failed += 1;
                }
            }
        }
    }

    async fn fetch_detail(
        &self,
        details: &DetailExtractor,
        code: String,
        url: Url,
    ) -> (String, Url, Result<ProductDetail, FetchError>) {
        let result = self
            .source
            .fetch(&url)
            .await
            .map(|page| read_detail(details, &page));
        (code, url, result)
    }

    async fn fetch_listing(
        &self,
        crawler: &dyn SiteCrawler,
        url: Url,
        taxonomy: &TaxonomyCache,
    ) -> (Url, Result<PageHarvest, FetchError>) {
        match self.source.fetch(&url).await {
            Ok(page) => {
                let harvest = harvest_listing(crawler, &page, taxonomy);
                (url, Ok(harvest))
            }
            Err(err) => (url, Err(err)),
        }
    }
}

#[cfg(test)]
#[path = "engine_test.rs"]
mod tests;
