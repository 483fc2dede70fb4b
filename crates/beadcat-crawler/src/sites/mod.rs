//! Vendor crawlers and the registry that names them.
//!
//! Each site module supplies a seed URL, a discovery rule for the seed page,
//! tile selectors, optional detail-page selectors and a [`VendorProfile`].
//! The engine drives all of them the same way.

mod fire_mountain_gems;
mod miyuki_wholesale;

use std::sync::Arc;

use beadcat_core::ParsedProductRecord;
use reqwest::Url;
use scraper::Html;

use crate::error::{CrawlError, SkipReason, UnknownCrawlerError};
use crate::extract::{DetailExtractor, ProductExtractor};
use crate::normalize::{normalize_tile, VendorProfile};
use crate::taxonomy::TaxonomyCache;
use crate::types::RawProductTile;

pub use fire_mountain_gems::FireMountainGems;
pub use miyuki_wholesale::MiyukiWholesale;

pub trait SiteCrawler: Send + Sync {
    fn name(&self) -> &'static str;

    fn seed_url(&self) -> &Url;

    /// Listing pages linked from the seed page. An empty result means the
    /// seed page is itself the (first) listing page.
    fn discover(&self, seed: &Html, seed_url: &Url) -> Vec<Url>;

    fn extractor(&self) -> &ProductExtractor;

    /// Reader for product detail pages, when the vendor's are worth fetching.
    fn details(&self) -> Option<&DetailExtractor> {
        None
    }

    fn profile(&self) -> &VendorProfile;

    /// # Errors
    ///
    /// Returns a [`SkipReason`] when the tile is outside this crawler's scope.
    fn normalize(
        &self,
        tile: RawProductTile,
        taxonomy: &TaxonomyCache,
    ) -> Result<ParsedProductRecord, SkipReason> {
        normalize_tile(tile, self.profile(), taxonomy)
    }
}

type Constructor = fn() -> Result<Arc<dyn SiteCrawler>, CrawlError>;

const REGISTRY: &[(&str, Constructor)] = &[
    (fire_mountain_gems::NAME, fire_mountain_gems::build),
    (miyuki_wholesale::NAME, miyuki_wholesale::build),
];

/// Names of every registered crawler, in registry order.
#[must_use]
pub fn crawler_names() -> Vec<&'static str> {
    REGISTRY.iter().map(|(name, _)| *name).collect()
}

#[must_use]
pub fn is_registered(name: &str) -> bool {
    REGISTRY.iter().any(|(known, _)| *known == name)
}

/// Builds the crawler registered under `name`.
///
/// # Errors
///
/// Returns [`ResolveError::Unknown`] for unregistered names and
/// [`ResolveError::Build`] if the crawler's selectors fail to compile.
pub fn resolve(name: &str) -> Result<Arc<dyn SiteCrawler>, ResolveError> {
    let (_, build) = REGISTRY
        .iter()
        .find(|(known, _)| *known == name)
        .ok_or_else(|| UnknownCrawlerError {
            name: name.to_string(),
        })?;
    Ok(build()?)
}

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error(transparent)]
    Unknown(#[from] UnknownCrawlerError),

    #[error(transparent)]
    Build(#[from] CrawlError),
}

/// Same-host links matched by `selector` on `page`, deduplicated in order.
pub(crate) fn same_host_links(
    page: &Html,
    page_url: &Url,
    selector: &scraper::Selector,
    keep: impl Fn(&Url, &str) -> bool,
) -> Vec<Url> {
    let mut out: Vec<Url> = Vec::new();
    for anchor in page.select(selector) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let Ok(mut url) = page_url.join(href.trim()) else {
            continue;
        };
        url.set_fragment(None);
        if url.host_str() != page_url.host_str() || url == *page_url {
            continue;
        }
        let text = anchor.text().collect::<String>();
        if !keep(&url, text.trim()) {
            continue;
        }
        if !out.contains(&url) {
            out.push(url);
        }
    }
    out
}
