use std::sync::Arc;

use reqwest::Url;
use scraper::{Html, Selector};

use super::{same_host_links, SiteCrawler};
use crate::code::DELICA;
use crate::error::CrawlError;
use crate::extract::{compile, DetailExtractor, DetailSelectors, ProductExtractor, TileSelectors};
use crate::normalize::VendorProfile;

pub(super) const NAME: &str = "fire_mountain_gems";

const SEED_URL: &str = "https://www.firemountaingems.com/beads/beads-by-brand/miyuki/";

const SELECTORS: TileSelectors = TileSelectors {
    tile: ".product-tile",
    require: None,
    link: Some(".link"),
    name: Some("h3.name"),
    image: Some("img.tile-image"),
    price: Some(".pricebooks .pricebook:first-child .price"),
    next_page: Some("a.page-link-next"),
};

const DETAIL_SELECTORS: DetailSelectors = DetailSelectors {
    description: Some(".product-description"),
    spec_items: Some(".product-specs li"),
    spec_label: None,
    spec_value: None,
    images: Some(".product-image-thumbnails img"),
};

const PROFILE: VendorProfile = VendorProfile {
    brand_name: "Miyuki",
    codes: &DELICA,
    name_noise: &["Miyuki Delica"],
    name_suffixes: &["Product Title"],
};

/// Delica sub-category links under the Miyuki brand page.
const CATEGORY_LINKS: &str = r#"a[href*="/beads-by-brand/miyuki/"]"#;

/// Fire Mountain Gems' Miyuki brand listings.
#[derive(Debug)]
pub struct FireMountainGems {
    seed: Url,
    extractor: ProductExtractor,
    details: DetailExtractor,
    category_links: Selector,
}

pub(super) fn build() -> Result<Arc<dyn SiteCrawler>, CrawlError> {
    Ok(Arc::new(FireMountainGems::new()?))
}

impl FireMountainGems {
    /// # Errors
    ///
    /// Returns [`CrawlError`] if the built-in seed URL or selectors are invalid.
    pub fn new() -> Result<Self, CrawlError> {
        Self::with_seed(SEED_URL)
    }

    /// Same crawler rooted at a different seed, e.g. a local mirror.
    ///
    /// # Errors
    ///
    /// Returns [`CrawlError::InvalidSeedUrl`] if `seed` does not parse.
    pub fn with_seed(seed: &str) -> Result<Self, CrawlError> {
        let seed = Url::parse(seed).map_err(|e| CrawlError::InvalidSeedUrl {
            url: seed.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            seed,
            extractor: ProductExtractor::new(&SELECTORS)?,
            details: DetailExtractor::new(&DETAIL_SELECTORS)?,
            category_links: compile(CATEGORY_LINKS)?,
        })
    }
}

impl SiteCrawler for FireMountainGems {
    fn name(&self) -> &'static str {
        NAME
    }

    fn seed_url(&self) -> &Url {
        &self.seed
    }

    fn discover(&self, seed: &Html, seed_url: &Url) -> Vec<Url> {
        same_host_links(seed, seed_url, &self.category_links, |url, _| {
            url.path().to_ascii_lowercase().contains("delica")
        })
    }

    fn extractor(&self) -> &ProductExtractor {
        &self.extractor
    }

    fn details(&self) -> Option<&DetailExtractor> {
        Some(&self.details)
    }

    fn profile(&self) -> &VendorProfile {
        &PROFILE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxonomy::TaxonomyCache;

    const BRAND_PAGE: &str = r#"
        <nav>
          <a href="/beads/beads-by-brand/miyuki/delica-11-0/">Delica 11/0</a>
          <a href="/beads/beads-by-brand/miyuki/delica-15-0/">Delica 15/0</a>
          <a href="/beads/beads-by-brand/miyuki/delica-11-0/#top">Delica 11/0 again</a>
          <a href="/beads/beads-by-brand/miyuki/round-seed/">Round seed</a>
          <a href="https://elsewhere.example.com/beads/beads-by-brand/miyuki/delica/">Offsite</a>
        </nav>
    "#;

    const LISTING: &str = r#"
        <div class="product-tile">
          <a class="link" href="/itemdetails/H20-1234BD">
            <img class="tile-image" src="https://cdn.firemountaingems.com/db-123.jpg">
            <h3 class="name">DB-123 Miyuki Delica Silver Lined Crystal
              Product Title</h3>
          </a>
          <div class="pricebooks">
            <div class="pricebook"><span class="price">$3.45</span></div>
            <div class="pricebook"><span class="price">$2.99</span></div>
          </div>
        </div>
        <a class="page-link-next" href="?start=24">Next</a>
    "#;

    #[test]
    fn discovers_delica_categories_once() {
        let crawler = FireMountainGems::new().unwrap();
        let doc = Html::parse_document(BRAND_PAGE);
        let found = crawler.discover(&doc, crawler.seed_url());
        let paths: Vec<&str> = found.iter().map(Url::path).collect();
        assert_eq!(
            paths,
            vec![
                "/beads/beads-by-brand/miyuki/delica-11-0/",
                "/beads/beads-by-brand/miyuki/delica-15-0/",
            ]
        );
    }

    #[test]
    fn parses_listing_tile_with_first_pricebook() {
        let crawler = FireMountainGems::new().unwrap();
        let doc = Html::parse_document(LISTING);
        let page_url = crawler.seed_url().clone();
        let tile = crawler
            .extractor()
            .tiles(&doc, &page_url)
            .next()
            .unwrap()
            .unwrap();
        let record = crawler
            .normalize(
                tile,
                &TaxonomyCache::new(["Crystal"], ["Silver Lined"]),
            )
            .unwrap();
        assert_eq!(record.name, "DB-123 Miyuki Delica Silver Lined Crystal");
        assert_eq!(record.product_code, "DB-123");
        assert_eq!(record.price.map(|p| p.to_string()).as_deref(), Some("3.45"));
        assert_eq!(
            record.source_url,
            "https://www.firemountaingems.com/itemdetails/H20-1234BD"
        );

        let next = crawler.extractor().next_pages(&doc, &page_url);
        assert_eq!(next.len(), 1);
        assert_eq!(next[0].query(), Some("start=24"));
    }
}
