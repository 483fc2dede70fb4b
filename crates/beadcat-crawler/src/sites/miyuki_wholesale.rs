use std::sync::Arc;

use reqwest::Url;
use scraper::{Html, Selector};

use super::{same_host_links, SiteCrawler};
use crate::code::DELICA;
use crate::error::CrawlError;
use crate::extract::{compile, DetailExtractor, DetailSelectors, ProductExtractor, TileSelectors};
use crate::normalize::VendorProfile;

pub(super) const NAME: &str = "miyuki_wholesale";

const SEED_URL: &str = "https://www.miyukiwholesale.com/miyuki/";

const SELECTORS: TileSelectors = TileSelectors {
    tile: r#"a[href*="/miyuki-"]"#,
    require: Some("img"),
    link: None,
    name: None,
    image: Some("img"),
    price: None,
    next_page: Some(r#"a[rel="next"]"#),
};

/// Product pages carry a WooCommerce attribute table (color group, finish,
/// glass group, plating, ...).
const DETAIL_SELECTORS: DetailSelectors = DetailSelectors {
    description: Some(".woocommerce-product-details__short-description"),
    spec_items: Some("tr.woocommerce-product-attributes-item"),
    spec_label: Some("th.woocommerce-product-attributes-item__label"),
    spec_value: Some("td.woocommerce-product-attributes-item__value"),
    images: Some(".woocommerce-product-gallery__image img"),
};

const PROFILE: VendorProfile = VendorProfile {
    brand_name: "Miyuki",
    codes: &DELICA,
    name_noise: &["Miyuki Delica", "Delica", "Miyuki"],
    name_suffixes: &[],
};

const CATEGORY_LINKS: &str = r#"a[href*="/miyuki/"]"#;

/// Catalog index pages that link to every product rather than a category.
const NON_CATEGORY_MARKERS: &[&str] = &[
    "miyuki_catalog",
    "miyukilist",
    "miyuki_bestsellers",
    "miyuki_colorrange",
    "miyuki_samecolor",
    "miyuki_colortypes",
];

const MIN_CATEGORY_NAME_LEN: usize = 3;

/// Miyuki's wholesale catalog, organized as category pages of image tiles.
#[derive(Debug)]
pub struct MiyukiWholesale {
    seed: Url,
    extractor: ProductExtractor,
    details: DetailExtractor,
    category_links: Selector,
}

pub(super) fn build() -> Result<Arc<dyn SiteCrawler>, CrawlError> {
    Ok(Arc::new(MiyukiWholesale::new()?))
}

impl MiyukiWholesale {
    /// # Errors
    ///
    /// Returns [`CrawlError`] if the built-in seed URL or selectors are invalid.
    pub fn new() -> Result<Self, CrawlError> {
        Self::with_seed(SEED_URL)
    }

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

impl SiteCrawler for MiyukiWholesale {
    fn name(&self) -> &'static str {
        NAME
    }

    fn seed_url(&self) -> &Url {
        &self.seed
    }

    fn discover(&self, seed: &Html, seed_url: &Url) -> Vec<Url> {
        same_host_links(seed, seed_url, &self.category_links, |url, text| {
            let path = url.path();
            !NON_CATEGORY_MARKERS.iter().any(|m| path.contains(m))
                && text.chars().count() >= MIN_CATEGORY_NAME_LEN
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
    use crate::error::SkipReason;
    use crate::taxonomy::TaxonomyCache;

    const INDEX_PAGE: &str = r#"
        <a href="/miyuki/delica/">Delica Beads</a>
        <a href="/miyuki/miyuki_catalog/">Full catalog</a>
        <a href="/miyuki/miyuki_bestsellers/">Best sellers</a>
        <a href="/miyuki/x/">X</a>
        <a href="/miyuki/round/">Round Rocailles</a>
    "#;

    const CATEGORY_PAGE: &str = r#"
        <a href="/miyuki-delica-11-0-db-0200/">
          <img src="/img/db0200.jpg" alt="Delica 11/0 Opaque White">
          Delica 11/0 Opaque White
        </a>
        <a href="/miyuki-round-11-0-rr-0402/"><img src="/img/rr.jpg">Round 11/0 White</a>
        <a href="/miyuki-delica-info/">Delica guide</a>
    "#;

    #[test]
    fn discovery_skips_index_pages_and_short_names() {
        let crawler = MiyukiWholesale::new().unwrap();
        let doc = Html::parse_document(INDEX_PAGE);
        let found = crawler.discover(&doc, crawler.seed_url());
        let paths: Vec<&str> = found.iter().map(Url::path).collect();
        assert_eq!(paths, vec!["/miyuki/delica/", "/miyuki/round/"]);
    }

    #[test]
    fn category_tiles_take_code_from_link() {
        let crawler = MiyukiWholesale::new().unwrap();
        let doc = Html::parse_document(CATEGORY_PAGE);
        let page_url = Url::parse("https://www.miyukiwholesale.com/miyuki/delica/").unwrap();
        let taxonomy = TaxonomyCache::new(["White"], ["Opaque"]);

        let tiles: Vec<_> = crawler
            .extractor()
            .tiles(&doc, &page_url)
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(tiles.len(), 2, "text-only links are not tiles");

        let mut results = tiles
            .into_iter()
            .map(|tile| crawler.normalize(tile, &taxonomy));
        let delica = results.next().unwrap().unwrap();
        assert_eq!(delica.product_code, "DB-0200");
        assert_eq!(delica.size, "11/0");
        assert_eq!(delica.color_names.iter().next().map(String::as_str), Some("White"));

        let round = results.next().unwrap();
        assert!(matches!(round, Err(SkipReason::UnsupportedCode(_))));
    }

    #[test]
    fn product_page_attributes_become_specifications() {
        let crawler = MiyukiWholesale::new().unwrap();
        let page = r#"
            <div class="woocommerce-product-gallery__image"><img src="/img/db0200-b.jpg"></div>
            <table class="woocommerce-product-attributes">
              <tr class="woocommerce-product-attributes-item woocommerce-product-attributes-item--attribute_pa_color-group">
                <th class="woocommerce-product-attributes-item__label">Color Group</th>
                <td class="woocommerce-product-attributes-item__value"><p>White</p></td>
              </tr>
              <tr class="woocommerce-product-attributes-item woocommerce-product-attributes-item--attribute_pa_finish">
                <th class="woocommerce-product-attributes-item__label">Finish</th>
                <td class="woocommerce-product-attributes-item__value"><p>Opaque</p></td>
              </tr>
            </table>
        "#;
        let url = Url::parse("https://www.miyukiwholesale.com/miyuki-delica-11-0-db-0200/").unwrap();
        let detail = crawler
            .details()
            .unwrap()
            .detail(&Html::parse_document(page), &url);

        assert_eq!(detail.specifications["Color Group"], "White");
        assert_eq!(detail.specifications["Finish"], "Opaque");
        assert_eq!(
            detail.additional_images,
            vec!["https://www.miyukiwholesale.com/img/db0200-b.jpg"]
        );
    }
}
