//! Product tile extraction from listing pages.
//!
//! Selector strings live in per-site [`TileSelectors`] tables; a
//! [`ProductExtractor`] compiles them once and is reused for every page of a
//! run. Extraction never fails the page: a bad tile yields an
//! [`ExtractionError`] and the remaining tiles are still produced.
//!
//! Product detail pages are read by a [`DetailExtractor`] built from
//! [`DetailSelectors`]; every field there is optional.

use std::collections::BTreeMap;

use beadcat_core::ProductDetail;
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};

use crate::error::{CrawlError, ExtractionError};
use crate::taxonomy::collapse_whitespace;
use crate::types::RawProductTile;

/// CSS selectors describing one vendor's listing markup. Field selectors are
/// evaluated inside each tile; `None` means "the tile element itself".
#[derive(Debug, Clone, Copy)]
pub struct TileSelectors {
    pub tile: &'static str,
    /// Tiles without a match for this selector are ignored entirely.
    pub require: Option<&'static str>,
    pub link: Option<&'static str>,
    pub name: Option<&'static str>,
    pub image: Option<&'static str>,
    pub price: Option<&'static str>,
    /// Links to further listing pages (pagination).
    pub next_page: Option<&'static str>,
}

#[derive(Debug)]
pub struct ProductExtractor {
    tile: Selector,
    require: Option<Selector>,
    link: Option<Selector>,
    name: Option<Selector>,
    image: Option<Selector>,
    price: Option<Selector>,
    next_page: Option<Selector>,
}

pub(crate) fn compile(selector: &str) -> Result<Selector, CrawlError> {
    Selector::parse(selector).map_err(|e| CrawlError::Selector {
        selector: selector.to_string(),
        reason: e.to_string(),
    })
}

fn compile_opt(selector: Option<&str>) -> Result<Option<Selector>, CrawlError> {
    selector.map(compile).transpose()
}

fn element_text(element: ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<Vec<_>>().join(" "))
}

impl ProductExtractor {
    /// # Errors
    ///
    /// Returns [`CrawlError::Selector`] if any selector fails to parse.
    pub fn new(selectors: &TileSelectors) -> Result<Self, CrawlError> {
        Ok(Self {
            tile: compile(selectors.tile)?,
            require: compile_opt(selectors.require)?,
            link: compile_opt(selectors.link)?,
            name: compile_opt(selectors.name)?,
            image: compile_opt(selectors.image)?,
            price: compile_opt(selectors.price)?,
            next_page: compile_opt(selectors.next_page)?,
        })
    }

    /// Lazily yields one result per product tile in document order.
    pub fn tiles<'a>(
        &'a self,
        document: &'a Html,
        page_url: &'a Url,
    ) -> impl Iterator<Item = Result<RawProductTile, ExtractionError>> + 'a {
        document
            .select(&self.tile)
            .filter(move |tile| {
                self.require
                    .as_ref()
                    .is_none_or(|req| tile.select(req).next().is_some())
            })
            .enumerate()
            .map(move |(index, tile)| self.read_tile(index, tile, page_url))
    }

    /// Absolute URLs of further listing pages linked from `document`.
    #[must_use]
    pub fn next_pages(&self, document: &Html, page_url: &Url) -> Vec<Url> {
        let Some(selector) = &self.next_page else {
            return Vec::new();
        };
        document
            .select(selector)
            .filter_map(|a| a.value().attr("href"))
            .filter_map(|href| page_url.join(href.trim()).ok())
            .collect()
    }

    fn read_tile(
        &self,
        index: usize,
        tile: ElementRef<'_>,
        page_url: &Url,
    ) -> Result<RawProductTile, ExtractionError> {
        let image = self
            .image
            .as_ref()
            .and_then(|selector| tile.select(selector).next());

        let name = match &self.name {
            Some(selector) => tile.select(selector).next().map(element_text),
            None => Some(element_text(tile)),
        }
        .filter(|n| !n.is_empty())
        .or_else(|| {
            image
                .and_then(|img| img.value().attr("alt"))
                .map(collapse_whitespace)
                .filter(|alt| !alt.is_empty())
        });

        let link_element = match &self.link {
            Some(selector) => tile.select(selector).next(),
            None => Some(tile),
        };
        let detail_link = link_element
            .and_then(|el| el.value().attr("href"))
            .map(str::trim)
            .filter(|href| !href.is_empty() && !href.starts_with('#'))
            .and_then(|href| page_url.join(href).ok())
            .ok_or_else(|| ExtractionError::MissingLink {
                page: page_url.to_string(),
                index,
            })?;

        let name = name.ok_or_else(|| ExtractionError::MissingName {
            page: page_url.to_string(),
            index,
        })?;

        let image_link = image
            .and_then(|img| {
                img.value()
                    .attr("src")
                    .or_else(|| img.value().attr("data-src"))
            })
            .and_then(|src| page_url.join(src.trim()).ok());

        let price_text = self
            .price
            .as_ref()
            .and_then(|selector| tile.select(selector).next())
            .map(element_text)
            .filter(|p| !p.is_empty());

        Ok(RawProductTile {
            index,
            name,
            detail_link,
            image_link,
            price_text,
        })
    }
}

/// CSS selectors for a vendor's product detail page.
#[derive(Debug, Clone, Copy)]
pub struct DetailSelectors {
    pub description: Option<&'static str>,
    /// One element per specification entry.
    pub spec_items: Option<&'static str>,
    /// Label and value inside a spec item, for table layouts. When either is
    /// `None` the item's text is split on its first `:` instead.
    pub spec_label: Option<&'static str>,
    pub spec_value: Option<&'static str>,
    /// Gallery images beyond the listing thumbnail.
    pub images: Option<&'static str>,
}

#[derive(Debug)]
pub struct DetailExtractor {
    description: Option<Selector>,
    spec_items: Option<Selector>,
    spec_label: Option<Selector>,
    spec_value: Option<Selector>,
    images: Option<Selector>,
}

impl DetailExtractor {
    /// # Errors
    ///
    /// Returns [`CrawlError::Selector`] if any selector fails to parse.
    pub fn new(selectors: &DetailSelectors) -> Result<Self, CrawlError> {
        Ok(Self {
            description: compile_opt(selectors.description)?,
            spec_items: compile_opt(selectors.spec_items)?,
            spec_label: compile_opt(selectors.spec_label)?,
            spec_value: compile_opt(selectors.spec_value)?,
            images: compile_opt(selectors.images)?,
        })
    }

    /// Reads whatever the page offers; missing sections stay empty.
    #[must_use]
    pub fn detail(&self, document: &Html, page_url: &Url) -> ProductDetail {
        let description = self
            .description
            .as_ref()
            .and_then(|selector| document.select(selector).next())
            .map(element_text)
            .filter(|text| !text.is_empty());

        let mut specifications = BTreeMap::new();
        if let Some(items) = &self.spec_items {
            for item in document.select(items) {
                if let Some((label, value)) = self.spec_entry(item) {
                    specifications.entry(label).or_insert(value);
                }
            }
        }

        let mut additional_images: Vec<String> = Vec::new();
        if let Some(images) = &self.images {
            for img in document.select(images) {
                let src = img
                    .value()
                    .attr("src")
                    .or_else(|| img.value().attr("data-src"))
                    .map(str::trim)
                    .filter(|src| !src.is_empty());
                let Some(url) = src.and_then(|src| page_url.join(src).ok()) else {
                    continue;
                };
                let url = url.to_string();
                if !additional_images.contains(&url) {
                    additional_images.push(url);
                }
            }
        }

        ProductDetail {
            description,
            specifications,
            additional_images,
        }
    }

    fn spec_entry(&self, item: ElementRef<'_>) -> Option<(String, String)> {
        let (label, value) = match (&self.spec_label, &self.spec_value) {
            (Some(label), Some(value)) => (
                item.select(label).next().map(element_text)?,
                item.select(value).next().map(element_text)?,
            ),
            _ => {
                let text = element_text(item);
                let (label, value) = text.split_once(':')?;
                (label.trim().to_string(), value.trim().to_string())
            }
        };
        let label = label.trim_end_matches(':').trim().to_string();
        (!label.is_empty() && !value.is_empty()).then_some((label, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SELECTORS: TileSelectors = TileSelectors {
        tile: ".product-tile",
        require: None,
        link: Some(".link"),
        name: Some("h3.name"),
        image: Some("img.tile-image"),
        price: Some(".price"),
        next_page: Some("a.page-link-next"),
    };

    fn page_url() -> Url {
        Url::parse("https://beads.example.com/delica/").unwrap()
    }

    const LISTING: &str = r#"
        <html><body>
          <div class="product-tile">
            <a class="link" href="/p/db-123">
              <img class="tile-image" src="/img/db-123.jpg">
              <h3 class="name">DB-123   Miyuki Delica
                Silver Lined Crystal</h3>
            </a>
            <span class="price">$3.45</span>
          </div>
          <div class="product-tile">
            <h3 class="name">DB-124 Miyuki Delica Opaque Red</h3>
          </div>
          <div class="product-tile">
            <a class="link" href="https://cdn.example.com/p/db-125"><h3 class="name">DB-125</h3></a>
          </div>
          <a class="page-link-next" href="?start=48">Next</a>
        </body></html>
    "#;

    #[test]
    fn extracts_tiles_in_document_order() {
        let extractor = ProductExtractor::new(&SELECTORS).unwrap();
        let doc = Html::parse_document(LISTING);
        let url = page_url();
        let tiles: Vec<_> = extractor.tiles(&doc, &url).collect();
        assert_eq!(tiles.len(), 3);

        let first = tiles[0].as_ref().unwrap();
        assert_eq!(first.index, 0);
        assert_eq!(first.name, "DB-123 Miyuki Delica Silver Lined Crystal");
        assert_eq!(first.detail_link.as_str(), "https://beads.example.com/p/db-123");
        assert_eq!(
            first.image_link.as_ref().map(Url::as_str),
            Some("https://beads.example.com/img/db-123.jpg")
        );
        assert_eq!(first.price_text.as_deref(), Some("$3.45"));

        assert!(matches!(
            tiles[1],
            Err(ExtractionError::MissingLink { index: 1, .. })
        ));

        let third = tiles[2].as_ref().unwrap();
        assert_eq!(third.detail_link.as_str(), "https://cdn.example.com/p/db-125");
        assert!(third.image_link.is_none());
        assert!(third.price_text.is_none());
    }

    #[test]
    fn resolves_next_page_links() {
        let extractor = ProductExtractor::new(&SELECTORS).unwrap();
        let doc = Html::parse_document(LISTING);
        let next = extractor.next_pages(&doc, &page_url());
        assert_eq!(
            next,
            vec![Url::parse("https://beads.example.com/delica/?start=48").unwrap()]
        );
    }

    #[test]
    fn required_child_filters_tiles() {
        let selectors = TileSelectors {
            tile: "a.item",
            require: Some("img"),
            link: None,
            name: None,
            image: Some("img"),
            price: None,
            next_page: None,
        };
        let extractor = ProductExtractor::new(&selectors).unwrap();
        let doc = Html::parse_document(
            r#"<a class="item" href="/a">Nav</a>
               <a class="item" href="/b"><img src="/b.jpg"> Delica DB-0001</a>"#,
        );
        let url = page_url();
        let tiles: Vec<_> = extractor.tiles(&doc, &url).collect::<Result<_, _>>().unwrap();
        assert_eq!(tiles.len(), 1);
        assert_eq!(tiles[0].name, "Delica DB-0001");
    }

    #[test]
    fn falls_back_to_image_alt_for_name() {
        let selectors = TileSelectors {
            tile: "a.item",
            require: None,
            link: None,
            name: None,
            image: Some("img"),
            price: None,
            next_page: None,
        };
        let extractor = ProductExtractor::new(&selectors).unwrap();
        let doc = Html::parse_document(
            r#"<a class="item" href="/b"><img src="/b.jpg" alt="Delica  DB-0002"></a>"#,
        );
        let url = page_url();
        let tile = extractor.tiles(&doc, &url).next().unwrap().unwrap();
        assert_eq!(tile.name, "Delica DB-0002");
    }

    const DETAIL: DetailSelectors = DetailSelectors {
        description: Some(".product-description"),
        spec_items: Some(".product-specs li"),
        spec_label: None,
        spec_value: None,
        images: Some(".product-image-thumbnails img"),
    };

    const DETAIL_PAGE: &str = r#"
        <div class="product-description">
          Cylinder beads with a
          silver-lined hole.
        </div>
        <ul class="product-specs">
          <li>Material: Glass</li>
          <li>Hole size: 0.8mm: approx.</li>
          <li>Made in Japan</li>
          <li>Material: Plastic</li>
        </ul>
        <div class="product-image-thumbnails">
          <img src="/img/db-123-2.jpg">
          <img data-src="https://cdn.example.com/db-123-3.jpg">
          <img src="/img/db-123-2.jpg">
        </div>
    "#;

    #[test]
    fn reads_description_specs_and_images() {
        let extractor = DetailExtractor::new(&DETAIL).unwrap();
        let doc = Html::parse_document(DETAIL_PAGE);
        let detail = extractor.detail(&doc, &page_url());

        assert_eq!(
            detail.description.as_deref(),
            Some("Cylinder beads with a silver-lined hole.")
        );
        assert_eq!(detail.specifications.len(), 2);
        assert_eq!(detail.specifications["Material"], "Glass");
        assert_eq!(detail.specifications["Hole size"], "0.8mm: approx.");
        assert_eq!(
            detail.additional_images,
            vec![
                "https://beads.example.com/img/db-123-2.jpg",
                "https://cdn.example.com/db-123-3.jpg",
            ]
        );
    }

    #[test]
    fn reads_table_specifications() {
        let selectors = DetailSelectors {
            description: None,
            spec_items: Some("tr.attribute"),
            spec_label: Some("th"),
            spec_value: Some("td"),
            images: None,
        };
        let extractor = DetailExtractor::new(&selectors).unwrap();
        let doc = Html::parse_document(
            r"<table>
                <tr class='attribute'><th>Finish</th><td><p>Silver Lined</p></td></tr>
                <tr class='attribute'><th>Glass Group</th><td><p>A</p></td></tr>
                <tr class='attribute'><th>Dyed</th><td></td></tr>
              </table>",
        );
        let detail = extractor.detail(&doc, &page_url());
        assert!(detail.description.is_none());
        assert_eq!(detail.specifications.len(), 2);
        assert_eq!(detail.specifications["Finish"], "Silver Lined");
        assert_eq!(detail.specifications["Glass Group"], "A");
    }

    #[test]
    fn page_without_detail_markup_is_empty() {
        let extractor = DetailExtractor::new(&DETAIL).unwrap();
        let doc = Html::parse_document("<html><body><p>Not found</p></body></html>");
        assert!(extractor.detail(&doc, &page_url()).is_empty());
    }

    #[test]
    fn invalid_selector_is_reported() {
        let selectors = TileSelectors {
            tile: "div[",
            ..SELECTORS
        };
        let err = ProductExtractor::new(&selectors).unwrap_err();
        assert!(matches!(err, CrawlError::Selector { .. }));
    }
}
