use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A bead scraped from a vendor listing page, normalized for the catalog.
///
/// `product_code` is the natural key: two records with the same code describe
/// the same catalog product regardless of which page they were found on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedProductRecord {
    /// Display name with whitespace collapsed, e.g. `"DB-123 Miyuki Delica Silver Lined Crystal"`.
    pub name: String,
    /// Vendor code normalized to `PREFIX-DIGITS`, e.g. `"DB-123"`.
    pub product_code: String,
    pub brand_name: String,
    pub type_name: String,
    /// Seed-bead aught size, e.g. `"11/0"`.
    pub size: String,
    pub color_names: BTreeSet<String>,
    pub finish_names: BTreeSet<String>,
    pub image_url: Option<String>,
    /// Detail page the tile linked to.
    pub source_url: String,
    pub price: Option<Decimal>,
    /// Filled in when the detail page was fetched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<ProductDetail>,
    #[serde(default = "Utc::now")]
    pub scraped_at: DateTime<Utc>,
}

/// Extra fields read from a product's own page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDetail {
    pub description: Option<String>,
    /// `label → value` pairs from the vendor's specification list.
    pub specifications: BTreeMap<String, String>,
    pub additional_images: Vec<String>,
}

impl ProductDetail {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.description.is_none()
            && self.specifications.is_empty()
            && self.additional_images.is_empty()
    }
}

impl ParsedProductRecord {
    /// Metadata stored alongside the catalog product on first insert.
    #[must_use]
    pub fn metadata(&self) -> serde_json::Value {
        let mut meta = serde_json::json!({
            "source_url": self.source_url,
            "price": self.price.map(|p| p.to_string()),
            "scraped_at": self.scraped_at.to_rfc3339(),
        });
        if let (Some(detail), Some(map)) = (&self.detail, meta.as_object_mut()) {
            if let Some(description) = &detail.description {
                map.insert("description".to_string(), description.clone().into());
            }
            if !detail.specifications.is_empty() {
                map.insert(
                    "specifications".to_string(),
                    serde_json::json!(detail.specifications),
                );
            }
            if !detail.additional_images.is_empty() {
                map.insert(
                    "additional_images".to_string(),
                    serde_json::json!(detail.additional_images),
                );
            }
        }
        meta
    }
}
