//! Turns a [`RawProductTile`] into a [`ParsedProductRecord`].

use beadcat_core::ParsedProductRecord;
use chrono::Utc;

use crate::code::{extract_code_from_link, extract_codes, parse_price, CodeTable};
use crate::error::{SkipReason, UnsupportedCodeError};
use crate::taxonomy::{collapse_whitespace, TaxonomyCache};
use crate::types::RawProductTile;

/// Vendor facts applied to every tile a crawler extracts.
#[derive(Debug, Clone, Copy)]
pub struct VendorProfile {
    pub brand_name: &'static str,
    pub codes: &'static CodeTable,
    /// Brand/type phrases removed from names before color matching.
    pub name_noise: &'static [&'static str],
    /// Boilerplate text some listings append to names, e.g. hidden labels.
    pub name_suffixes: &'static [&'static str],
}

/// Normalizes one tile.
///
/// Every code token in the name is tried against the profile's table in
/// order, then the code in the detail link's slug. The first one the table
/// accepts wins.
///
/// # Errors
///
/// Returns [`SkipReason::UnsupportedCode`] when no candidate is found or
/// none falls inside the profile's code table.
pub fn normalize_tile(
    tile: RawProductTile,
    profile: &VendorProfile,
    taxonomy: &TaxonomyCache,
) -> Result<ParsedProductRecord, SkipReason> {
    let name = clean_name(&tile.name, profile.name_suffixes);

    let candidates: Vec<String> = extract_codes(&name)
        .chain(extract_code_from_link(tile.detail_link.path()))
        .collect();
    let parsed = candidates
        .iter()
        .find_map(|raw| profile.codes.parse_code(raw).ok())
        .ok_or_else(|| UnsupportedCodeError {
            family: profile.codes.family,
            item: name.clone(),
        })?;

    let mut noise: Vec<&str> = Vec::with_capacity(profile.name_noise.len() + candidates.len() + 1);
    noise.extend(candidates.iter().map(String::as_str));
    noise.push(&parsed.code);
    noise.extend_from_slice(profile.name_noise);

    let finish_names = taxonomy.match_finishes(&name);
    let color_names = taxonomy.match_colors(&name, &noise);

    Ok(ParsedProductRecord {
        product_code: parsed.code.clone(),
        brand_name: profile.brand_name.to_string(),
        type_name: parsed.type_name.to_string(),
        size: parsed.size.to_string(),
        color_names,
        finish_names,
        image_url: tile.image_link.map(String::from),
        source_url: tile.detail_link.to_string(),
        price: tile.price_text.as_deref().and_then(parse_price),
        detail: None,
        scraped_at: Utc::now(),
        name,
    })
}

fn clean_name(raw: &str, suffixes: &[&str]) -> String {
    let mut name = collapse_whitespace(raw);
    for suffix in suffixes {
        if let Some(stripped) = name.strip_suffix(suffix) {
            name = stripped.trim_end().to_string();
        }
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::DELICA;
    use reqwest::Url;
    use rust_decimal::Decimal;
    use std::collections::BTreeSet;

    const PROFILE: VendorProfile = VendorProfile {
        brand_name: "Miyuki",
        codes: &DELICA,
        name_noise: &["Miyuki Delica"],
        name_suffixes: &["Product Title"],
    };

    fn tile(name: &str, link: &str) -> RawProductTile {
        RawProductTile {
            index: 0,
            name: name.to_string(),
            detail_link: Url::parse(link).unwrap(),
            image_link: Some(Url::parse("https://beads.example.com/img/1.jpg").unwrap()),
            price_text: Some("$3.45".to_string()),
        }
    }

    fn taxonomy() -> TaxonomyCache {
        TaxonomyCache::new(["Crystal", "Silver"], ["Silver Lined", "Lined", "Opaque"])
    }

    #[test]
    fn normalizes_delica_tile() {
        let record = normalize_tile(
            tile(
                "DB-123 Miyuki Delica Silver Lined Crystal Product Title",
                "https://beads.example.com/p/db-123",
            ),
            &PROFILE,
            &taxonomy(),
        )
        .unwrap();

        assert_eq!(record.name, "DB-123 Miyuki Delica Silver Lined Crystal");
        assert_eq!(record.product_code, "DB-123");
        assert_eq!(record.brand_name, "Miyuki");
        assert_eq!(record.type_name, "Delica");
        assert_eq!(record.size, "11/0");
        assert_eq!(record.finish_names, BTreeSet::from(["Silver Lined".to_string()]));
        assert_eq!(record.color_names, BTreeSet::from(["Crystal".to_string()]));
        assert_eq!(record.price, Some(Decimal::new(345, 2)));
        assert_eq!(record.source_url, "https://beads.example.com/p/db-123");
        assert_eq!(
            record.image_url.as_deref(),
            Some("https://beads.example.com/img/1.jpg")
        );
    }

    #[test]
    fn rejects_foreign_code_with_product_name() {
        let err = normalize_tile(
            tile("ABC-123 Glass Bead", "https://beads.example.com/p/abc-123"),
            &PROFILE,
            &taxonomy(),
        )
        .unwrap_err();
        assert!(matches!(err, SkipReason::UnsupportedCode(_)));
        assert_eq!(err.to_string(), "Skipping non-delicas: ABC-123 Glass Bead");
    }

    #[test]
    fn rejects_tile_without_any_code() {
        let err = normalize_tile(
            tile("Assorted Seed Beads", "https://beads.example.com/p/mix"),
            &PROFILE,
            &taxonomy(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("Skipping non-delicas"));
    }

    #[test]
    fn falls_back_to_code_in_link() {
        let record = normalize_tile(
            tile(
                "Delica 15/0 Opaque Crystal",
                "https://beads.example.com/miyuki-delica-dbs-0042.html",
            ),
            &PROFILE,
            &taxonomy(),
        )
        .unwrap();
        assert_eq!(record.product_code, "DBS-0042");
        assert_eq!(record.size, "15/0");
        assert_eq!(record.color_names, BTreeSet::from(["Crystal".to_string()]));
    }

    #[test]
    fn later_code_is_used_when_first_is_foreign() {
        let record = normalize_tile(
            tile(
                "XY-12 Miyuki Delica Opaque Crystal DB-0723",
                "https://beads.example.com/p/xy-12",
            ),
            &PROFILE,
            &taxonomy(),
        )
        .unwrap();
        assert_eq!(record.product_code, "DB-0723");
        assert_eq!(record.size, "11/0");
        assert_eq!(record.color_names, BTreeSet::from(["Crystal".to_string()]));
    }

    #[test]
    fn foreign_code_in_name_falls_back_to_link() {
        let record = normalize_tile(
            tile(
                "AB-77 Seed Bead Crystal",
                "https://beads.example.com/miyuki-delica-db-0042.html",
            ),
            &PROFILE,
            &taxonomy(),
        )
        .unwrap();
        assert_eq!(record.product_code, "DB-0042");
    }

    #[test]
    fn unparseable_price_is_none() {
        let mut t = tile("DB-0001 Miyuki Delica Crystal", "https://beads.example.com/p/1");
        t.price_text = Some("Sold out".to_string());
        let record = normalize_tile(t, &PROFILE, &taxonomy()).unwrap();
        assert!(record.price.is_none());
    }
}
