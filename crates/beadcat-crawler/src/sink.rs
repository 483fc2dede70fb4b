//! Persisting parsed records into the bead catalog.
//!
//! [`CatalogStore`] is the storage port; the Postgres implementation lives
//! in `beadcat-db`. [`CatalogUpsertSink`] resolves a record's brand, type
//! and size, finds or creates the product by its code, and links colors
//! (through the color-family alias table) and finishes. Upserting the same
//! record twice creates nothing new.

use std::collections::BTreeSet;
use std::future::Future;

use beadcat_core::{ColorAliases, ParsedProductRecord};
use serde::Serialize;
use thiserror::Error;

use crate::taxonomy::TaxonomyCache;

/// A brand, type, size, color or finish row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaxonomyRef {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogProduct {
    pub id: i64,
    pub product_code: String,
    pub name: String,
}

/// Attributes written only when a product is first created.
#[derive(Debug, Clone, PartialEq)]
pub struct NewProduct<'a> {
    pub name: &'a str,
    pub brand_id: i64,
    pub type_id: i64,
    pub size_id: i64,
    pub image_url: Option<&'a str>,
    pub metadata: serde_json::Value,
}

pub trait CatalogStore: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    fn find_brand(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<Option<TaxonomyRef>, Self::Error>> + Send;

    fn find_type(
        &self,
        brand_id: i64,
        name: &str,
    ) -> impl Future<Output = Result<Option<TaxonomyRef>, Self::Error>> + Send;

    fn find_size(
        &self,
        brand_id: i64,
        type_id: i64,
        size: &str,
    ) -> impl Future<Output = Result<Option<TaxonomyRef>, Self::Error>> + Send;

    fn find_or_create_color(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<TaxonomyRef, Self::Error>> + Send;

    fn find_or_create_finish(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<TaxonomyRef, Self::Error>> + Send;

    /// Returns the product for `product_code`, creating it from `attrs` when
    /// absent. The flag is `true` when this call created it.
    fn find_or_create_product(
        &self,
        product_code: &str,
        attrs: &NewProduct<'_>,
    ) -> impl Future<Output = Result<(CatalogProduct, bool), Self::Error>> + Send;

    /// Returns `true` when a new link was written.
    fn link_color(
        &self,
        product_id: i64,
        color_id: i64,
    ) -> impl Future<Output = Result<bool, Self::Error>> + Send;

    /// Returns `true` when a new link was written.
    fn link_finish(
        &self,
        product_id: i64,
        finish_id: i64,
    ) -> impl Future<Output = Result<bool, Self::Error>> + Send;

    fn list_color_names(&self) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send;

    fn list_finish_names(&self) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send;
}

/// Loads the run's matching snapshot of known colors and finishes.
///
/// # Errors
///
/// Propagates the store's error.
pub async fn load_taxonomy<S: CatalogStore>(store: &S) -> Result<TaxonomyCache, S::Error> {
    let colors = store.list_color_names().await?;
    let finishes = store.list_finish_names().await?;
    Ok(TaxonomyCache::new(colors, finishes))
}

#[derive(Debug, Error)]
pub enum UpsertError {
    #[error("brand not found: {brand}")]
    MissingBrand { brand: String },

    #[error("bead type not found: {type_name} (brand {brand})")]
    MissingType { brand: String, type_name: String },

    #[error("bead size not found: {size} ({brand} {type_name})")]
    MissingSize {
        brand: String,
        type_name: String,
        size: String,
    },

    #[error("catalog store error: {0}")]
    Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl UpsertError {
    /// Missing taxonomy rows only affect the record at hand; a store failure
    /// affects every record after it.
    #[must_use]
    pub fn is_record_level(&self) -> bool {
        !matches!(self, UpsertError::Store(_))
    }
}

fn store_err<E: std::error::Error + Send + Sync + 'static>(err: E) -> UpsertError {
    UpsertError::Store(Box::new(err))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub product: CatalogProduct,
    pub created: bool,
    pub colors_linked: usize,
    pub finishes_linked: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpsertFailure {
    pub product_code: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpsertReport {
    pub upserted: usize,
    pub created: usize,
    pub failures: Vec<UpsertFailure>,
}

pub struct CatalogUpsertSink<'a, S> {
    store: &'a S,
    aliases: &'a ColorAliases,
}

impl<'a, S: CatalogStore> CatalogUpsertSink<'a, S> {
    pub fn new(store: &'a S, aliases: &'a ColorAliases) -> Self {
        Self { store, aliases }
    }

    /// Upserts one record.
    ///
    /// # Errors
    ///
    /// Returns [`UpsertError`] if the brand, type or size is not in the
    /// catalog, or the store fails.
    pub async fn upsert(&self, record: &ParsedProductRecord) -> Result<UpsertOutcome, UpsertError> {
        let brand = self
            .store
            .find_brand(&record.brand_name)
            .await
            .map_err(store_err)?
            .ok_or_else(|| UpsertError::MissingBrand {
                brand: record.brand_name.clone(),
            })?;
        let bead_type = self
            .store
            .find_type(brand.id, &record.type_name)
            .await
            .map_err(store_err)?
            .ok_or_else(|| UpsertError::MissingType {
                brand: brand.name.clone(),
                type_name: record.type_name.clone(),
            })?;
        let size = self
            .store
            .find_size(brand.id, bead_type.id, &record.size)
            .await
            .map_err(store_err)?
            .ok_or_else(|| UpsertError::MissingSize {
                brand: brand.name.clone(),
                type_name: bead_type.name.clone(),
                size: record.size.clone(),
            })?;

        let attrs = NewProduct {
            name: &record.name,
            brand_id: brand.id,
            type_id: bead_type.id,
            size_id: size.id,
            image_url: record.image_url.as_deref(),
            metadata: record.metadata(),
        };
        let (product, created) = self
            .store
            .find_or_create_product(&record.product_code, &attrs)
            .await
            .map_err(store_err)?;

        let families: BTreeSet<&str> = record
            .color_names
            .iter()
            .map(|color| self.aliases.resolve(color))
            .collect();
        let mut colors_linked = 0;
        for family in families {
            let color = self
                .store
                .find_or_create_color(family)
                .await
                .map_err(store_err)?;
            if self
                .store
                .link_color(product.id, color.id)
                .await
                .map_err(store_err)?
            {
                colors_linked += 1;
            }
        }

        let mut finishes_linked = 0;
        for finish_name in &record.finish_names {
            let finish = self
                .store
                .find_or_create_finish(finish_name)
                .await
                .map_err(store_err)?;
            if self
                .store
                .link_finish(product.id, finish.id)
                .await
                .map_err(store_err)?
            {
                finishes_linked += 1;
            }
        }

        Ok(UpsertOutcome {
            product,
            created,
            colors_linked,
            finishes_linked,
        })
    }

    /// Upserts every record. Records whose brand, type or size is missing are
    /// collected in the report and the rest still go through.
    ///
    /// # Errors
    ///
    /// Stops at the first [`UpsertError::Store`] and returns it.
    pub async fn upsert_all(
        &self,
        records: &[ParsedProductRecord],
    ) -> Result<UpsertReport, UpsertError> {
        let mut report = UpsertReport::default();
        for record in records {
            match self.upsert(record).await {
                Ok(outcome) => {
                    report.upserted += 1;
                    if outcome.created {
                        report.created += 1;
                    }
                }
                Err(err) if !err.is_record_level() => {
                    tracing::error!(
                        product_code = %record.product_code,
                        upserted = report.upserted,
                        error = %err,
                        "catalog store failed, abandoning upsert"
                    );
                    return Err(err);
                }
                Err(err) => {
                    tracing::warn!(
                        product_code = %record.product_code,
                        error = %err,
                        "catalog upsert failed"
                    );
                    report.failures.push(UpsertFailure {
                        product_code: record.product_code.clone(),
                        reason: err.to_string(),
                    });
                }
            }
        }
        Ok(report)
    }
}

#[cfg(test)]
#[path = "sink_test.rs"]
pub(crate) mod tests;
