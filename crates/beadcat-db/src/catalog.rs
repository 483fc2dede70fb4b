//! Postgres implementation of the crawler's catalog store.
//!
//! Brand, type and size lookups are case-insensitive and never create rows;
//! those are seeded ahead of time (see [`crate::seed`]). Colors, finishes,
//! products and their links are created on demand and every write is
//! idempotent.

use beadcat_crawler::{CatalogProduct, CatalogStore, NewProduct, TaxonomyRef};
use sqlx::PgPool;

use crate::DbError;

#[derive(Debug, Clone)]
pub struct PgCatalogStore {
    pool: PgPool,
}

impl PgCatalogStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn find_or_create_named(&self, table: Named, name: &str) -> Result<TaxonomyRef, DbError> {
        let existing = sqlx::query_as::<_, (i64, String)>(table.select_sql())
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        if let Some((id, name)) = existing {
            return Ok(TaxonomyRef { id, name });
        }

        let (id, name) = sqlx::query_as::<_, (i64, String)>(table.insert_sql())
            .bind(name)
            .fetch_one(&self.pool)
            .await?;
        Ok(TaxonomyRef { id, name })
    }

    async fn list_names(&self, table: Named) -> Result<Vec<String>, DbError> {
        let names = sqlx::query_scalar::<_, String>(table.list_sql())
            .fetch_all(&self.pool)
            .await?;
        Ok(names)
    }
}

#[derive(Debug, Clone, Copy)]
enum Named {
    Color,
    Finish,
}

impl Named {
    fn select_sql(self) -> &'static str {
        match self {
            Named::Color => "SELECT id, name FROM bead_colors WHERE lower(name) = lower($1)",
            Named::Finish => "SELECT id, name FROM bead_finishes WHERE lower(name) = lower($1)",
        }
    }

    // A concurrent insert of the same name resolves through the conflict arm.
    fn insert_sql(self) -> &'static str {
        match self {
            Named::Color => {
                "INSERT INTO bead_colors (name) VALUES ($1) \
                 ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name \
                 RETURNING id, name"
            }
            Named::Finish => {
                "INSERT INTO bead_finishes (name) VALUES ($1) \
                 ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name \
                 RETURNING id, name"
            }
        }
    }

    fn list_sql(self) -> &'static str {
        match self {
            Named::Color => "SELECT name FROM bead_colors ORDER BY name",
            Named::Finish => "SELECT name FROM bead_finishes ORDER BY name",
        }
    }
}

impl CatalogStore for PgCatalogStore {
    type Error = DbError;

    async fn find_brand(&self, name: &str) -> Result<Option<TaxonomyRef>, DbError> {
        let row = sqlx::query_as::<_, (i64, String)>(
            "SELECT id, name FROM bead_brands WHERE lower(name) = lower($1)",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(id, name)| TaxonomyRef { id, name }))
    }

    async fn find_type(&self, brand_id: i64, name: &str) -> Result<Option<TaxonomyRef>, DbError> {
        let row = sqlx::query_as::<_, (i64, String)>(
            "SELECT id, name FROM bead_types \
             WHERE brand_id = $1 AND lower(name) = lower($2)",
        )
        .bind(brand_id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(id, name)| TaxonomyRef { id, name }))
    }

    async fn find_size(
        &self,
        brand_id: i64,
        type_id: i64,
        size: &str,
    ) -> Result<Option<TaxonomyRef>, DbError> {
        let row = sqlx::query_as::<_, (i64, String)>(
            "SELECT id, size FROM bead_sizes \
             WHERE brand_id = $1 AND type_id = $2 AND size = $3",
        )
        .bind(brand_id)
        .bind(type_id)
        .bind(size)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(id, name)| TaxonomyRef { id, name }))
    }

    async fn find_or_create_color(&self, name: &str) -> Result<TaxonomyRef, DbError> {
        self.find_or_create_named(Named::Color, name).await
    }

    async fn find_or_create_finish(&self, name: &str) -> Result<TaxonomyRef, DbError> {
        self.find_or_create_named(Named::Finish, name).await
    }

    async fn find_or_create_product(
        &self,
        product_code: &str,
        attrs: &NewProduct<'_>,
    ) -> Result<(CatalogProduct, bool), DbError> {
        let inserted = sqlx::query_as::<_, (i64, String, String)>(
            "INSERT INTO beads \
                 (brand_product_code, name, brand_id, type_id, size_id, image_url, metadata) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (brand_product_code) DO NOTHING \
             RETURNING id, brand_product_code, name",
        )
        .bind(product_code)
        .bind(attrs.name)
        .bind(attrs.brand_id)
        .bind(attrs.type_id)
        .bind(attrs.size_id)
        .bind(attrs.image_url)
        .bind(&attrs.metadata)
        .fetch_optional(&self.pool)
        .await?;

        if let Some((id, product_code, name)) = inserted {
            return Ok((
                CatalogProduct {
                    id,
                    product_code,
                    name,
                },
                true,
            ));
        }

        let (id, product_code, name) = sqlx::query_as::<_, (i64, String, String)>(
            "SELECT id, brand_product_code, name FROM beads WHERE brand_product_code = $1",
        )
        .bind(product_code)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok((
            CatalogProduct {
                id,
                product_code,
                name,
            },
            false,
        ))
    }

    async fn link_color(&self, product_id: i64, color_id: i64) -> Result<bool, DbError> {
        let result = sqlx::query(
            "INSERT INTO bead_color_links (bead_id, color_id) VALUES ($1, $2) \
             ON CONFLICT DO NOTHING",
        )
        .bind(product_id)
        .bind(color_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn link_finish(&self, product_id: i64, finish_id: i64) -> Result<bool, DbError> {
        let result = sqlx::query(
            "INSERT INTO bead_finish_links (bead_id, finish_id) VALUES ($1, $2) \
             ON CONFLICT DO NOTHING",
        )
        .bind(product_id)
        .bind(finish_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn list_color_names(&self) -> Result<Vec<String>, DbError> {
        self.list_names(Named::Color).await
    }

    async fn list_finish_names(&self) -> Result<Vec<String>, DbError> {
        self.list_names(Named::Finish).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_queries_target_their_own_table() {
        assert!(Named::Color.select_sql().contains("bead_colors"));
        assert!(Named::Finish.select_sql().contains("bead_finishes"));
        assert!(Named::Color.insert_sql().contains("ON CONFLICT (name)"));
        assert!(Named::Finish.list_sql().ends_with("ORDER BY name"));
    }
}
