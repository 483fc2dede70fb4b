use beadcat_crawler::code::CodeTable;
use sqlx::PgPool;

use crate::DbError;

/// Base color families every catalog starts with.
pub const STARTER_COLORS: &[&str] = &[
    "Transparent",
    "Translucent",
    "Black",
    "Grey",
    "White",
    "Pink",
    "Red",
    "Orange",
    "Yellow",
    "Green",
    "Blue",
    "Purple",
    "Brown",
    "Beige",
    "Gold",
    "Silver",
];

/// Finishes common across brands.
pub const STARTER_FINISHES: &[&str] = &[
    "Matte",
    "Glossy",
    "Metallic",
    "Galvanized",
    "AB",
    "Luster",
    "Ceylon",
    "Opaque",
    "Lined",
    "Silver Lined",
    "Gold Lined",
    "Iris",
    "Duracoat",
    "Picasso",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub brand_id: i64,
    pub type_id: i64,
    pub sizes: usize,
}

/// Upsert a brand, its bead type and every size named by `table`.
///
/// All upserts run inside a single transaction; if any operation fails the
/// entire batch is rolled back.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any database operation fails.
pub async fn seed_code_table(
    pool: &PgPool,
    brand_name: &str,
    website: Option<&str>,
    table: &CodeTable,
) -> Result<SeedReport, DbError> {
    let mut tx = pool.begin().await?;

    let brand_id: i64 = sqlx::query_scalar(
        "INSERT INTO bead_brands (name, website) VALUES ($1, $2) \
         ON CONFLICT (name) DO UPDATE SET \
             website = COALESCE(EXCLUDED.website, bead_brands.website), \
             updated_at = NOW() \
         RETURNING id",
    )
    .bind(brand_name)
    .bind(website)
    .fetch_one(&mut *tx)
    .await?;

    let type_id: i64 = sqlx::query_scalar(
        "INSERT INTO bead_types (brand_id, name) VALUES ($1, $2) \
         ON CONFLICT (brand_id, name) DO UPDATE SET name = EXCLUDED.name \
         RETURNING id",
    )
    .bind(brand_id)
    .bind(table.type_name)
    .fetch_one(&mut *tx)
    .await?;

    let mut sizes = 0usize;
    for entry in table.prefixes {
        sqlx::query(
            "INSERT INTO bead_sizes (brand_id, type_id, size) VALUES ($1, $2, $3) \
             ON CONFLICT (brand_id, type_id, size) DO NOTHING",
        )
        .bind(brand_id)
        .bind(type_id)
        .bind(entry.size)
        .execute(&mut *tx)
        .await?;
        sizes += 1;
    }

    tx.commit().await?;

    tracing::info!(
        brand = brand_name,
        bead_type = table.type_name,
        sizes,
        "seeded code table"
    );

    Ok(SeedReport {
        brand_id,
        type_id,
        sizes,
    })
}

/// Insert any missing colors and finishes. Existing rows are left untouched.
///
/// Returns the number of new `(colors, finishes)` rows.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any database operation fails.
pub async fn seed_taxonomy(
    pool: &PgPool,
    colors: &[&str],
    finishes: &[&str],
) -> Result<(usize, usize), DbError> {
    let mut tx = pool.begin().await?;
    let mut new_colors = 0usize;
    let mut new_finishes = 0usize;

    for color in colors {
        let result =
            sqlx::query("INSERT INTO bead_colors (name) VALUES ($1) ON CONFLICT (name) DO NOTHING")
                .bind(color)
                .execute(&mut *tx)
                .await?;
        if result.rows_affected() == 1 {
            new_colors += 1;
        }
    }

    for finish in finishes {
        let result = sqlx::query(
            "INSERT INTO bead_finishes (name) VALUES ($1) ON CONFLICT (name) DO NOTHING",
        )
        .bind(finish)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 1 {
            new_finishes += 1;
        }
    }

    tx.commit().await?;
    Ok((new_colors, new_finishes))
}
