//! Database command handlers: connectivity, migrations, seeding and run
//! history.

use std::collections::BTreeSet;

use beadcat_core::AppConfig;
use clap::Subcommand;

/// Sub-commands available under `db`.
#[derive(Debug, Subcommand)]
pub enum DbCommands {
    /// Check that the database is reachable
    Ping,
    /// Apply pending migrations
    Migrate,
    /// Seed brands, bead types and sizes for every registered crawler, plus
    /// the starter colors and finishes
    Seed,
}

pub(crate) async fn connect(config: &AppConfig) -> anyhow::Result<sqlx::PgPool> {
    let pool = beadcat_db::connect_pool(
        &config.database_url,
        beadcat_db::PoolConfig::from_app_config(config),
    )
    .await
    .map_err(|e| anyhow::anyhow!("failed to connect to database: {e}"))?;
    Ok(pool)
}

pub(crate) async fn run_db_command(config: &AppConfig, command: DbCommands) -> anyhow::Result<()> {
    let pool = connect(config).await?;
    match command {
        DbCommands::Ping => {
            beadcat_db::health_check(&pool).await?;
            println!("database ok");
        }
        DbCommands::Migrate => {
            let applied = beadcat_db::run_migrations(&pool).await?;
            println!("applied {applied} migrations");
        }
        DbCommands::Seed => seed(&pool).await?,
    }
    Ok(())
}

async fn seed(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let mut seeded = BTreeSet::new();
    for name in beadcat_crawler::crawler_names() {
        let crawler = beadcat_crawler::resolve(name)?;
        let profile = crawler.profile();
        if !seeded.insert((profile.brand_name, profile.codes.type_name)) {
            continue;
        }
        let report =
            beadcat_db::seed_code_table(pool, profile.brand_name, None, profile.codes).await?;
        println!(
            "seeded {} {} with {} sizes",
            profile.brand_name, profile.codes.type_name, report.sizes
        );
    }

    let (colors, finishes) = beadcat_db::seed_taxonomy(
        pool,
        beadcat_db::STARTER_COLORS,
        beadcat_db::STARTER_FINISHES,
    )
    .await?;
    println!("added {colors} colors and {finishes} finishes");
    Ok(())
}

pub(crate) async fn print_runs(config: &AppConfig, limit: i64) -> anyhow::Result<()> {
    let pool = connect(config).await?;
    let runs = beadcat_db::list_crawl_runs(&pool, limit).await?;
    if runs.is_empty() {
        println!("no crawl runs recorded");
        return Ok(());
    }

    for run in runs {
        println!(
            "{}  {:<20} {:<10} attempt {}  requested {}{}",
            run.public_id,
            run.crawler_name,
            run.status,
            run.attempt,
            run.requested_at.format("%Y-%m-%d %H:%M:%S"),
            run.error_message
                .map(|e| format!("  error: {e}"))
                .unwrap_or_default(),
        );
    }
    Ok(())
}
