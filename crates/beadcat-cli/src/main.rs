mod crawl;
mod db;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use crate::crawl::{CrawlArgs, ImportArgs};
use crate::db::DbCommands;

#[derive(Debug, Parser)]
#[command(name = "beadcat-cli")]
#[command(about = "Bead catalog crawler command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Database maintenance
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// List the registered crawlers
    Crawlers,
    /// Run a crawler into the catalog, or export its output to JSON
    Crawl(CrawlArgs),
    /// Load a crawl export into the catalog
    Import(ImportArgs),
    /// Show recent crawl runs
    Runs {
        /// Maximum number of runs to show
        #[arg(long, default_value = "20")]
        limit: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        println!("beadcat-cli ready; run with --help for commands");
        return Ok(());
    };

    if matches!(command, Commands::Crawlers) {
        init_tracing("info");
        crawl::print_crawlers();
        return Ok(());
    }

    let config = beadcat_core::load_app_config()?;
    init_tracing(&config.log_level);

    match command {
        Commands::Db { command } => db::run_db_command(&config, command).await,
        Commands::Crawl(args) => {
            let cancel = CancellationToken::new();
            spawn_ctrl_c_handler(cancel.clone());
            crawl::run_crawl(&config, &args, cancel).await
        }
        Commands::Import(args) => crawl::run_import(&config, &args).await,
        Commands::Runs { limit } => db::print_runs(&config, limit).await,
        Commands::Crawlers => Ok(()),
    }
}

fn init_tracing(default_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Cancels the running crawl on Ctrl+C; in-flight pages are allowed to finish.
fn spawn_ctrl_c_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling crawl");
            cancel.cancel();
        }
    });
}

#[cfg(test)]
mod tests;
