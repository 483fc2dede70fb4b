pub mod aliases;
pub mod app_config;
pub mod config;
pub mod products;
pub mod runs;

pub use aliases::{configured_color_aliases, load_color_aliases, ColorAliases};
pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use products::{ParsedProductRecord, ProductDetail};
pub use runs::{CrawlOptions, CrawlOptionsRequest, CrawlRunState, RunStatus};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read color alias file {path}: {source}")]
    AliasFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse color alias file: {0}")]
    AliasFileParse(#[source] serde_yaml::Error),

    #[error("alias validation error: {0}")]
    Validation(String),
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid crawl option {option}: {reason}")]
    InvalidOption {
        option: &'static str,
        reason: String,
    },

    #[error("illegal run transition from {from} to {to}")]
    IllegalTransition { from: RunStatus, to: RunStatus },
}
