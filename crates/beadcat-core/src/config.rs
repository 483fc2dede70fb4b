use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the process environment so tests can feed a `HashMap`.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let optional = |var: &str| -> Option<String> {
        lookup(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let parse_addr = |var: &str, default: &str| -> Result<SocketAddr, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u32>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let database_url = require("DATABASE_URL")?;
    let env = parse_environment(&or_default("BEADCAT_ENV", "development"))?;

    let bind_addr = parse_addr("BEADCAT_BIND_ADDR", "0.0.0.0:3000")?;
    let log_level = or_default("BEADCAT_LOG_LEVEL", "info");

    let db_max_connections = parse_u32("BEADCAT_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("BEADCAT_DB_MIN_CONNECTIONS", "1")?;
    if db_min_connections > db_max_connections {
        return Err(ConfigError::InvalidEnvVar {
            var: "BEADCAT_DB_MIN_CONNECTIONS".to_string(),
            reason: format!(
                "min connections ({db_min_connections}) exceeds max connections ({db_max_connections})"
            ),
        });
    }
    let db_acquire_timeout_secs = parse_u64("BEADCAT_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let crawler_request_timeout_secs = parse_u64("BEADCAT_CRAWLER_REQUEST_TIMEOUT_SECS", "30")?;
    let crawler_user_agent = or_default(
        "BEADCAT_CRAWLER_USER_AGENT",
        "beadcat/0.1 (+catalog-crawler)",
    );
    let crawler_max_retries = parse_u32("BEADCAT_CRAWLER_MAX_RETRIES", "2")?;
    let crawler_retry_backoff_base_ms = parse_u64("BEADCAT_CRAWLER_RETRY_BACKOFF_BASE_MS", "500")?;

    let run_max_attempts = parse_u32("BEADCAT_RUN_MAX_ATTEMPTS", "3")?;
    if run_max_attempts == 0 {
        return Err(ConfigError::InvalidEnvVar {
            var: "BEADCAT_RUN_MAX_ATTEMPTS".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    let run_backoff_base_secs = parse_u64("BEADCAT_RUN_BACKOFF_BASE_SECS", "5")?;

    let color_aliases_path = optional("BEADCAT_COLOR_ALIASES_PATH").map(PathBuf::from);
    let crawl_cron = optional("BEADCAT_CRAWL_CRON");
    let api_keys = optional("BEADCAT_API_KEYS");

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        crawler_request_timeout_secs,
        crawler_user_agent,
        crawler_max_retries,
        crawler_retry_backoff_base_ms,
        run_max_attempts,
        run_backoff_base_secs,
        color_aliases_path,
        crawl_cron,
        api_keys,
    })
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "BEADCAT_ENV".to_string(),
            reason: format!("unknown environment \"{other}\""),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
