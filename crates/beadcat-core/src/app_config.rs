use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub crawler_request_timeout_secs: u64,
    pub crawler_user_agent: String,
    pub crawler_max_retries: u32,
    pub crawler_retry_backoff_base_ms: u64,
    pub run_max_attempts: u32,
    pub run_backoff_base_secs: u64,
    /// Optional YAML file overriding the built-in color family aliases.
    pub color_aliases_path: Option<PathBuf>,
    /// Six-field cron expression for scheduled crawls; `None` disables them.
    pub crawl_cron: Option<String>,
    pub api_keys: Option<String>,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("database_url", &"[redacted]")
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field(
                "crawler_request_timeout_secs",
                &self.crawler_request_timeout_secs,
            )
            .field("crawler_user_agent", &self.crawler_user_agent)
            .field("crawler_max_retries", &self.crawler_max_retries)
            .field(
                "crawler_retry_backoff_base_ms",
                &self.crawler_retry_backoff_base_ms,
            )
            .field("run_max_attempts", &self.run_max_attempts)
            .field("run_backoff_base_secs", &self.run_backoff_base_secs)
            .field("color_aliases_path", &self.color_aliases_path)
            .field("crawl_cron", &self.crawl_cron)
            .field("api_keys", &self.api_keys.as_ref().map(|_| "[redacted]"))
            .finish()
    }
}
