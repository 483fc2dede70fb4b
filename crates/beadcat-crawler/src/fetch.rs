//! Page fetching.
//!
//! [`PageSource`] is the seam the crawl engine fetches through. The
//! production implementation is [`HttpFetcher`]; tests substitute in-memory
//! sources.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use beadcat_core::{AppConfig, CrawlOptions};
use reqwest::{Client, Url};

use crate::error::FetchError;
use crate::rate_limit::retry_with_backoff;
use crate::types::FetchedPage;

pub trait PageSource: Send + Sync {
    /// Retrieves the body at `url`.
    fn fetch(&self, url: &Url) -> impl Future<Output = Result<FetchedPage, FetchError>> + Send;
}

/// Connection and politeness settings for one run's [`HttpFetcher`].
#[derive(Debug, Clone, PartialEq)]
pub struct FetcherSettings {
    pub timeout_secs: u64,
    pub user_agent: String,
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    /// Slept before every outbound request, retries included.
    pub delay: Duration,
    pub cache_responses: bool,
}

impl FetcherSettings {
    #[must_use]
    pub fn new(config: &AppConfig, options: &CrawlOptions) -> Self {
        Self {
            timeout_secs: config.crawler_request_timeout_secs,
            user_agent: config.crawler_user_agent.clone(),
            max_retries: config.crawler_max_retries,
            backoff_base_ms: config.crawler_retry_backoff_base_ms,
            delay: options.delay(),
            cache_responses: options.cache_responses,
        }
    }
}

/// Fetched pages keyed by requested URL.
///
/// One cache is created per run and handed to the fetcher of every attempt,
/// so a retried attempt does not download pages the previous one already
/// has. Clones share the same storage.
#[derive(Debug, Clone, Default)]
pub struct ResponseCache {
    pages: Arc<Mutex<HashMap<Url, FetchedPage>>>,
}

impl ResponseCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn get(&self, url: &Url) -> Option<FetchedPage> {
        let guard = self
            .pages
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        guard.get(url).cloned()
    }

    fn insert(&self, url: &Url, page: &FetchedPage) {
        let mut guard = self
            .pages
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        guard.insert(url.clone(), page.clone());
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pages
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// HTTP page source with a politeness delay, per-request retries, and an
/// optional [`ResponseCache`].
pub struct HttpFetcher {
    client: Client,
    max_retries: u32,
    backoff_base_ms: u64,
    delay: Duration,
    cache: Option<ResponseCache>,
}

impl HttpFetcher {
    /// # Errors
    ///
    /// Returns [`FetchError::Client`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(settings: &FetcherSettings) -> Result<Self, FetchError> {
        Self::with_cache(settings, ResponseCache::new())
    }

    /// Builds a fetcher that reads and fills `cache` when
    /// `settings.cache_responses` is set, and ignores it otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Client`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn with_cache(
        settings: &FetcherSettings,
        cache: ResponseCache,
    ) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(&settings.user_agent)
            .build()
            .map_err(FetchError::Client)?;
        Ok(Self {
            client,
            max_retries: settings.max_retries,
            backoff_base_ms: settings.backoff_base_ms,
            delay: settings.delay,
            cache: settings.cache_responses.then_some(cache),
        })
    }

    async fn get_once(&self, url: &Url) -> Result<FetchedPage, FetchError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let response = self
            .client
            .get(url.clone())
            .header(
                reqwest::header::ACCEPT,
                "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8",
            )
            .header(reqwest::header::ACCEPT_LANGUAGE, "en-US,en;q=0.9")
            .send()
            .await
            .map_err(|source| FetchError::Http {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let final_url = response.url().clone();
        let body = response.text().await.map_err(|source| FetchError::Http {
            url: url.to_string(),
            source,
        })?;

        Ok(FetchedPage {
            url: final_url,
            body,
        })
    }
}

impl PageSource for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError> {
        if let Some(page) = self.cache.as_ref().and_then(|cache| cache.get(url)) {
            tracing::debug!(url = %url, "serving page from run cache");
            return Ok(page);
        }

        let page =
            retry_with_backoff(self.max_retries, self.backoff_base_ms, || self.get_once(url))
                .await?;
        if let Some(cache) = &self.cache {
            cache.insert(url, &page);
        }
        Ok(page)
    }
}
