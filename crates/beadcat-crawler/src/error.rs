use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure fetching a single page.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("unexpected HTTP status {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl FetchError {
    /// Whether retrying the same request could plausibly succeed.
    ///
    /// Timeouts, connection failures, HTTP 429 and 5xx are transient. Other
    /// statuses, body decode failures and client construction errors are not.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Http { source, .. } => {
                source.is_timeout() || source.is_connect() || source.is_request()
            }
            FetchError::Status { status, .. } => *status == 429 || *status >= 500,
            FetchError::Client(_) => false,
        }
    }
}

/// A tile on a listing page that could not be turned into a raw product.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("no product link found (tile {index} on {page})")]
    MissingLink { page: String, index: usize },

    #[error("no product name found (tile {index} on {page})")]
    MissingName { page: String, index: usize },
}

impl ExtractionError {
    /// Stable reference to the offending tile, e.g. `https://host/list#tile-3`.
    #[must_use]
    pub fn item_ref(&self) -> String {
        match self {
            ExtractionError::MissingLink { page, index }
            | ExtractionError::MissingName { page, index } => format!("{page}#tile-{index}"),
        }
    }
}

/// The tile's product code is absent or outside the crawler's code table.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Skipping non-{family}: {item}")]
pub struct UnsupportedCodeError {
    /// Plural family label from the code table, e.g. `"delicas"`.
    pub family: &'static str,
    /// Product name (or raw code) that failed the filter.
    pub item: String,
}

/// Why an item was left out of the crawl output.
#[derive(Debug, Error)]
pub enum SkipReason {
    #[error(transparent)]
    UnsupportedCode(#[from] UnsupportedCodeError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Fetch(#[from] FetchError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipKind {
    UnsupportedCode,
    Extraction,
    Fetch,
}

impl SkipReason {
    #[must_use]
    pub fn kind(&self) -> SkipKind {
        match self {
            SkipReason::UnsupportedCode(_) => SkipKind::UnsupportedCode,
            SkipReason::Extraction(_) => SkipKind::Extraction,
            SkipReason::Fetch(_) => SkipKind::Fetch,
        }
    }
}

/// A crawl-level failure: the run as a whole could not produce output.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("seed page fetch failed for {crawler}: {source}")]
    Discovery {
        crawler: String,
        #[source]
        source: FetchError,
    },

    #[error("invalid selector \"{selector}\": {reason}")]
    Selector { selector: String, reason: String },

    #[error("invalid seed URL \"{url}\": {reason}")]
    InvalidSeedUrl { url: String, reason: String },

    #[error("crawl cancelled")]
    Cancelled,
}

impl CrawlError {
    /// Only transient discovery failures are worth another attempt.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            CrawlError::Discovery { source, .. } => source.is_transient(),
            CrawlError::Selector { .. } | CrawlError::InvalidSeedUrl { .. } | CrawlError::Cancelled => {
                false
            }
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Unknown crawler: {name}")]
pub struct UnknownCrawlerError {
    pub name: String,
}
