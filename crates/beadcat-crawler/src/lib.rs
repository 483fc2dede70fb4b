pub mod code;
pub mod engine;
pub mod error;
pub mod export;
pub mod extract;
pub mod fetch;
pub mod normalize;
pub mod orchestrator;
mod pagination;
pub mod pipeline;
mod rate_limit;
pub mod sink;
pub mod sites;
pub mod taxonomy;
pub mod types;

pub use engine::{CrawlEngine, CrawlOutput, CrawlPhase, SkipEntry};
pub use error::{CrawlError, ExtractionError, FetchError, SkipKind, SkipReason, UnknownCrawlerError};
pub use export::{read_export, write_export, ExportError};
pub use extract::{DetailExtractor, DetailSelectors};
pub use fetch::{FetcherSettings, HttpFetcher, PageSource, ResponseCache};
pub use orchestrator::{
    request_run, NoopRecorder, RetryPolicy, RunFailure, RunOrchestrator, RunOutcome, RunRecorder,
};
pub use pipeline::{crawl_into_catalog, crawl_only, crawl_site, RunSummary};
pub use sink::{
    load_taxonomy, CatalogProduct, CatalogStore, CatalogUpsertSink, NewProduct, TaxonomyRef,
    UpsertError, UpsertFailure, UpsertReport,
};
pub use sites::{crawler_names, resolve, SiteCrawler};
pub use taxonomy::TaxonomyCache;
pub use types::{FetchedPage, RawProductTile};
