//! Crawler module for web page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching behind the [`Fetcher`] seam
//! - HTML parsing into article records and raw links
//! - The visited set and frontier scheduling
//! - Overall crawl coordination, completion and cancellation

mod coordinator;
mod fetcher;
mod parser;
mod scheduler;
mod visited;

pub use coordinator::{run_crawl, Coordinator, CrawlOptions, CrawlOutcome, CrawlStatus};
pub use fetcher::{
    build_http_client, fetch_and_parse, FetchError, FetchedPage, Fetcher, HttpFetcher,
};
pub use parser::{parse_page, PageRecord, PageSelectors, ParsedPage, EMPTY_FIELD};
pub use scheduler::{CrawlPhase, Discovery, QueuedUrl, Scheduler};
pub use visited::VisitedSet;
