//! Crawl statistics
//!
//! Counters collected by the coordinator while a crawl runs and printed once
//! it finishes.

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Crawl statistics summary
#[derive(Debug, Clone)]
pub struct CrawlStatistics {
    /// Wall-clock time the crawl started
    pub started_at: DateTime<Utc>,

    /// Time from start until the output was flushed
    pub elapsed: Duration,

    /// Fetch tasks started
    pub pages_dispatched: u64,

    /// Fetches that produced a record
    pub pages_fetched: u64,

    /// Fetches that failed (transport, status, content type, timeout, panic)
    pub fetch_failures: u64,

    /// Fetches redirected onto a page already scheduled; no record
    pub duplicate_pages: u64,

    /// Rows handed to the sink
    pub records_written: u64,

    /// Raw hrefs seen across all pages
    pub links_found: u64,

    /// Links added to the frontier
    pub links_enqueued: u64,

    /// Links already scheduled earlier
    pub duplicate_links: u64,

    /// Hrefs that were empty, unparsable or not http(s)
    pub malformed_links: u64,

    /// Links outside the allowed domains
    pub out_of_scope_links: u64,

    /// Links beyond the maximum depth
    pub too_deep_links: u64,

    /// Queued URLs dropped when the crawl stopped early
    pub abandoned_urls: u64,
}

impl CrawlStatistics {
    /// Empty counters stamped with the current time
    pub fn started_now() -> Self {
        Self {
            started_at: Utc::now(),
            elapsed: Duration::ZERO,
            pages_dispatched: 0,
            pages_fetched: 0,
            fetch_failures: 0,
            duplicate_pages: 0,
            records_written: 0,
            links_found: 0,
            links_enqueued: 0,
            duplicate_links: 0,
            malformed_links: 0,
            out_of_scope_links: 0,
            too_deep_links: 0,
            abandoned_urls: 0,
        }
    }

    /// Fetches completed so far, successful or not
    pub fn pages_completed(&self) -> u64 {
        self.pages_fetched + self.fetch_failures + self.duplicate_pages
    }

    /// Percentage of completed fetches that produced a record
    pub fn success_rate(&self) -> f64 {
        let completed = self.pages_completed();
        if completed == 0 {
            0.0
        } else {
            (self.pages_fetched as f64 / completed as f64) * 100.0
        }
    }

    /// Completed fetches per second of elapsed time
    pub fn pages_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.pages_completed() as f64 / secs
        } else {
            0.0
        }
    }
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Crawl Statistics ===\n");

    println!("Run:");
    println!("  Started: {}", stats.started_at.to_rfc3339());
    println!("  Elapsed: {:.2}s", stats.elapsed.as_secs_f64());
    println!("  Throughput: {:.2} pages/sec", stats.pages_per_second());
    println!();

    println!("Pages:");
    println!("  Dispatched: {}", stats.pages_dispatched);
    println!("  Fetched: {}", stats.pages_fetched);
    println!("  Failed: {}", stats.fetch_failures);
    if stats.duplicate_pages > 0 {
        println!("  Redirected to known page: {}", stats.duplicate_pages);
    }
    println!("  Records written: {}", stats.records_written);
    if stats.abandoned_urls > 0 {
        println!("  Abandoned in frontier: {}", stats.abandoned_urls);
    }
    println!();

    println!("Links:");
    println!("  Found: {}", stats.links_found);
    println!("  Enqueued: {}", stats.links_enqueued);
    println!("  Duplicates: {}", stats.duplicate_links);
    println!("  Malformed: {}", stats.malformed_links);
    println!("  Out of scope: {}", stats.out_of_scope_links);
    println!("  Too deep: {}", stats.too_deep_links);
    println!();

    println!(
        "Success Rate: {:.1}% ({} / {} pages successfully processed)",
        stats.success_rate(),
        stats.pages_fetched,
        stats.pages_completed()
    );
}
