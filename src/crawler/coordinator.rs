//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the crawl loop that ties the other pieces together:
//! - Dispatching frontier URLs to a bounded set of fetch tasks
//! - Reaping finished tasks, writing their records, and scheduling their links
//! - Detecting completion (empty frontier, nothing in flight)
//! - Reacting to an operator stop signal by draining instead of hanging
//! - Flushing the sink exactly once at the end

use crate::config::Config;
use crate::crawler::fetcher::{fetch_and_parse, FetchError, Fetcher, HttpFetcher};
use crate::crawler::parser::{PageSelectors, ParsedPage};
use crate::crawler::scheduler::{CrawlPhase, Discovery, QueuedUrl, Scheduler};
use crate::output::{CrawlStatistics, CsvSink, OutputError, RecordSink};
use crate::url::{resolve_link, CanonicalUrl, DomainScope};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// How often (in completed pages) a progress line is logged
const PROGRESS_INTERVAL: u64 = 10;

/// How the crawl ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlStatus {
    /// Every reachable page was processed and the output flushed
    Completed,
    /// Stopped by the cancellation token; in-flight pages were drained
    Cancelled,
}

/// Final result of a crawl run
#[derive(Debug, Clone)]
pub struct CrawlOutcome {
    pub status: CrawlStatus,

    /// Scheduler phase when the loop exited; `Terminated` on every return
    pub phase: CrawlPhase,

    pub stats: CrawlStatistics,
}

/// Tuning knobs for a single crawl run
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    /// Maximum simultaneous fetch tasks
    pub max_concurrent: usize,

    /// Deadline for one fetch-and-parse, including body download
    pub fetch_timeout: Duration,

    /// Maximum link distance from the seed
    pub max_depth: Option<u32>,

    /// Hosts links may lead into
    pub scope: DomainScope,
}

impl CrawlOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_concurrent: config.crawler.max_concurrent_fetches,
            fetch_timeout: Duration::from_secs(config.crawler.fetch_timeout_secs),
            max_depth: config.crawler.max_depth,
            scope: DomainScope::new(&config.crawler.allowed_domains),
        }
    }
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// What a fetch task hands back to the loop
struct TaskOutput {
    queued: QueuedUrl,
    result: Result<ParsedPage, FetchError>,
}

/// Main crawler coordinator structure
pub struct Coordinator<F, S: ?Sized> {
    fetcher: Arc<F>,
    sink: Arc<S>,
    selectors: Arc<PageSelectors>,
    options: CrawlOptions,
}

impl<F, S> Coordinator<F, S>
where
    F: Fetcher,
    S: RecordSink + ?Sized,
{
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `fetcher` - Retrieves page bodies
    /// * `sink` - Receives one record per parsed page
    /// * `selectors` - Metadata and link selectors
    /// * `options` - Concurrency, timeout, depth and scope settings
    pub fn new(
        fetcher: Arc<F>,
        sink: Arc<S>,
        selectors: PageSelectors,
        options: CrawlOptions,
    ) -> Self {
        Self {
            fetcher,
            sink,
            selectors: Arc::new(selectors),
            options,
        }
    }

    /// Runs the crawl from `seed` until it completes or `cancel` fires
    ///
    /// The loop alternates between topping up the fetch pool from the
    /// frontier and reaping one finished task. Completion is checked on the
    /// same state the loop mutates, after a task's links were scheduled and
    /// before its slot was released, so a page that is about to add work can
    /// never be mistaken for an idle crawl.
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlOutcome)` - Crawl completed or was cancelled; output flushed
    /// * `Err(HarvestError::Output)` - The sink failed; the crawl was drained
    ///   and stopped
    pub async fn run(
        &self,
        seed: CanonicalUrl,
        cancel: CancellationToken,
    ) -> crate::Result<CrawlOutcome> {
        let start_time = Instant::now();
        let mut stats = CrawlStatistics::started_now();
        let mut scheduler = Scheduler::new(self.options.max_concurrent, self.options.max_depth);
        let mut tasks: JoinSet<TaskOutput> = JoinSet::new();
        let mut status = CrawlStatus::Completed;
        let mut sink_error: Option<OutputError> = None;

        tracing::info!(
            "Starting crawl at {} with up to {} concurrent fetches",
            seed,
            scheduler.max_concurrent()
        );
        scheduler.submit(seed);

        loop {
            if scheduler.phase() == CrawlPhase::Running && cancel.is_cancelled() {
                status = CrawlStatus::Cancelled;
                self.stop(&mut scheduler, &mut stats);
            }

            if scheduler.phase() == CrawlPhase::Running {
                while let Some(queued) = scheduler.next_dispatch() {
                    stats.pages_dispatched += 1;
                    self.spawn_fetch(&mut tasks, queued);
                }

                if scheduler.is_idle() {
                    tracing::info!("Frontier is empty and no fetches are in flight");
                    scheduler.begin_drain();
                }
            }

            debug_assert_eq!(tasks.len(), scheduler.in_flight());
            if tasks.is_empty() {
                break;
            }

            tokio::select! {
                biased;

                _ = cancel.cancelled(), if scheduler.phase() == CrawlPhase::Running => {
                    status = CrawlStatus::Cancelled;
                    self.stop(&mut scheduler, &mut stats);
                }

                Some(joined) = tasks.join_next() => {
                    match joined {
                        Ok(output) => {
                            self.handle_completion(&mut scheduler, &mut stats, &mut sink_error, output);
                        }
                        Err(e) => {
                            tracing::error!("Fetch task failed: {}", e);
                            stats.fetch_failures += 1;
                        }
                    }
                    scheduler.complete();
                    self.report_progress(&scheduler, &stats, start_time);
                }
            }
        }

        // Exactly one flush, after the last record has been appended
        if let Err(e) = self.sink.flush() {
            tracing::error!("Failed to flush output: {}", e);
            sink_error.get_or_insert(e);
        }

        let terminated = scheduler.terminate();
        debug_assert!(
            terminated && scheduler.is_idle(),
            "crawl loop exited with work outstanding"
        );
        stats.elapsed = start_time.elapsed();

        if let Some(e) = sink_error {
            return Err(e.into());
        }

        tracing::info!(
            "Crawl {}: {} pages fetched, {} failed, {} records written in {:?}",
            match status {
                CrawlStatus::Completed => "completed",
                CrawlStatus::Cancelled => "cancelled",
            },
            stats.pages_fetched,
            stats.fetch_failures,
            stats.records_written,
            stats.elapsed
        );

        Ok(CrawlOutcome {
            status,
            phase: scheduler.phase(),
            stats,
        })
    }

    /// Switches to draining after a stop request
    fn stop(&self, scheduler: &mut Scheduler, stats: &mut CrawlStatistics) {
        let abandoned = scheduler.begin_drain();
        stats.abandoned_urls += abandoned as u64;
        tracing::warn!(
            "Stop requested: waiting for {} in-flight fetches, {} queued URLs abandoned",
            scheduler.in_flight(),
            abandoned
        );
    }

    fn spawn_fetch(&self, tasks: &mut JoinSet<TaskOutput>, queued: QueuedUrl) {
        let fetcher = Arc::clone(&self.fetcher);
        let selectors = Arc::clone(&self.selectors);
        let timeout = self.options.fetch_timeout;

        tracing::debug!("Fetching {} (depth {})", queued.url, queued.depth);

        tasks.spawn(async move {
            let result =
                match tokio::time::timeout(timeout, fetch_and_parse(&*fetcher, &queued.url, &selectors))
                    .await
                {
                    Ok(result) => result,
                    Err(_) => Err(FetchError::Timeout {
                        url: queued.url.to_string(),
                    }),
                };
            TaskOutput { queued, result }
        });
    }

    /// Writes a finished page's record and schedules its links
    ///
    /// The caller releases the task's in-flight slot afterwards.
    fn handle_completion(
        &self,
        scheduler: &mut Scheduler,
        stats: &mut CrawlStatistics,
        sink_error: &mut Option<OutputError>,
        output: TaskOutput,
    ) {
        let TaskOutput { queued, result } = output;

        let parsed = match result {
            Ok(parsed) => parsed,
            Err(e) => {
                stats.fetch_failures += 1;
                match e {
                    FetchError::Status { .. } | FetchError::NotHtml { .. } => {
                        tracing::debug!("Skipping {}: {}", queued.url, e)
                    }
                    _ => tracing::warn!("Failed to fetch {}: {}", queued.url, e),
                }
                return;
            }
        };

        // A redirect may land on a page that is already scheduled under its
        // own URL; only the first claim on the final URL produces a record.
        if parsed.base_url != *queued.url.as_url() {
            if let Ok(target) = CanonicalUrl::new(parsed.base_url.clone()) {
                if !scheduler.claim_redirect_target(&target) {
                    tracing::debug!("{} redirected to already scheduled {}", queued.url, target);
                    stats.duplicate_pages += 1;
                    return;
                }
            }
        }

        stats.pages_fetched += 1;

        if sink_error.is_none() {
            match self.sink.append(&parsed.record) {
                Ok(()) => stats.records_written += 1,
                Err(e) => {
                    tracing::error!("Output failed, stopping crawl: {}", e);
                    stats.abandoned_urls += scheduler.begin_drain() as u64;
                    *sink_error = Some(e);
                }
            }
        }

        stats.links_found += parsed.links.len() as u64;

        for href in &parsed.links {
            let Some(link) = resolve_link(href, &parsed.base_url) else {
                tracing::trace!("Dropping link {:?} on {}", href, parsed.base_url);
                stats.malformed_links += 1;
                continue;
            };

            if !self.options.scope.allows(&link) {
                stats.out_of_scope_links += 1;
                continue;
            }

            match scheduler.discover(queued.depth, link) {
                Discovery::Enqueued => stats.links_enqueued += 1,
                Discovery::Duplicate => stats.duplicate_links += 1,
                Discovery::TooDeep => stats.too_deep_links += 1,
                Discovery::Ignored => {}
            }
        }
    }

    fn report_progress(&self, scheduler: &Scheduler, stats: &CrawlStatistics, start: Instant) {
        let completed = stats.pages_completed();
        if completed == 0 || completed % PROGRESS_INTERVAL != 0 {
            return;
        }

        let rate = completed as f64 / start.elapsed().as_secs_f64().max(f64::EPSILON);
        tracing::info!(
            "Progress: {} pages crawled, {} in frontier, {} in flight, {:.2} pages/sec",
            completed,
            scheduler.frontier_size(),
            scheduler.in_flight(),
            rate
        );
    }
}

/// Runs a crawl over HTTP with CSV output
///
/// This builds the production collaborators from configuration:
///
/// 1. Compile the metadata selectors
/// 2. Create (truncate) the CSV output file
/// 3. Build the HTTP client
/// 4. Run the coordinator until completion or cancellation
///
/// Failures in steps 1–3 are startup errors and happen before any fetch.
///
/// # Example
///
/// ```no_run
/// use ripple_harvest::config::Config;
/// use ripple_harvest::crawler::run_crawl;
/// use ripple_harvest::url::parse_seed;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let seed = parse_seed("https://example.com/")?;
/// let outcome = run_crawl(&Config::default(), seed, CancellationToken::new()).await?;
/// println!("{} records", outcome.stats.records_written);
/// # Ok(())
/// # }
/// ```
pub async fn run_crawl(
    config: &Config,
    seed: CanonicalUrl,
    cancel: CancellationToken,
) -> crate::Result<CrawlOutcome> {
    let selectors = PageSelectors::from_config(&config.selectors)?;
    let sink = CsvSink::create(Path::new(&config.output.csv_path), config.output.write_header)?;
    let fetcher = HttpFetcher::from_config(&config.crawler, &config.user_agent)?;

    let coordinator = Coordinator::new(
        Arc::new(fetcher),
        Arc::new(sink),
        selectors,
        CrawlOptions::from_config(config),
    );

    coordinator.run(seed, cancel).await
}
