//! Integration tests for the crawler
//!
//! The HTTP tests use wiremock to serve small link graphs and run the full
//! crawl cycle end-to-end into a CSV file. The concurrency and cancellation
//! tests drive the coordinator with in-process fetchers so they can observe
//! and hold individual fetches.

use async_trait::async_trait;
use ripple_harvest::config::Config;
use ripple_harvest::crawler::{
    run_crawl, Coordinator, CrawlOptions, CrawlPhase, CrawlStatus, FetchError, FetchedPage,
    Fetcher, PageRecord, PageSelectors,
};
use ripple_harvest::output::{OutputResult, RecordSink};
use ripple_harvest::url::{parse_seed, CanonicalUrl};
use ripple_harvest::HarvestError;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration writing to `csv_path`
fn create_test_config(csv_path: &Path) -> Config {
    let mut config = Config::default();
    config.crawler.max_concurrent_fetches = 4;
    config.crawler.fetch_timeout_secs = 5;
    config.user_agent.crawler_name = "TestBot".to_string();
    config.output.csv_path = csv_path.display().to_string();
    config
}

fn html_page(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(
        format!("<html><body>{}</body></html>", body),
        "text/html; charset=utf-8",
    )
}

async fn mount_page(server: &MockServer, route: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(html_page(body))
        .expect(1)
        .mount(server)
        .await;
}

fn read_rows(path: &Path) -> Vec<Vec<String>> {
    csv::ReaderBuilder::new()
        .has_headers(false)
        .from_path(path)
        .expect("Failed to open CSV output")
        .records()
        .map(|r| {
            r.expect("Malformed CSV row")
                .iter()
                .map(str::to_string)
                .collect()
        })
        .collect()
}

#[tokio::test]
async fn test_full_crawl_writes_one_row_per_page() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_page(
        &mock_server,
        "/",
        &format!(
            r#"<h1 class="the-article-title">Home</h1>
            <span class="author">Editor</span>
            <a href="{}/page1">Page 1</a>
            <a href="page2">Page 2</a>
            <a href="mailto:editor@example.com">Mail</a>"#,
            base_url
        ),
    )
    .await;
    mount_page(
        &mock_server,
        "/page1",
        r#"<h1 class="the-article-title">First, "quoted"</h1>
        <span class="author">Ann</span>
        <time class="the-article-publish">2021-03-04</time>"#,
    )
    .await;
    mount_page(&mock_server, "/page2", "<p>No metadata here</p>").await;

    let dir = tempfile::tempdir().unwrap();
    let csv_path = dir.path().join("output.csv");
    let config = create_test_config(&csv_path);

    let seed = parse_seed(&format!("{}/", base_url)).unwrap();
    let outcome = run_crawl(&config, seed, CancellationToken::new())
        .await
        .expect("Crawl failed");

    assert_eq!(outcome.status, CrawlStatus::Completed);
    assert_eq!(outcome.phase, CrawlPhase::Terminated);
    assert_eq!(outcome.stats.pages_fetched, 3);
    assert_eq!(outcome.stats.records_written, 3);
    assert_eq!(outcome.stats.pages_dispatched, outcome.stats.pages_completed());

    let mut rows = read_rows(&csv_path);
    rows.sort();
    assert_eq!(
        rows,
        vec![
            vec![
                format!("{}/", base_url),
                "Home".to_string(),
                "Editor".to_string(),
                "empty".to_string(),
            ],
            vec![
                format!("{}/page1", base_url),
                "First, \"quoted\"".to_string(),
                "Ann".to_string(),
                "2021-03-04".to_string(),
            ],
            vec![
                format!("{}/page2", base_url),
                "empty".to_string(),
                "empty".to_string(),
                "empty".to_string(),
            ],
        ]
    );

    mock_server.verify().await;
}

#[tokio::test]
async fn test_page_reachable_twice_is_fetched_once() {
    let mock_server = MockServer::start().await;

    // Diamond: / -> a, b; a -> c; b -> c, /
    mount_page(&mock_server, "/", r#"<a href="/a">a</a><a href="/b">b</a>"#).await;
    mount_page(&mock_server, "/a", r#"<a href="/c">c</a>"#).await;
    mount_page(&mock_server, "/b", r#"<a href="c">c</a><a href="/">home</a>"#).await;
    mount_page(&mock_server, "/c", r#"<a href="/a">a</a>"#).await;

    let dir = tempfile::tempdir().unwrap();
    let csv_path = dir.path().join("output.csv");
    let config = create_test_config(&csv_path);

    let seed = parse_seed(&format!("{}/", mock_server.uri())).unwrap();
    let outcome = run_crawl(&config, seed, CancellationToken::new())
        .await
        .expect("Crawl failed");

    assert_eq!(outcome.stats.pages_dispatched, 4);
    assert_eq!(outcome.stats.duplicate_links, 3);
    assert_eq!(read_rows(&csv_path).len(), 4);

    // Each mock expects exactly one request
    mock_server.verify().await;
}

#[tokio::test]
async fn test_http_errors_do_not_abort_crawl() {
    let mock_server = MockServer::start().await;

    mount_page(
        &mock_server,
        "/",
        r#"<a href="/broken">broken</a><a href="/missing">missing</a>
           <a href="/image">image</a><a href="/ok">ok</a>"#,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/image"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(vec![0x89u8, 0x50, 0x4E, 0x47], "image/png"),
        )
        .expect(1)
        .mount(&mock_server)
        .await;
    mount_page(&mock_server, "/ok", r#"<h1 class="the-article-title">Fine</h1>"#).await;

    let dir = tempfile::tempdir().unwrap();
    let csv_path = dir.path().join("output.csv");
    let config = create_test_config(&csv_path);

    let seed = parse_seed(&format!("{}/", mock_server.uri())).unwrap();
    let outcome = run_crawl(&config, seed, CancellationToken::new())
        .await
        .expect("Crawl failed");

    assert_eq!(outcome.status, CrawlStatus::Completed);
    assert_eq!(outcome.stats.pages_fetched, 2);
    assert_eq!(outcome.stats.fetch_failures, 3);
    assert_eq!(read_rows(&csv_path).len(), 2);
}

#[tokio::test]
async fn test_slow_page_times_out() {
    let mock_server = MockServer::start().await;

    mount_page(&mock_server, "/", r#"<a href="/slow">slow</a>"#).await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(html_page("<p>late</p>").set_delay(Duration::from_secs(3)))
        .mount(&mock_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let csv_path = dir.path().join("output.csv");
    let mut config = create_test_config(&csv_path);
    config.crawler.fetch_timeout_secs = 1;

    let seed = parse_seed(&format!("{}/", mock_server.uri())).unwrap();
    let outcome = run_crawl(&config, seed, CancellationToken::new())
        .await
        .expect("Crawl failed");

    assert_eq!(outcome.status, CrawlStatus::Completed);
    assert_eq!(outcome.stats.fetch_failures, 1);
    assert_eq!(read_rows(&csv_path).len(), 1);
}

#[tokio::test]
async fn test_header_row_and_redirect_target() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(301)
                .insert_header("location", format!("{}/home", base_url).as_str()),
        )
        .mount(&mock_server)
        .await;
    mount_page(&mock_server, "/home", r#"<a href="story">story</a>"#).await;
    mount_page(&mock_server, "/story", "<p>story</p>").await;

    let dir = tempfile::tempdir().unwrap();
    let csv_path = dir.path().join("output.csv");
    let mut config = create_test_config(&csv_path);
    config.output.write_header = true;

    let seed = parse_seed(&format!("{}/", base_url)).unwrap();
    run_crawl(&config, seed, CancellationToken::new())
        .await
        .expect("Crawl failed");

    let rows = read_rows(&csv_path);
    assert_eq!(rows[0], vec!["url", "title", "author", "date"]);

    let mut urls: Vec<_> = rows[1..].iter().map(|r| r[0].clone()).collect();
    urls.sort();
    // Records carry the URL after redirects; relative links resolve against it
    assert_eq!(
        urls,
        vec![format!("{}/home", base_url), format!("{}/story", base_url)]
    );
}

#[tokio::test]
async fn test_redirect_target_fetched_and_recorded_once() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_page(&mock_server, "/", r#"<a href="/old">old</a>"#).await;
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(
            ResponseTemplate::new(301)
                .insert_header("location", format!("{}/new", base_url).as_str()),
        )
        .expect(1)
        .mount(&mock_server)
        .await;
    // Links back to itself and to the URL that redirected here
    mount_page(
        &mock_server,
        "/new",
        r#"<a href="/new">self</a><a href="/old">old</a>"#,
    )
    .await;

    let dir = tempfile::tempdir().unwrap();
    let csv_path = dir.path().join("output.csv");
    let config = create_test_config(&csv_path);

    let seed = parse_seed(&format!("{}/", base_url)).unwrap();
    let outcome = run_crawl(&config, seed, CancellationToken::new())
        .await
        .expect("Crawl failed");

    let mut urls: Vec<_> = read_rows(&csv_path).into_iter().map(|r| r[0].clone()).collect();
    urls.sort();
    assert_eq!(urls, vec![format!("{}/", base_url), format!("{}/new", base_url)]);
    assert_eq!(outcome.stats.duplicate_links, 2);

    mock_server.verify().await;
}

#[tokio::test]
async fn test_unwritable_output_is_startup_error() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(html_page("<p>never fetched</p>"))
        .expect(0)
        .mount(&mock_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let csv_path = dir.path().join("no-such-dir").join("output.csv");
    let config = create_test_config(&csv_path);

    let seed = parse_seed(&format!("{}/", mock_server.uri())).unwrap();
    let result = run_crawl(&config, seed, CancellationToken::new()).await;

    assert!(matches!(result, Err(HarvestError::Output(_))));
    mock_server.verify().await;
}

/// Sink that keeps records in memory and counts flushes
#[derive(Default)]
struct MemorySink {
    records: Mutex<Vec<PageRecord>>,
    flushes: AtomicUsize,
}

impl RecordSink for MemorySink {
    fn append(&self, record: &PageRecord) -> OutputResult<()> {
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }

    fn flush(&self) -> OutputResult<()> {
        self.flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

const SEED: &str = "https://wide.test/";

fn hub_page(fan_out: usize) -> String {
    (0..fan_out)
        .map(|i| format!(r#"<a href="/p{}">p{}</a>"#, i, i))
        .collect()
}

/// Serves a hub page linking to many leaves and records peak concurrency
struct CountingFetcher {
    fan_out: usize,
    active: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

#[async_trait]
impl Fetcher for CountingFetcher {
    async fn fetch(&self, url: &CanonicalUrl) -> Result<FetchedPage, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(Duration::from_millis(2)).await;

        self.active.fetch_sub(1, Ordering::SeqCst);
        let body = if url.as_str() == SEED {
            hub_page(self.fan_out)
        } else {
            format!(r#"<h1 class="the-article-title">{}</h1>"#, url.as_url().path())
        };
        Ok(FetchedPage::html(url, body))
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrency_never_exceeds_limit() {
    let fetcher = Arc::new(CountingFetcher {
        fan_out: 100,
        active: AtomicUsize::new(0),
        peak: AtomicUsize::new(0),
        calls: AtomicUsize::new(0),
    });
    let sink = Arc::new(MemorySink::default());
    let options = CrawlOptions {
        max_concurrent: 4,
        ..CrawlOptions::default()
    };

    let coordinator = Coordinator::new(
        Arc::clone(&fetcher),
        Arc::clone(&sink),
        PageSelectors::default(),
        options,
    );
    let outcome = coordinator
        .run(parse_seed(SEED).unwrap(), CancellationToken::new())
        .await
        .expect("Crawl failed");

    assert_eq!(outcome.status, CrawlStatus::Completed);
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 101);
    assert!(fetcher.peak.load(Ordering::SeqCst) <= 4);
    assert_eq!(fetcher.active.load(Ordering::SeqCst), 0);
    assert_eq!(sink.records.lock().unwrap().len(), 101);
    assert_eq!(sink.flushes.load(Ordering::SeqCst), 1);
}

/// Serves the hub immediately but holds every leaf until the gate opens
struct GatedFetcher {
    fan_out: usize,
    started: mpsc::UnboundedSender<String>,
    gate: Semaphore,
    calls: AtomicUsize,
}

#[async_trait]
impl Fetcher for GatedFetcher {
    async fn fetch(&self, url: &CanonicalUrl) -> Result<FetchedPage, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if url.as_str() == SEED {
            return Ok(FetchedPage::html(url, hub_page(self.fan_out)));
        }

        let _ = self.started.send(url.to_string());
        let _permit = self.gate.acquire().await.expect("gate closed");
        Ok(FetchedPage::html(url, "<p>leaf</p>"))
    }
}

#[tokio::test]
async fn test_cancellation_drains_in_flight_fetches() {
    let (started_tx, mut started_rx) = mpsc::unbounded_channel();
    let fetcher = Arc::new(GatedFetcher {
        fan_out: 10,
        started: started_tx,
        gate: Semaphore::new(0),
        calls: AtomicUsize::new(0),
    });
    let sink = Arc::new(MemorySink::default());
    let options = CrawlOptions {
        max_concurrent: 4,
        ..CrawlOptions::default()
    };
    let coordinator = Coordinator::new(
        Arc::clone(&fetcher),
        Arc::clone(&sink),
        PageSelectors::default(),
        options,
    );

    let cancel = CancellationToken::new();
    let control = async {
        // Wait until every slot holds a leaf fetch
        for _ in 0..4 {
            started_rx.recv().await.expect("fetcher dropped");
        }
        cancel.cancel();
        // Give the coordinator a chance to observe the signal before releasing
        tokio::time::sleep(Duration::from_millis(20)).await;
        fetcher.gate.add_permits(100);
    };

    let (outcome, ()) = tokio::join!(
        coordinator.run(parse_seed(SEED).unwrap(), cancel.clone()),
        control
    );
    let outcome = outcome.expect("Crawl failed");

    assert_eq!(outcome.status, CrawlStatus::Cancelled);
    assert_eq!(outcome.phase, CrawlPhase::Terminated);
    // Seed plus the four fetches that were in flight; nothing after the signal
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 5);
    assert_eq!(outcome.stats.pages_dispatched, 5);
    assert_eq!(outcome.stats.abandoned_urls, 6);
    assert_eq!(sink.records.lock().unwrap().len(), 5);
    assert_eq!(sink.flushes.load(Ordering::SeqCst), 1);
}
