//! Ripple-Harvest main entry point
//!
//! This is the command-line interface for the Ripple-Harvest crawler.

use anyhow::Context;
use clap::Parser;
use ripple_harvest::config::{compute_config_hash, load_config, validate, Config};
use ripple_harvest::crawler::{run_crawl, CrawlStatus};
use ripple_harvest::output::print_statistics;
use ripple_harvest::url::{parse_seed, CanonicalUrl};
use std::future::Future;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Exit status when the operator stopped the crawl (128 + SIGINT)
const EXIT_CANCELLED: u8 = 130;

/// Ripple-Harvest: a concurrent article metadata crawler
///
/// Starting from SEED_URL, Ripple-Harvest fetches pages, extracts the title,
/// author and publish date of each, follows every link it finds exactly once,
/// and writes one CSV row per page.
#[derive(Parser, Debug)]
#[command(name = "ripple-harvest")]
#[command(version)]
#[command(about = "A concurrent article metadata crawler", long_about = None)]
struct Cli {
    /// Absolute http(s) URL to start crawling from
    #[arg(value_name = "SEED_URL")]
    seed: String,

    /// Path to an optional TOML configuration file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Maximum number of concurrent fetches
    #[arg(short = 'c', long, value_name = "N")]
    concurrency: Option<usize>,

    /// Per-fetch timeout in seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// CSV file to write records to
    #[arg(short, long, value_name = "PATH")]
    output: Option<String>,

    /// Maximum link distance from the seed
    #[arg(long, value_name = "N")]
    max_depth: Option<u32>,

    /// Only follow links into these hosts (repeatable, `*.` wildcards allowed)
    #[arg(long = "allow-domain", value_name = "PATTERN")]
    allowed_domains: Vec<String>,

    /// Write a header row before the records
    #[arg(long)]
    header: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate the seed and configuration, print them, and exit
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let (config, seed) = match prepare(&cli) {
        Ok(prepared) => prepared,
        Err(e) => {
            tracing::error!("{:#}", e);
            return ExitCode::FAILURE;
        }
    };

    if cli.dry_run {
        print_dry_run(&config, &seed);
        return ExitCode::SUCCESS;
    }

    let cancel = CancellationToken::new();
    spawn_signal_handler(cancel.clone());

    match run_crawl(&config, seed, cancel).await {
        Ok(outcome) => {
            if !cli.quiet {
                print_statistics(&outcome.stats);
            }
            match outcome.status {
                CrawlStatus::Completed => {
                    tracing::info!("Records written to {}", config.output.csv_path);
                    ExitCode::SUCCESS
                }
                CrawlStatus::Cancelled => {
                    tracing::warn!(
                        "Crawl cancelled; partial records written to {}",
                        config.output.csv_path
                    );
                    ExitCode::from(EXIT_CANCELLED)
                }
            }
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Loads configuration, applies command-line overrides, and parses the seed
fn prepare(cli: &Cli) -> anyhow::Result<(Config, CanonicalUrl)> {
    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            load_config(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))?
        }
        None => Config::default(),
    };

    apply_overrides(&mut config, cli);
    validate(&config).context("Invalid configuration")?;
    tracing::debug!("Configuration fingerprint: {}", compute_config_hash(&config));

    let seed = parse_seed(&cli.seed)
        .with_context(|| format!("Invalid seed URL '{}'", cli.seed))?;

    Ok((config, seed))
}

fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(concurrency) = cli.concurrency {
        config.crawler.max_concurrent_fetches = concurrency;
    }
    if let Some(timeout) = cli.timeout {
        config.crawler.fetch_timeout_secs = timeout;
    }
    if let Some(depth) = cli.max_depth {
        config.crawler.max_depth = Some(depth);
    }
    if !cli.allowed_domains.is_empty() {
        config.crawler.allowed_domains = cli.allowed_domains.clone();
    }
    if let Some(output) = &cli.output {
        config.output.csv_path = output.clone();
    }
    if cli.header {
        config.output.write_header = true;
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("ripple_harvest=info,warn"),
            1 => EnvFilter::new("ripple_harvest=debug,info"),
            2 => EnvFilter::new("ripple_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Drains the crawl on the first Ctrl-C and exits on the second
fn spawn_signal_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if watch_interrupts(tokio::signal::ctrl_c, cancel).await {
            std::process::exit(i32::from(EXIT_CANCELLED));
        }
    });
}

/// Cancels `cancel` on the first interrupt
///
/// Returns true once a second interrupt arrives, false if the interrupt
/// source failed.
async fn watch_interrupts<F, Fut>(mut next_interrupt: F, cancel: CancellationToken) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::io::Result<()>>,
{
    if let Err(e) = next_interrupt().await {
        tracing::error!("Failed to listen for Ctrl-C: {}", e);
        return false;
    }

    tracing::warn!("Interrupt received, finishing in-flight pages (Ctrl-C again to exit now)");
    cancel.cancel();

    match next_interrupt().await {
        Ok(()) => {
            tracing::warn!("Second interrupt received, exiting without draining");
            true
        }
        Err(e) => {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            false
        }
    }
}

fn print_dry_run(config: &Config, seed: &CanonicalUrl) {
    println!("=== Ripple-Harvest Dry Run ===\n");

    println!("Seed: {}\n", seed);

    println!("Crawler Configuration:");
    println!(
        "  Max concurrent fetches: {}",
        config.crawler.max_concurrent_fetches
    );
    println!("  Fetch timeout: {}s", config.crawler.fetch_timeout_secs);
    println!("  Max redirects: {}", config.crawler.max_redirects);
    match config.crawler.max_depth {
        Some(depth) => println!("  Max depth: {}", depth),
        None => println!("  Max depth: unlimited"),
    }
    if config.crawler.allowed_domains.is_empty() {
        println!("  Allowed domains: any");
    } else {
        println!("  Allowed domains:");
        for pattern in &config.crawler.allowed_domains {
            println!("    - {}", pattern);
        }
    }

    println!("\nUser Agent: {}", config.user_agent.header_value());

    println!("\nSelectors:");
    println!("  Title: {}", config.selectors.title);
    println!("  Author: {}", config.selectors.author);
    println!("  Date: {}", config.selectors.date);
    println!("  Links: {}", config.selectors.links);

    println!("\nOutput:");
    println!("  CSV: {}", config.output.csv_path);
    println!("  Header row: {}", config.output.write_header);

    println!("\n✓ Configuration is valid");
}
