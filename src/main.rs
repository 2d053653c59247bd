//! Kobo-Harvest main entry point
//!
//! This is the command-line interface for the Kobo-Harvest monthly
//! new-release catalog harvester.

use clap::Parser;
use kobo_harvest::config::{load_config_with_hash, Config};
use kobo_harvest::crawler::listing_url;
use kobo_harvest::harvester::SnapshotSource;
use kobo_harvest::output::{load_statistics, print_listing, print_statistics};
use kobo_harvest::storage::JsonSnapshotStore;
use kobo_harvest::{Harvester, Period};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use url::Url;

/// Kobo-Harvest: a monthly new-release catalog harvester
///
/// Kobo-Harvest crawls the monthly release calendar, drops per-chapter and
/// split-volume variants, caches a cover per title and keeps the result,
/// together with your reservation marks, in one JSON snapshot per month.
#[derive(Parser, Debug)]
#[command(name = "kobo-harvest")]
#[command(version = "1.0.0")]
#[command(about = "A monthly new-release catalog harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (built-in defaults when omitted)
    #[arg(value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Month to harvest, as YYYY-MM (defaults to the current month)
    #[arg(short, long, value_name = "YYYY-MM", value_parser = parse_period)]
    period: Option<Period>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Crawl even when a snapshot exists
    #[arg(long)]
    refresh: bool,

    /// Re-fetch covers of a loaded snapshot
    #[arg(long, conflicts_with = "refresh")]
    refresh_images: bool,

    /// Toggle the reservation of the N-th record (release-date order, from 1)
    #[arg(long, value_name = "N")]
    reserve: Vec<usize>,

    /// Validate config and show the first listing URL without crawling
    #[arg(long, conflicts_with_all = ["stats", "refresh", "refresh_images"])]
    dry_run: bool,

    /// Show statistics of the stored snapshot and exit
    #[arg(long, conflicts_with_all = ["dry_run", "refresh", "refresh_images"])]
    stats: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            match load_config_with_hash(path) {
                Ok((cfg, hash)) => {
                    tracing::info!("Configuration loaded successfully (hash: {})", hash);
                    cfg
                }
                Err(e) => {
                    tracing::error!("Failed to load configuration: {}", e);
                    return Err(e.into());
                }
            }
        }
        None => {
            tracing::info!("No configuration file given, using defaults");
            Config::default()
        }
    };

    let period = cli.period.unwrap_or_else(Period::current);

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config, period)?;
    } else if cli.stats {
        handle_stats(&config, period)?;
    } else {
        handle_harvest(config, period, &cli).await?;
    }

    Ok(())
}

fn parse_period(value: &str) -> Result<Period, String> {
    value.parse().map_err(|e: kobo_harvest::HarvestError| e.to_string())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("kobo_harvest=info,warn"),
            1 => EnvFilter::new("kobo_harvest=debug,info"),
            2 => EnvFilter::new("kobo_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: shows the effective configuration
fn handle_dry_run(config: &Config, period: Period) -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Kobo-Harvest Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Listing URL: {}", config.crawler.listing_url);
    println!("  Page workers: {}", config.crawler.max_concurrency);
    println!("  Page ceiling: {}", config.crawler.max_pages);
    println!("  Attempts per page: {}", config.crawler.page_retries());
    println!("  Retry base delay: {}ms", config.crawler.retry_base_delay_ms);
    println!("  Request timeout: {}s", config.crawler.request_timeout_secs);

    println!("\nUser Agent:");
    println!("  User-Agent: {}", config.user_agent.user_agent);
    println!("  Referer: {}", config.user_agent.referer);
    println!("  Accept-Language: {}", config.user_agent.accept_language);

    println!("\nClassifier:");
    println!("  Threshold: {}", config.classifier.threshold);
    println!(
        "  Patterns ({}, +{} each):",
        config.classifier.patterns.len(),
        config.classifier.pattern_score
    );
    for pattern in &config.classifier.patterns {
        println!("    - {}", pattern);
    }
    for tier in &config.classifier.price_tiers {
        println!(
            "  Price <= {}{}: +{}",
            tier.max_price, config.classifier.currency_suffix, tier.score
        );
    }
    println!(
        "  Bundle markers {:?}: -{}",
        config.classifier.bundle_markers, config.classifier.bundle_penalty
    );

    println!("\nImages:");
    println!("  Workers: {}", config.images.max_concurrency);
    println!("  Attempts per cover: {}", config.images.max_retries);
    println!("  Resize factor: {}", config.images.resize_factor);
    println!("  JPEG quality: {}", config.images.jpeg_quality);

    println!("\nOutput:");
    let store = JsonSnapshotStore::new(&config.output.data_dir);
    println!("  Snapshot: {}", store.records_path(period).display());
    println!("  Reservations: {}", store.reservations_path(period).display());

    let base = Url::parse(&config.crawler.listing_url)?;
    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would start crawling {} at {}",
        period,
        listing_url(&base, period, 1)
    );

    Ok(())
}

/// Handles the --stats mode: shows statistics of the stored snapshot
fn handle_stats(config: &Config, period: Period) -> Result<(), Box<dyn std::error::Error>> {
    let store = JsonSnapshotStore::new(&config.output.data_dir);
    println!("Snapshot: {}\n", store.records_path(period).display());

    match load_statistics(&store, period)? {
        Some(stats) => print_statistics(&stats),
        None => println!("No snapshot for {}", period),
    }

    Ok(())
}

/// Handles the main harvest operation
async fn handle_harvest(
    config: Config,
    period: Period,
    cli: &Cli,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut harvester = Harvester::new(config)?;

    let shutdown = harvester.shutdown_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, stopping");
            shutdown.cancel();
        }
    });

    match harvester.load_or_crawl(period, cli.refresh).await {
        Ok(SnapshotSource::Loaded) => {
            tracing::info!("Using stored snapshot for {}", period);
            if cli.refresh_images {
                harvester.start_images().await;
            }
        }
        Ok(SnapshotSource::Crawled(summary)) => {
            tracing::info!("Crawled {}", summary);
        }
        Err(e) => {
            tracing::error!("Harvest failed: {}", e);
            return Err(e.into());
        }
    }

    if !cli.reserve.is_empty() {
        let ordered = harvester.records_by_release_date();
        for &n in &cli.reserve {
            match n.checked_sub(1).and_then(|i| ordered.get(i)) {
                Some(handle) => {
                    let reserved = handle.toggle_reserved();
                    tracing::info!(
                        "Record {} ({}) reserved: {}",
                        n,
                        handle.lock().title,
                        reserved
                    );
                }
                None => tracing::warn!("No record #{} (have {})", n, ordered.len()),
            }
        }
    }

    wait_for_images(&mut harvester).await;
    harvester.save()?;

    if !cli.quiet {
        let records: Vec<_> = harvester
            .records_by_release_date()
            .iter()
            .map(|h| h.snapshot())
            .collect();
        print_listing(&records);
    }

    Ok(())
}

/// Logs image progress until the session finishes
async fn wait_for_images(harvester: &mut Harvester) {
    let mut last_percent = None;
    while let Some(progress) = harvester.image_progress() {
        if !progress.in_progress {
            break;
        }
        if last_percent != Some(progress.percent) {
            tracing::info!(
                "Covers: {}% ({}/{}, {} downloaded)",
                progress.percent,
                progress.completed,
                progress.total,
                progress.images_loaded
            );
            last_percent = Some(progress.percent);
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
    harvester.wait_for_images().await;
}
