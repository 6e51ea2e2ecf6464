mod models;
mod scrapers;

use anyhow::Context;
use scrapers::{ChromeSession, CrawlDriver, CrawlerConfig, FileSink};
use std::sync::atomic::Ordering;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("🏠 Stay Scout - listing crawler");
    info!("==========================================");

    let config = CrawlerConfig::from_env()?;
    info!(
        seeds = config.seed_urls.len(),
        max_apartments = config.max_apartments,
        results_dir = %config.results_dir.display(),
        "Loaded configuration"
    );

    let sink = FileSink::new(&config.results_dir, &config.profile.file_prefix)?;
    let session = ChromeSession::launch(&config)?;
    let seed_urls = config.seed_urls.clone();

    let mut driver = CrawlDriver::new(session, sink, config);
    let stop = driver.stop_handle();

    // The browser API is blocking, so the crawl runs off the async workers
    let crawl = tokio::task::spawn_blocking(move || {
        let summaries = driver.run(&seed_urls);
        driver.shutdown();
        summaries
    });

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Ctrl-C received, finishing current page and saving results...");
            stop.store(true, Ordering::SeqCst);
        }
    });

    let summaries = crawl.await.context("Crawl task panicked")?;

    info!("\n✅ Crawled {} search URLs\n", summaries.len());
    for (i, summary) in summaries.iter().enumerate() {
        println!(
            "{}. {:?} with {} listings",
            i + 1,
            summary.termination,
            summary.records
        );
        println!("   URL: {}", summary.seed_url);
    }

    Ok(())
}
