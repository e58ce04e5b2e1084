mod cli;
mod extract;
mod fetch;

use anyhow::Result;
use clap::Parser;
use reqwest::Client;
use scrape_core::{Crawl, CsvStore};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use cli::Cli;
use extract::ProductPageExtractor;
use fetch::ProxyRenderer;

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();
    let args = Cli::parse();

    let store = CsvStore::new(&args.output_dir)?;
    let client = Client::builder()
        .user_agent(args.user_agent.clone())
        .redirect(reqwest::redirect::Policy::limited(5))
        .timeout(Duration::from_secs(args.timeout_secs))
        .build()?;
    let renderer = ProxyRenderer::new(client, args.endpoint());
    let extractor = ProductPageExtractor::new(&args.site)?;
    let config = args.crawl_config();

    info!(
        terms = ?config.terms,
        pages = config.pages,
        concurrency = config.concurrency,
        max_retries = config.retry.max_retries,
        batch_size = config.batch_size,
        keep_going = config.keep_going,
        output = %args.output_dir,
        "crawler starting"
    );

    let summary = Crawl::new(&renderer, &extractor, &store, config).run().await?;

    info!(
        listing_tasks = summary.listing.tasks,
        listing_rows = summary.listing.written,
        detail_tasks = summary.detail.tasks,
        detail_rows = summary.detail.written,
        duplicates = summary.listing.duplicates + summary.detail.duplicates,
        failed = summary.listing.failed + summary.detail.failed,
        output = %args.output_dir,
        "crawl complete"
    );
    Ok(())
}
