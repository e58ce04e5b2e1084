use clap::Parser;
use scrape_core::{term_stems, CrawlConfig, RetryPolicy};
use std::time::Duration;

use crate::fetch::ProxyEndpoint;

#[derive(Parser, Debug)]
#[command(name = "crawler")]
#[command(about = "Scrape search listings, then every listed product page, to CSV")]
pub struct Cli {
    /// Search terms, comma separated
    #[arg(long, value_delimiter = ',', default_value = "laptop,headphones")]
    pub terms: Vec<String>,
    /// Listing pages to scrape per term
    #[arg(long, default_value_t = 1)]
    pub pages: u32,
    /// Maximum work items in flight
    #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u64).range(1..))]
    pub concurrency: u64,
    /// Retries after the first failed attempt of one page
    #[arg(long, default_value_t = 3)]
    pub max_retries: u32,
    /// Delay before the first retry; doubles for each later retry
    #[arg(long, default_value_t = 1000)]
    pub retry_backoff_ms: u64,
    /// Records buffered per output file before a flush
    #[arg(long, default_value_t = 10)]
    pub batch_size: usize,
    /// Country code the proxy renders from
    #[arg(long, default_value = "us")]
    pub country: String,
    /// Milliseconds the proxy waits for the page to settle
    #[arg(long, default_value_t = 5000)]
    pub wait_ms: u64,
    /// Site whose search and product pages are scraped
    #[arg(long, default_value = "https://www.amazon.com")]
    pub site: String,
    /// Directory for the CSV output files
    #[arg(long, default_value = "./output")]
    pub output_dir: String,
    /// Rendering proxy host
    #[arg(long, env = "SCRAPER_PROXY_HOST")]
    pub proxy_host: String,
    /// Rendering proxy API key
    #[arg(long, env = "SCRAPER_API_KEY", hide_env_values = true)]
    pub api_key: String,
    /// Request timeout seconds
    #[arg(long, default_value_t = 90)]
    pub timeout_secs: u64,
    #[arg(long, default_value = "scrape-crawler/0.1")]
    pub user_agent: String,
    /// Log failed items and continue instead of aborting the phase
    #[arg(long, default_value_t = false)]
    pub keep_going: bool,
}

impl Cli {
    pub fn crawl_config(&self) -> CrawlConfig {
        CrawlConfig {
            terms: term_stems(&self.terms).into_iter().map(|(term, _)| term).collect(),
            pages: self.pages,
            concurrency: self.concurrency as usize,
            retry: RetryPolicy {
                max_retries: self.max_retries,
                backoff: Duration::from_millis(self.retry_backoff_ms),
            },
            batch_size: self.batch_size,
            keep_going: self.keep_going,
        }
    }

    pub fn endpoint(&self) -> ProxyEndpoint {
        ProxyEndpoint {
            host: self.proxy_host.clone(),
            api_key: self.api_key.clone(),
            country: self.country.clone(),
            wait_ms: self.wait_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_term_list_and_defaults() {
        let cli = Cli::try_parse_from([
            "crawler",
            "--terms",
            "usb hub, desk lamp,,usb hub",
            "--proxy-host",
            "proxy.test",
            "--api-key",
            "k",
        ])
        .unwrap();
        let cfg = cli.crawl_config();
        assert_eq!(cfg.terms, vec!["usb hub", "desk lamp"]);
        assert_eq!(cfg.concurrency, 5);
        assert_eq!(cfg.retry.max_retries, 3);
        assert!(!cfg.keep_going);
    }

    #[test]
    fn rejects_zero_concurrency() {
        let res = Cli::try_parse_from([
            "crawler", "--concurrency", "0", "--proxy-host", "p", "--api-key", "k",
        ]);
        assert!(res.is_err());
    }
}
