//! Two-stage crawl: listing pages first, then the detail page of every
//! listed item.

use crate::error::Result;
use crate::record::{DetailRecord, SearchRecord, NO_URL};
use crate::retry::{run_with_retry, RetryPolicy};
use crate::scheduler::{run_bounded, run_bounded_settled};
use crate::session::{PageExtractor, Renderer};
use crate::store::TabularStore;
use crate::writer::{DedupWriter, WriterStats};
use std::collections::HashSet;
use std::future::Future;
use tracing::{error, info, warn};

const SEARCH_SUFFIX: &str = "_search.csv";
const DETAILS_SUFFIX: &str = "_details.csv";

#[derive(Debug, Clone)]
pub struct CrawlConfig {
    pub terms: Vec<String>,
    /// Listing pages per term, numbered from 1.
    pub pages: u32,
    pub concurrency: usize,
    pub retry: RetryPolicy,
    pub batch_size: usize,
    /// Isolate failed items instead of aborting the phase.
    pub keep_going: bool,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            terms: Vec::new(),
            pages: 1,
            concurrency: 5,
            retry: RetryPolicy::default(),
            batch_size: 10,
            keep_going: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhaseTotals {
    pub tasks: usize,
    pub written: usize,
    pub duplicates: usize,
    pub failed: usize,
}

impl PhaseTotals {
    fn record(&mut self, stats: WriterStats) {
        self.written += stats.written;
        self.duplicates += stats.duplicates;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlSummary {
    pub listing: PhaseTotals,
    pub detail: PhaseTotals,
}

/// Lowercased term with every non-alphanumeric character replaced by `_`.
pub fn term_slug(term: &str) -> String {
    term.trim()
        .chars()
        .map(|c| if c.is_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect()
}

/// Distinct, non-blank terms in first-seen order, each paired with a file
/// stem no other term shares. A term whose slug is already taken gets its
/// position appended (`usb-hub` after `usb hub` becomes `usb_hub_1`).
pub fn term_stems(terms: &[String]) -> Vec<(String, String)> {
    let mut seen_terms = HashSet::new();
    let mut used = HashSet::new();
    let mut out = Vec::new();
    for (idx, term) in terms.iter().enumerate() {
        let term = term.trim();
        if term.is_empty() || !seen_terms.insert(term.to_string()) {
            continue;
        }
        let base = term_slug(term);
        let mut stem = base.clone();
        let mut n = idx;
        while used.contains(&stem) {
            stem = format!("{base}_{n}");
            n += 1;
        }
        used.insert(stem.clone());
        out.push((term.to_string(), stem));
    }
    out
}

/// Listing output file for one term stem and page.
pub fn search_destination(stem: &str, page: u32) -> String {
    format!("{stem}_page_{page}{SEARCH_SUFFIX}")
}

/// Detail output file paired with a listing output file.
pub fn details_destination(search: &str) -> String {
    match search.strip_suffix(SEARCH_SUFFIX) {
        Some(stem) => format!("{stem}{DETAILS_SUFFIX}"),
        None => format!("{search}{DETAILS_SUFFIX}"),
    }
}

/// Drives the listing phase and then the detail phase through the bounded
/// scheduler, one writer per work item.
pub struct Crawl<'a, R, X, S> {
    renderer: &'a R,
    extractor: &'a X,
    store: &'a S,
    config: CrawlConfig,
}

impl<'a, R, X, S> Crawl<'a, R, X, S>
where
    R: Renderer,
    X: PageExtractor,
    S: TabularStore,
{
    pub fn new(renderer: &'a R, extractor: &'a X, store: &'a S, config: CrawlConfig) -> Self {
        Self { renderer, extractor, store, config }
    }

    pub async fn run(&self) -> Result<CrawlSummary> {
        info!(terms = self.config.terms.len(), pages = self.config.pages, concurrency = self.config.concurrency, "listing phase starting");
        let (destinations, listing) = self.scrape_listings().await?;
        info!(tasks = listing.tasks, written = listing.written, duplicates = listing.duplicates, failed = listing.failed, "listing phase complete");

        let collected = self.collect_urls(&destinations)?;
        let urls: usize = collected.iter().map(|(_, u)| u.len()).sum();
        info!(files = collected.len(), urls, "detail phase starting");
        let detail = self.scrape_details(&collected).await?;
        info!(tasks = detail.tasks, written = detail.written, duplicates = detail.duplicates, failed = detail.failed, "detail phase complete");

        Ok(CrawlSummary { listing, detail })
    }

    /// Stage 1. Returns the listing destinations in term/page order.
    /// Repeated terms are scraped once and every destination has one writer.
    pub async fn scrape_listings(&self) -> Result<(Vec<String>, PhaseTotals)> {
        let stems = term_stems(&self.config.terms);
        if stems.len() < self.config.terms.len() {
            warn!(given = self.config.terms.len(), distinct = stems.len(), "blank or repeated search terms dropped");
        }
        let mut jobs = Vec::new();
        for (term, stem) in &stems {
            for page in 1..=self.config.pages {
                jobs.push((term.as_str(), page, search_destination(stem, page)));
            }
        }
        let destinations: Vec<String> = jobs.iter().map(|(_, _, d)| d.clone()).collect();
        let items: Vec<_> = jobs.into_iter().map(|(term, page, destination)| self.listing_task(term, page, destination)).collect();
        let totals = self.run_phase("listing", items).await?;
        Ok((destinations, totals))
    }

    /// Reads back the `url` column of every listing destination.
    pub fn collect_urls(&self, destinations: &[String]) -> Result<Vec<(String, Vec<String>)>> {
        let mut collected = Vec::with_capacity(destinations.len());
        for d in destinations {
            collected.push((d.clone(), self.store.read_urls(d)?));
        }
        Ok(collected)
    }

    /// Stage 2. One work item per collected URL, written next to its listing file.
    pub async fn scrape_details(&self, collected: &[(String, Vec<String>)]) -> Result<PhaseTotals> {
        let mut items = Vec::new();
        for (search, urls) in collected {
            let destination = details_destination(search);
            for url in urls {
                if url == NO_URL {
                    warn!(source = %search, "listing row without URL skipped");
                    continue;
                }
                items.push(self.detail_task(destination.clone(), url));
            }
        }
        self.run_phase("detail", items).await
    }

    async fn listing_task(&self, term: &str, page: u32, destination: String) -> Result<WriterStats> {
        let url = self.extractor.listing_url(term, page);
        let mut writer = DedupWriter::new(self.store, destination, self.config.batch_size);
        let outcome = run_with_retry(self.renderer, &url, self.config.retry, |html| {
            for raw in self.extractor.extract_listing(html)? {
                writer.add(SearchRecord::validate(raw))?;
            }
            Ok(())
        })
        .await;
        let closed = writer.close();
        outcome?;
        closed
    }

    async fn detail_task(&self, destination: String, url: &str) -> Result<WriterStats> {
        let mut writer = DedupWriter::new(self.store, destination, self.config.batch_size);
        let outcome = run_with_retry(self.renderer, url, self.config.retry, |html| {
            let raw = self.extractor.extract_detail(html)?;
            writer.add(DetailRecord::validate(raw))?;
            Ok(())
        })
        .await;
        let closed = writer.close();
        outcome?;
        closed
    }

    async fn run_phase<F>(&self, phase: &str, items: Vec<F>) -> Result<PhaseTotals>
    where
        F: Future<Output = Result<WriterStats>>,
    {
        let mut totals = PhaseTotals { tasks: items.len(), ..Default::default() };
        if self.config.keep_going {
            for outcome in run_bounded_settled(items, self.config.concurrency).await {
                match outcome {
                    Ok(stats) => totals.record(stats),
                    Err(e) => {
                        error!(phase, error = %e, "work item failed");
                        totals.failed += 1;
                    }
                }
            }
        } else {
            for stats in run_bounded(items, self.config.concurrency).await? {
                totals.record(stats);
            }
        }
        Ok(totals)
    }
}
