//! Orchestration core for two-phase bulk scraping: bounded scheduling,
//! per-item retry, and deduplicating batched persistence.

pub mod crawl;
pub mod error;
pub mod record;
pub mod retry;
pub mod scheduler;
pub mod session;
pub mod store;
pub mod writer;

pub use crawl::{details_destination, search_destination, term_slug, term_stems, Crawl, CrawlConfig, CrawlSummary, PhaseTotals};
pub use error::{CrawlError, Result};
pub use record::{DetailRecord, Keyed, RawDetail, RawListing, SearchRecord};
pub use retry::{run_with_retry, RetryPolicy};
pub use scheduler::{run_bounded, run_bounded_settled};
pub use session::{PageExtractor, PageSession, Renderer};
pub use store::{CsvStore, MemoryStore, TabularStore};
pub use writer::{DedupWriter, WriterStats};
