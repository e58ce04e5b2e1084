use scrape_core::{CrawlError, Result, TabularStore};
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Wraps a store and fails its first `failures` appends.
pub struct FlakyStore<S> {
    pub inner: S,
    failures_left: AtomicUsize,
}

impl<S> FlakyStore<S> {
    pub fn new(inner: S, failures: usize) -> Self {
        Self { inner, failures_left: AtomicUsize::new(failures) }
    }
}

impl<S: TabularStore> TabularStore for FlakyStore<S> {
    fn append<R: Serialize>(&self, destination: &str, records: &[R]) -> Result<()> {
        let fail = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if fail {
            return Err(CrawlError::Store { destination: destination.to_string(), message: "disk full".into() });
        }
        self.inner.append(destination, records)
    }

    fn read_urls(&self, destination: &str) -> Result<Vec<String>> {
        self.inner.read_urls(destination)
    }
}
