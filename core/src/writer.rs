use crate::error::Result;
use crate::record::Keyed;
use crate::store::TabularStore;
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterStats {
    pub written: usize,
    pub duplicates: usize,
}

/// Buffers records for one destination, dropping any whose natural key was
/// already seen by this writer, and flushes every `batch_size` records.
///
/// Owned by a single task. `close` must be called once when the task ends,
/// whether it succeeded or not.
pub struct DedupWriter<'s, R, S> {
    store: &'s S,
    destination: String,
    batch_size: usize,
    seen: HashSet<String>,
    pending: Vec<R>,
    stats: WriterStats,
}

impl<'s, R, S> DedupWriter<'s, R, S>
where
    R: Keyed + Serialize,
    S: TabularStore,
{
    pub fn new(store: &'s S, destination: impl Into<String>, batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            store,
            destination: destination.into(),
            batch_size,
            seen: HashSet::new(),
            pending: Vec::with_capacity(batch_size),
            stats: WriterStats::default(),
        }
    }

    pub fn destination(&self) -> &str { &self.destination }

    pub fn pending(&self) -> usize { self.pending.len() }

    pub fn stats(&self) -> WriterStats { self.stats }

    /// Returns false when the record was a duplicate and got dropped.
    pub fn add(&mut self, record: R) -> Result<bool> {
        if !self.seen.insert(record.natural_key().to_string()) {
            warn!(destination = %self.destination, key = record.natural_key(), "duplicate record discarded");
            self.stats.duplicates += 1;
            return Ok(false);
        }
        self.pending.push(record);
        if self.pending.len() >= self.batch_size {
            self.flush()?;
        }
        Ok(true)
    }

    pub fn flush(&mut self) -> Result<()> {
        if self.pending.is_empty() { return Ok(()); }
        let batch = std::mem::take(&mut self.pending);
        if let Err(e) = self.store.append(&self.destination, &batch) {
            // keys are already in `seen`; keep the rows for the next flush
            self.pending = batch;
            return Err(e);
        }
        self.stats.written += batch.len();
        debug!(destination = %self.destination, rows = batch.len(), "flushed batch");
        Ok(())
    }

    pub fn close(mut self) -> Result<WriterStats> {
        self.flush()?;
        Ok(self.stats)
    }
}
