use crate::error::Result;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs::{create_dir_all, OpenOptions};
use std::path::{Path, PathBuf};

/// Append-only tabular destinations keyed by name.
///
/// `append` writes a header row only when the destination does not exist yet.
/// Appends are synchronous so a flush never interleaves with another task.
pub trait TabularStore {
    fn append<R: Serialize>(&self, destination: &str, records: &[R]) -> Result<()>;

    /// Values of the `url` column in row order. A destination that was never
    /// written reads as empty.
    fn read_urls(&self, destination: &str) -> Result<Vec<String>>;
}

#[derive(Deserialize)]
struct UrlRow {
    url: String,
}

/// CSV files under a root directory.
pub struct CsvStore {
    pub root: PathBuf,
}

impl CsvStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        create_dir_all(root.as_ref())?;
        Ok(Self { root: root.as_ref().to_path_buf() })
    }

    pub fn path(&self, destination: &str) -> PathBuf { self.root.join(destination) }
}

impl TabularStore for CsvStore {
    fn append<R: Serialize>(&self, destination: &str, records: &[R]) -> Result<()> {
        if records.is_empty() { return Ok(()); }
        let path = self.path(destination);
        let exists = path.exists();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let mut wtr = csv::WriterBuilder::new().has_headers(!exists).from_writer(file);
        for r in records {
            wtr.serialize(r)?;
        }
        wtr.flush()?;
        Ok(())
    }

    fn read_urls(&self, destination: &str) -> Result<Vec<String>> {
        let path = self.path(destination);
        if !path.exists() { return Ok(Vec::new()); }
        let mut rdr = csv::Reader::from_path(&path)?;
        let mut urls = Vec::new();
        for row in rdr.deserialize::<UrlRow>() {
            urls.push(row?.url);
        }
        Ok(urls)
    }
}

/// In-memory store. Every `append` call is kept as one batch so callers can
/// see exactly how records were flushed.
#[derive(Default)]
pub struct MemoryStore {
    batches: Mutex<Vec<(String, Vec<serde_json::Value>)>>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    /// Sizes of each flushed batch for `destination`, in flush order.
    pub fn batch_sizes(&self, destination: &str) -> Vec<usize> {
        self.batches
            .lock()
            .iter()
            .filter(|(d, _)| d == destination)
            .map(|(_, rows)| rows.len())
            .collect()
    }

    pub fn rows(&self, destination: &str) -> Vec<serde_json::Value> {
        self.batches
            .lock()
            .iter()
            .filter(|(d, _)| d == destination)
            .flat_map(|(_, rows)| rows.iter().cloned())
            .collect()
    }

    pub fn destinations(&self) -> Vec<String> {
        let mut names: Vec<String> = self.batches.lock().iter().map(|(d, _)| d.clone()).collect();
        names.sort();
        names.dedup();
        names
    }
}

impl TabularStore for MemoryStore {
    fn append<R: Serialize>(&self, destination: &str, records: &[R]) -> Result<()> {
        if records.is_empty() { return Ok(()); }
        let rows = records.iter().map(serde_json::to_value).collect::<std::result::Result<Vec<_>, _>>()?;
        self.batches.lock().push((destination.to_string(), rows));
        Ok(())
    }

    fn read_urls(&self, destination: &str) -> Result<Vec<String>> {
        Ok(self
            .rows(destination)
            .iter()
            .filter_map(|row| row.get("url").and_then(|u| u.as_str()).map(str::to_string))
            .collect())
    }
}
