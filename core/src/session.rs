use crate::record::{RawDetail, RawListing};
use anyhow::Result;
use async_trait::async_trait;

/// One rendering session. Opened fresh for every attempt and closed when the
/// attempt ends, successful or not.
#[async_trait]
pub trait PageSession: Send {
    /// Navigate to `url` and return the rendered document.
    async fn render(&mut self, url: &str) -> Result<String>;
    async fn close(&mut self);
}

/// Source of rendering sessions; the retry runner opens one per attempt.
#[async_trait]
pub trait Renderer: Send + Sync {
    type Session: PageSession;

    async fn open(&self) -> Result<Self::Session>;
}

/// Site-specific markup knowledge: where listings live and how to read them.
pub trait PageExtractor: Send + Sync {
    fn listing_url(&self, term: &str, page: u32) -> String;
    fn extract_listing(&self, html: &str) -> Result<Vec<RawListing>>;
    fn extract_detail(&self, html: &str) -> Result<RawDetail>;
}
