use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use scrape_core::{PageSession, Renderer};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// Rendering proxy: `GET https://<host>/v1/?api_key=..&url=..&country=..&wait=..`
#[derive(Debug, Clone)]
pub struct ProxyEndpoint {
    pub host: String,
    pub api_key: String,
    pub country: String,
    pub wait_ms: u64,
}

impl ProxyEndpoint {
    pub fn request_url(&self, target: &str) -> Result<Url> {
        let base = format!("https://{}/v1/", self.host.trim_end_matches('/'));
        let wait = self.wait_ms.to_string();
        let url = Url::parse_with_params(
            &base,
            [
                ("api_key", self.api_key.as_str()),
                ("url", target),
                ("country", self.country.as_str()),
                ("wait", wait.as_str()),
            ],
        )?;
        Ok(url)
    }
}

pub struct ProxyRenderer {
    client: Client,
    endpoint: Arc<ProxyEndpoint>,
    next_id: AtomicU64,
}

impl ProxyRenderer {
    pub fn new(client: Client, endpoint: ProxyEndpoint) -> Self {
        Self { client, endpoint: Arc::new(endpoint), next_id: AtomicU64::new(1) }
    }
}

pub struct ProxySession {
    id: u64,
    client: Client,
    endpoint: Arc<ProxyEndpoint>,
}

#[async_trait]
impl Renderer for ProxyRenderer {
    type Session = ProxySession;

    async fn open(&self) -> Result<ProxySession> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!(session = id, "opening proxy session");
        Ok(ProxySession { id, client: self.client.clone(), endpoint: self.endpoint.clone() })
    }
}

#[async_trait]
impl PageSession for ProxySession {
    async fn render(&mut self, url: &str) -> Result<String> {
        let request = self.endpoint.request_url(url)?;
        let resp = self.client.get(request).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(200).collect();
            return Err(anyhow!("proxy returned {status} for {url}: {snippet}"));
        }
        let body = resp.text().await?;
        if body.trim().is_empty() {
            return Err(anyhow!("proxy returned an empty document for {url}"));
        }
        debug!(session = self.id, url, bytes = body.len(), "page rendered");
        Ok(body)
    }

    async fn close(&mut self) {
        debug!(session = self.id, "proxy session released");
    }
}
