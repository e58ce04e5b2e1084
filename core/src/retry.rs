use crate::error::{CrawlError, Result};
use crate::session::{PageSession, Renderer};
use std::time::Duration;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Attempts after the first one. Total attempts = `max_retries + 1`.
    pub max_retries: u32,
    /// Wait before the second attempt; doubles for each later one.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retries: 3, backoff: Duration::from_millis(1000) }
    }
}

impl RetryPolicy {
    pub fn total_attempts(&self) -> u32 { self.max_retries.saturating_add(1) }

    fn delay_after(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(1u32 << (attempt - 1).min(16))
    }
}

/// Renders `target` in a fresh session and hands the document to `process`
/// (extract, validate, persist), retrying the whole unit on any failure.
pub async fn run_with_retry<R, T, F>(renderer: &R, target: &str, policy: RetryPolicy, mut process: F) -> Result<T>
where
    R: Renderer,
    F: FnMut(&str) -> anyhow::Result<T>,
{
    let allowed = policy.total_attempts();
    let mut attempt = 0;
    loop {
        attempt += 1;
        match attempt_once(renderer, target, &mut process).await {
            Ok(value) => {
                if attempt > 1 {
                    info!(url = target, attempt, "succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if attempt < allowed => {
                let delay = policy.delay_after(attempt);
                warn!(url = target, attempt, max_attempts = allowed, delay_ms = delay.as_millis() as u64, error = %format!("{e:#}"), "attempt failed, retrying");
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
            Err(e) => {
                error!(url = target, attempts = attempt, error = %format!("{e:#}"), "retries exhausted");
                return Err(CrawlError::RetriesExhausted {
                    target: target.to_string(),
                    attempts: attempt,
                    last_error: format!("{e:#}"),
                });
            }
        }
    }
}

async fn attempt_once<R, T, F>(renderer: &R, target: &str, process: &mut F) -> anyhow::Result<T>
where
    R: Renderer,
    F: FnMut(&str) -> anyhow::Result<T>,
{
    let mut session = renderer.open().await?;
    debug!(url = target, "session opened");
    let rendered = session.render(target).await;
    session.close().await;
    debug!(url = target, "session closed");
    let html = rendered?;
    process(&html)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct Counters {
        opened: AtomicU32,
        closed: AtomicU32,
    }

    struct FlakyRenderer {
        counters: Arc<Counters>,
        fail_first: u32,
    }

    struct FlakySession {
        counters: Arc<Counters>,
        fail: bool,
    }

    #[async_trait]
    impl PageSession for FlakySession {
        async fn render(&mut self, url: &str) -> anyhow::Result<String> {
            if self.fail {
                anyhow::bail!("navigation to {url} timed out");
            }
            Ok(format!("<html>{url}</html>"))
        }

        async fn close(&mut self) {
            self.counters.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl Renderer for FlakyRenderer {
        type Session = FlakySession;

        async fn open(&self) -> anyhow::Result<FlakySession> {
            let n = self.counters.opened.fetch_add(1, Ordering::SeqCst);
            Ok(FlakySession { counters: self.counters.clone(), fail: n < self.fail_first })
        }
    }

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy { max_retries, backoff: Duration::ZERO }
    }

    #[tokio::test]
    async fn exhausts_after_max_retries_plus_one() {
        let counters = Arc::new(Counters::default());
        let r = FlakyRenderer { counters: counters.clone(), fail_first: u32::MAX };
        let err = run_with_retry(&r, "https://shop/item", policy(2), |html| Ok(html.len())).await.unwrap_err();
        match err {
            CrawlError::RetriesExhausted { target, attempts, last_error } => {
                assert_eq!(target, "https://shop/item");
                assert_eq!(attempts, 3);
                assert!(last_error.contains("timed out"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(counters.opened.load(Ordering::SeqCst), 3);
        assert_eq!(counters.closed.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn recovers_on_later_attempt() {
        let counters = Arc::new(Counters::default());
        let r = FlakyRenderer { counters: counters.clone(), fail_first: 1 };
        let html = run_with_retry(&r, "u", policy(3), |html| Ok(html.to_string())).await.unwrap();
        assert_eq!(html, "<html>u</html>");
        assert_eq!(counters.opened.load(Ordering::SeqCst), 2);
        assert_eq!(counters.closed.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn processing_failure_is_retried() {
        let counters = Arc::new(Counters::default());
        let r = FlakyRenderer { counters: counters.clone(), fail_first: 0 };
        let mut calls = 0;
        let err = run_with_retry(&r, "u", policy(0), |_| -> anyhow::Result<()> {
            calls += 1;
            anyhow::bail!("no listing container")
        })
        .await
        .unwrap_err();
        assert!(err.is_retries_exhausted());
        assert_eq!(calls, 1);
    }

    #[test]
    fn backoff_doubles() {
        let p = RetryPolicy { max_retries: 5, backoff: Duration::from_millis(100) };
        assert_eq!(p.delay_after(1), Duration::from_millis(100));
        assert_eq!(p.delay_after(3), Duration::from_millis(400));
    }
}
