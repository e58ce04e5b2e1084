//! Bounded-concurrency execution of independent work items.
//!
//! Work items are futures that have not been polled yet, so building the list
//! does no work. Items run interleaved on the calling task; at most `limit`
//! are polled at any time and the rest wait their turn in submission order.

use futures::stream::{FuturesUnordered, StreamExt};
use std::future::Future;
use tracing::debug;

/// Runs every item with at most `limit` in flight and stops admitting new
/// items after the first failure. Items already in flight when a failure
/// arrives are allowed to settle so their writers close; the first failure
/// is returned.
pub async fn run_bounded<I, F, T, E>(items: I, limit: usize) -> Result<Vec<T>, E>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = Result<T, E>>,
{
    let limit = limit.max(1);
    let mut queue = items.into_iter();
    let mut inflight = FuturesUnordered::new();
    let mut done = Vec::new();
    let mut first_err: Option<E> = None;

    loop {
        while first_err.is_none() && inflight.len() < limit {
            match queue.next() {
                Some(item) => inflight.push(item),
                None => break,
            }
        }
        match inflight.next().await {
            Some(Ok(v)) => done.push(v),
            Some(Err(e)) => {
                if first_err.is_none() {
                    debug!(inflight = inflight.len(), "item failed, draining in-flight work");
                    first_err = Some(e);
                }
            }
            None => break,
        }
    }

    match first_err {
        Some(e) => Err(e),
        None => Ok(done),
    }
}

/// Runs every item with at most `limit` in flight, regardless of failures.
/// Outcomes are returned in submission order.
pub async fn run_bounded_settled<I, F, T, E>(items: I, limit: usize) -> Vec<Result<T, E>>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = Result<T, E>>,
{
    let limit = limit.max(1);
    let mut queue = items.into_iter().enumerate();
    let mut inflight = FuturesUnordered::new();
    let mut outcomes: Vec<(usize, Result<T, E>)> = Vec::new();

    loop {
        while inflight.len() < limit {
            match queue.next() {
                Some((idx, item)) => inflight.push(async move { (idx, item.await) }),
                None => break,
            }
        }
        match inflight.next().await {
            Some(outcome) => outcomes.push(outcome),
            None => break,
        }
    }

    outcomes.sort_by_key(|(idx, _)| *idx);
    outcomes.into_iter().map(|(_, r)| r).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::time::Duration;

    struct Gauge {
        current: Cell<usize>,
        peak: Cell<usize>,
        finished: Cell<usize>,
    }

    impl Gauge {
        fn new() -> Self { Self { current: Cell::new(0), peak: Cell::new(0), finished: Cell::new(0) } }

        async fn hold(&self, ms: u64) {
            self.current.set(self.current.get() + 1);
            self.peak.set(self.peak.get().max(self.current.get()));
            tokio::time::sleep(Duration::from_millis(ms)).await;
            self.current.set(self.current.get() - 1);
            self.finished.set(self.finished.get() + 1);
        }
    }

    #[tokio::test]
    async fn never_exceeds_limit() {
        let gauge = Gauge::new();
        let g = &gauge;
        let items = (0..12u64).map(move |i| async move {
            g.hold(1 + i % 4).await;
            Ok::<_, ()>(i)
        });
        let mut out = run_bounded(items, 3).await.unwrap();
        out.sort();
        assert_eq!(out, (0..12).collect::<Vec<_>>());
        assert_eq!(gauge.peak.get(), 3);
        assert_eq!(gauge.finished.get(), 12);
    }

    #[tokio::test]
    async fn zero_limit_runs_one_at_a_time() {
        let gauge = Gauge::new();
        let g = &gauge;
        let items = (0..4).map(move |_| async move {
            g.hold(1).await;
            Ok::<_, ()>(())
        });
        run_bounded(items, 0).await.unwrap();
        assert_eq!(gauge.peak.get(), 1);
    }

    #[tokio::test]
    async fn failure_stops_admission_and_drains() {
        let started = Cell::new(0usize);
        let gauge = Gauge::new();
        let (s, g) = (&started, &gauge);
        let items = (0..10).map(move |i| async move {
            s.set(s.get() + 1);
            if i == 0 {
                return Err(format!("item {i} failed"));
            }
            g.hold(5).await;
            Ok(i)
        });
        let err = run_bounded(items, 2).await.unwrap_err();
        assert_eq!(err, "item 0 failed");
        assert!(started.get() < 10);
        assert_eq!(gauge.current.get(), 0);
        assert_eq!(gauge.finished.get(), started.get() - 1);
    }

    #[tokio::test]
    async fn settled_keeps_submission_order() {
        let items = (0..5u64).map(|i| async move {
            tokio::time::sleep(Duration::from_millis(5 - i)).await;
            if i % 2 == 0 { Ok(i) } else { Err(i) }
        });
        let out = run_bounded_settled(items, 5).await;
        assert_eq!(out, vec![Ok(0), Err(1), Ok(2), Err(3), Ok(4)]);
    }
}
