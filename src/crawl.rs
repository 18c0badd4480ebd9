//! Concurrent, depth-bounded crawl orchestration.
//!
//! One tokio task per dispatched identifier performs a single fetch and
//! reports back over an unbounded channel. The visited set and the
//! outstanding-worker count live only on the control loop in
//! [`Crawler::traverse`], so neither needs a lock.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio_util::sync::CancellationToken;

use crate::fetcher::{Fetcher, Page};
use crate::sink::ReportSink;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub id: String,
    pub depth: i64,
}

impl WorkItem {
    pub fn new(id: impl Into<String>, depth: i64) -> Self {
        Self {
            id: id.into(),
            depth,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Fetched,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrawlEvent {
    Report { kind: ReportKind, line: String },
    Discovery(WorkItem),
    Completion,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchPolicy {
    pub timeout: Option<Duration>,
    /// Total attempts per worker, including the first one.
    pub retry_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            timeout: None,
            retry_attempts: 1,
            retry_delay: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlSummary {
    pub dispatched: usize,
    pub completed: usize,
    pub fetched: usize,
    pub failed: usize,
    pub discarded: usize,
    pub cancelled: bool,
    /// Identifiers in dispatch order, seed first.
    pub visited: Vec<String>,
}

impl CrawlSummary {
    pub fn reports(&self) -> usize {
        self.fetched + self.failed
    }
}

pub struct Crawler {
    fetcher: Arc<dyn Fetcher>,
    policy: FetchPolicy,
    cancel: CancellationToken,
}

impl Crawler {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            fetcher,
            policy: FetchPolicy::default(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_policy(mut self, policy: FetchPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Crawls from `start`, forwarding every report line to `sink` in the
    /// order workers deliver them, and resolves once every dispatched
    /// worker has signalled completion.
    ///
    /// `max_depth <= 0` dispatches the seed worker but fetches nothing.
    pub async fn traverse(
        &self,
        start: &str,
        max_depth: i64,
        sink: &mut dyn ReportSink,
    ) -> CrawlSummary {
        let (tx, mut rx) = mpsc::unbounded_channel::<CrawlEvent>();
        let mut summary = CrawlSummary::default();
        let mut visited = HashSet::<String>::new();

        tracing::info!(
            start,
            max_depth,
            backend = self.fetcher.backend_name(),
            "Crawl started"
        );

        // Seed is marked and counted before its worker exists.
        visited.insert(start.to_string());
        let mut outstanding = 1usize;
        self.dispatch(WorkItem::new(start, max_depth), &tx, &mut summary);

        while outstanding > 0 {
            let Some(event) = rx.recv().await else {
                tracing::error!(outstanding, "crawl event channel closed with workers outstanding");
                break;
            };

            match event {
                CrawlEvent::Report { kind, line } => {
                    match kind {
                        ReportKind::Fetched => summary.fetched += 1,
                        ReportKind::Failed => summary.failed += 1,
                    }
                    sink.emit(&line);
                }
                CrawlEvent::Discovery(item) => {
                    if item.depth > 0
                        && !self.cancel.is_cancelled()
                        && visited.insert(item.id.clone())
                    {
                        outstanding += 1;
                        self.dispatch(item, &tx, &mut summary);
                    } else {
                        tracing::trace!(id = %item.id, depth = item.depth, "Discovery discarded");
                        summary.discarded += 1;
                    }
                }
                CrawlEvent::Completion => {
                    outstanding -= 1;
                    summary.completed += 1;
                }
            }
        }

        summary.cancelled = self.cancel.is_cancelled();
        tracing::info!(
            start,
            dispatched = summary.dispatched,
            fetched = summary.fetched,
            failed = summary.failed,
            discarded = summary.discarded,
            cancelled = summary.cancelled,
            "Crawl finished"
        );
        summary
    }

    fn dispatch(
        &self,
        item: WorkItem,
        tx: &UnboundedSender<CrawlEvent>,
        summary: &mut CrawlSummary,
    ) {
        tracing::debug!(id = %item.id, depth = item.depth, "Dispatching worker");
        summary.dispatched += 1;
        summary.visited.push(item.id.clone());
        tokio::spawn(explore(
            item,
            self.fetcher.clone(),
            self.policy.clone(),
            self.cancel.clone(),
            tx.clone(),
        ));
    }
}

/// Sends `Completion` when dropped, so a worker signals exactly once on
/// every exit path, including early returns and a panicking fetcher.
struct CompletionGuard {
    tx: UnboundedSender<CrawlEvent>,
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        let _ = self.tx.send(CrawlEvent::Completion);
    }
}

pub async fn explore(
    item: WorkItem,
    fetcher: Arc<dyn Fetcher>,
    policy: FetchPolicy,
    cancel: CancellationToken,
    tx: UnboundedSender<CrawlEvent>,
) {
    let _completion = CompletionGuard { tx: tx.clone() };

    if item.depth <= 0 {
        return;
    }

    let outcome = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            tracing::debug!(id = %item.id, "Fetch skipped after cancellation");
            return;
        }
        outcome = fetch_with_policy(fetcher.as_ref(), &item.id, &policy) => outcome,
    };

    match outcome {
        Ok(page) => {
            let _ = tx.send(CrawlEvent::Report {
                kind: ReportKind::Fetched,
                line: found_line(&item.id, &page),
            });
            for link in page.links {
                let _ = tx.send(CrawlEvent::Discovery(WorkItem::new(link, item.depth - 1)));
            }
        }
        Err(err) => {
            tracing::debug!(id = %item.id, error = %err, "Fetch failed");
            let _ = tx.send(CrawlEvent::Report {
                kind: ReportKind::Failed,
                line: format!("{err:#}"),
            });
        }
    }
}

pub fn found_line(id: &str, page: &Page) -> String {
    format!("found: {id} {:?}", page.content)
}

pub async fn fetch_with_policy(
    fetcher: &dyn Fetcher,
    id: &str,
    policy: &FetchPolicy,
) -> Result<Page> {
    let attempts = policy.retry_attempts.max(1);
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        let result = match policy.timeout {
            Some(limit) => match tokio::time::timeout(limit, fetcher.fetch(id)).await {
                Ok(result) => result,
                Err(_) => Err(anyhow::anyhow!(
                    "fetch timed out after {}ms: {id}",
                    limit.as_millis()
                )),
            },
            None => fetcher.fetch(id).await,
        };

        match result {
            Ok(page) => return Ok(page),
            Err(err) if attempt < attempts => {
                tracing::warn!(id, attempt, attempts, error = %err, "Fetch failed, retrying");
                if !policy.retry_delay.is_zero() {
                    tokio::time::sleep(policy.retry_delay).await;
                }
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::StaticFetcher;
    use std::collections::HashMap;

    fn drain(mut rx: mpsc::UnboundedReceiver<CrawlEvent>) -> Vec<CrawlEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn exhausted_depth_emits_only_completion() {
        let (tx, rx) = mpsc::unbounded_channel();
        let fetcher: Arc<dyn Fetcher> = Arc::new(StaticFetcher::sample());
        explore(
            WorkItem::new("http://golang.org/", 0),
            fetcher,
            FetchPolicy::default(),
            CancellationToken::new(),
            tx,
        )
        .await;

        assert_eq!(drain(rx), vec![CrawlEvent::Completion]);
    }

    #[tokio::test]
    async fn worker_orders_report_discoveries_then_completion() {
        let (tx, rx) = mpsc::unbounded_channel();
        let fetcher: Arc<dyn Fetcher> = Arc::new(StaticFetcher::sample());
        explore(
            WorkItem::new("http://golang.org/", 2),
            fetcher,
            FetchPolicy::default(),
            CancellationToken::new(),
            tx,
        )
        .await;

        assert_eq!(
            drain(rx),
            vec![
                CrawlEvent::Report {
                    kind: ReportKind::Fetched,
                    line: "found: http://golang.org/ \"The Go Programming Language\"".to_string(),
                },
                CrawlEvent::Discovery(WorkItem::new("http://golang.org/pkg/", 1)),
                CrawlEvent::Discovery(WorkItem::new("http://golang.org/cmd/", 1)),
                CrawlEvent::Completion,
            ]
        );
    }

    #[tokio::test]
    async fn failed_fetch_reports_reason_then_completes() {
        let (tx, rx) = mpsc::unbounded_channel();
        let fetcher: Arc<dyn Fetcher> = Arc::new(StaticFetcher::new(HashMap::new()));
        explore(
            WorkItem::new("missing", 3),
            fetcher,
            FetchPolicy::default(),
            CancellationToken::new(),
            tx,
        )
        .await;

        assert_eq!(
            drain(rx),
            vec![
                CrawlEvent::Report {
                    kind: ReportKind::Failed,
                    line: "not found: missing".to_string(),
                },
                CrawlEvent::Completion,
            ]
        );
    }

    #[tokio::test]
    async fn cancelled_worker_skips_fetch() {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let fetcher: Arc<dyn Fetcher> = Arc::new(StaticFetcher::sample());
        explore(
            WorkItem::new("http://golang.org/", 4),
            fetcher,
            FetchPolicy::default(),
            cancel,
            tx,
        )
        .await;

        assert_eq!(drain(rx), vec![CrawlEvent::Completion]);
    }
}
