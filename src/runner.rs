use std::sync::Arc;

use anyhow::Result;
use serde_json::json;

use crate::config::RuntimeConfig;
use crate::crawl::{CrawlSummary, Crawler};
use crate::fetcher::{Fetcher, build_fetcher};
use crate::sink::{ReportSink, StdoutSink};
use crate::telemetry::TelemetrySink;

/// Runs one crawl with the configured fetch policy and records start and
/// completion telemetry around it.
pub async fn crawl_with(
    crawler: &Crawler,
    start: &str,
    max_depth: i64,
    sink: &mut dyn ReportSink,
    telemetry: &TelemetrySink,
) -> CrawlSummary {
    telemetry.emit(
        "crawl.started",
        json!({ "start": start, "max_depth": max_depth }),
    );
    let summary = crawler.traverse(start, max_depth, sink).await;
    telemetry.emit_crawl_completed(start, max_depth, &summary);
    summary
}

pub fn build_crawler(cfg: &RuntimeConfig, fetcher: Arc<dyn Fetcher>) -> Crawler {
    Crawler::new(fetcher).with_policy(cfg.fetch_policy())
}

pub async fn run_crawl(
    cfg: &RuntimeConfig,
    start: &str,
    depth: Option<i64>,
    telemetry: &TelemetrySink,
) -> Result<CrawlSummary> {
    let start = start.trim();
    if start.is_empty() {
        return Err(anyhow::anyhow!(
            "start identifier cannot be empty. Run linkwalk crawl <START>."
        ));
    }
    let max_depth = depth.unwrap_or(cfg.max_depth);

    let fetcher = build_fetcher(cfg)?;
    let crawler = build_crawler(cfg, fetcher);

    let cancel = crawler.cancellation_token();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received; abandoning in-flight fetches");
            cancel.cancel();
        }
    });

    let mut sink = StdoutSink::default();
    let summary = crawl_with(&crawler, start, max_depth, &mut sink, telemetry).await;
    interrupt.abort();

    eprintln!(
        "crawl finished: pages={} fetched={} failed={} skipped_links={}{}",
        summary.dispatched,
        summary.fetched,
        summary.failed,
        summary.discarded,
        if summary.cancelled { " (cancelled)" } else { "" }
    );
    Ok(summary)
}
