use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use crate::cli::FetchBackend;
use crate::config::RuntimeConfig;

/// Content summary of one identifier and the identifiers it links to, in
/// the order the backend found them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Page {
    pub content: String,
    #[serde(default)]
    pub links: Vec<String>,
}

impl Page {
    pub fn new(content: impl Into<String>, links: &[&str]) -> Self {
        Self {
            content: content.into(),
            links: links.iter().map(|link| link.to_string()).collect(),
        }
    }
}

/// Retrieval capability used by crawl workers.
///
/// Implementations must answer (or fail) in finite time and must not touch
/// traversal state; a failure is reported by the worker and never retried
/// by the orchestrator.
#[async_trait]
pub trait Fetcher: Send + Sync {
    fn backend_name(&self) -> &'static str;
    async fn fetch(&self, id: &str) -> Result<Page>;
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TableFile {
    #[serde(default)]
    pub pages: HashMap<String, Page>,
}

pub fn load_table(path: &Path) -> Result<HashMap<String, Page>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read fetch table at '{}'", path.display()))?;
    let table = toml::from_str::<TableFile>(&content).with_context(|| {
        format!(
            "invalid fetch table in '{}'. Expected [pages.\"<id>\"] entries with content/links.",
            path.display()
        )
    })?;
    Ok(table.pages)
}

/// In-memory lookup table standing in for a real fetch-and-parse step.
pub struct StaticFetcher {
    pages: HashMap<String, Page>,
    latency: Duration,
}

impl StaticFetcher {
    pub fn new(pages: HashMap<String, Page>) -> Self {
        Self {
            pages,
            latency: Duration::ZERO,
        }
    }

    pub fn sample() -> Self {
        Self::new(sample_pages())
    }

    pub fn load(path: &str) -> Result<Self> {
        Ok(Self::new(load_table(Path::new(path))?))
    }

    /// Simulated per-fetch delay, applied to hits and misses alike.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

#[async_trait]
impl Fetcher for StaticFetcher {
    fn backend_name(&self) -> &'static str {
        "static"
    }

    async fn fetch(&self, id: &str) -> Result<Page> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.pages
            .get(id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("not found: {id}"))
    }
}

pub const SAMPLE_START: &str = "http://golang.org/";

/// Small golang.org link graph. `http://golang.org/cmd/` is linked but
/// deliberately absent so every sample crawl exercises the failure path.
pub fn sample_pages() -> HashMap<String, Page> {
    let mut pages = HashMap::new();
    pages.insert(
        "http://golang.org/".to_string(),
        Page::new(
            "The Go Programming Language",
            &["http://golang.org/pkg/", "http://golang.org/cmd/"],
        ),
    );
    pages.insert(
        "http://golang.org/pkg/".to_string(),
        Page::new(
            "Packages",
            &[
                "http://golang.org/",
                "http://golang.org/cmd/",
                "http://golang.org/pkg/fmt/",
                "http://golang.org/pkg/os/",
            ],
        ),
    );
    pages.insert(
        "http://golang.org/pkg/fmt/".to_string(),
        Page::new(
            "Package fmt",
            &["http://golang.org/", "http://golang.org/pkg/"],
        ),
    );
    pages.insert(
        "http://golang.org/pkg/os/".to_string(),
        Page::new(
            "Package os",
            &["http://golang.org/", "http://golang.org/pkg/"],
        ),
    );
    pages
}

#[cfg(feature = "web-fetch")]
pub struct HttpFetcher {
    client: reqwest::Client,
}

#[cfg(feature = "web-fetch")]
impl HttpFetcher {
    pub fn new(timeout: Option<Duration>) -> Result<Self> {
        let builder = reqwest::Client::builder()
            .user_agent(concat!("linkwalk/", env!("CARGO_PKG_VERSION")));
        let builder = if let Some(timeout) = timeout {
            builder.timeout(timeout)
        } else {
            builder
        };
        Ok(Self {
            client: builder.build().context("failed to build http client")?,
        })
    }
}

#[cfg(feature = "web-fetch")]
#[async_trait]
impl Fetcher for HttpFetcher {
    fn backend_name(&self) -> &'static str {
        "http"
    }

    async fn fetch(&self, id: &str) -> Result<Page> {
        let base = url::Url::parse(id).with_context(|| format!("invalid url: {id}"))?;
        let response = self
            .client
            .get(base.clone())
            .send()
            .await
            .with_context(|| format!("request failed: {id}"))?;
        let status = response.status();
        if !status.is_success() {
            return Err(anyhow::anyhow!("http {status}: {id}"));
        }
        let body = response
            .text()
            .await
            .with_context(|| format!("failed to read body: {id}"))?;

        Ok(Page {
            content: html_summary(&body),
            links: extract_links(&base, &body),
        })
    }
}

#[cfg(feature = "web-fetch")]
const SUMMARY_MAX_CHARS: usize = 120;

#[cfg(feature = "web-fetch")]
fn html_summary(body: &str) -> String {
    let lower = body.to_ascii_lowercase();
    if let Some(open) = lower.find("<title")
        && let Some(start) = lower[open..].find('>').map(|offset| open + offset + 1)
        && let Some(end) = lower[start..].find("</title>").map(|offset| start + offset)
    {
        let title = body[start..end].split_whitespace().collect::<Vec<_>>().join(" ");
        if !title.is_empty() {
            return truncate_chars(&title, SUMMARY_MAX_CHARS);
        }
    }

    let markdown = htmd::convert(body).unwrap_or_default();
    markdown
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(|line| truncate_chars(line, SUMMARY_MAX_CHARS))
        .unwrap_or_default()
}

#[cfg(feature = "web-fetch")]
fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// Collects `href` targets resolved against `base`, http(s) only, without
/// fragments, first occurrence wins.
#[cfg(feature = "web-fetch")]
pub fn extract_links(base: &url::Url, body: &str) -> Vec<String> {
    let lower = body.to_ascii_lowercase();
    let mut seen = std::collections::HashSet::new();
    let mut links = Vec::new();
    let mut cursor = 0usize;

    while let Some(offset) = lower[cursor..].find("href") {
        cursor += offset + "href".len();
        let after_name = &body[cursor..];
        let Some(after_eq) = after_name.trim_start().strip_prefix('=') else {
            continue;
        };
        let rest = after_eq.trim_start();
        cursor = body.len() - rest.len();
        let (raw, consumed) = match rest.chars().next() {
            Some(quote @ ('"' | '\'')) => {
                let inner = &rest[1..];
                match inner.find(quote) {
                    Some(end) => (&inner[..end], end + 2),
                    None => break,
                }
            }
            Some(_) => {
                let end = rest
                    .find(|ch: char| ch.is_whitespace() || ch == '>')
                    .unwrap_or(rest.len());
                (&rest[..end], end)
            }
            None => break,
        };
        cursor += consumed;

        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }
        let Ok(mut resolved) = base.join(raw) else {
            continue;
        };
        if !matches!(resolved.scheme(), "http" | "https") {
            continue;
        }
        resolved.set_fragment(None);
        let link = resolved.to_string();
        if seen.insert(link.clone()) {
            links.push(link);
        }
    }

    links
}

pub fn build_fetcher(cfg: &RuntimeConfig) -> Result<Arc<dyn Fetcher>> {
    match cfg.fetch_backend {
        FetchBackend::Sample => Ok(Arc::new(StaticFetcher::sample().with_latency(cfg.latency()))),
        FetchBackend::Table => {
            let path = cfg.table_path.as_deref().ok_or_else(|| {
                anyhow::anyhow!(
                    "fetch backend 'table' requires --table-path or profile table_path"
                )
            })?;
            let fetcher = StaticFetcher::load(path)?.with_latency(cfg.latency());
            tracing::debug!(path, pages = fetcher.len(), "Loaded fetch table");
            Ok(Arc::new(fetcher))
        }
        #[cfg(feature = "web-fetch")]
        FetchBackend::Http => Ok(Arc::new(HttpFetcher::new(cfg.fetch_timeout())?)),
        #[cfg(not(feature = "web-fetch"))]
        FetchBackend::Http => Err(anyhow::anyhow!(
            "fetch backend 'http' requires building with --features web-fetch"
        )),
    }
}
