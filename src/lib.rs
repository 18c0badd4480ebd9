pub mod cli;
pub mod config;
pub mod crawl;
pub mod doctor;
pub mod error;
pub mod fetcher;
pub mod profiles;
pub mod runner;
pub mod sink;
pub mod telemetry;

pub use crawl::{CrawlEvent, CrawlSummary, Crawler, FetchPolicy, WorkItem};
pub use fetcher::{Fetcher, Page, StaticFetcher};
pub use sink::{ReportSink, StdoutSink};
