//! Pipeline entry points for crawler operations.
//!
//! - `crawl`: the windowed census crawl driving search, enrichment and
//!   checkpointing
//! - `aggregate`: folding a profile plus repository activity into one entity

pub mod aggregate;
pub mod crawl;

pub use aggregate::aggregate_organization;
pub use crawl::{CrawlSummary, OrgCrawler};
