// src/lib.rs
// =============================================================================
// doc-crawler: a bounded crawler for API documentation.
//
// Starting from seed URLs, it walks doc pages and JSON/YAML documents,
// archives every payload under content hashes, sets aside JSON documents
// with an `openapi`/`swagger` key, and records every link it saw in a crawl
// graph.
//
// Modules:
// - job:     the crawl job and its validation
// - scope:   per-domain prefixes deciding which links are followed
// - fetch:   rate-limited HTTP fetcher and headless page renderer
// - extract: links out of HTML pages and JSON documents
// - store:   the on-disk archive (write side and read side)
// - crawl:   the breadth-first scheduler tying it together
// =============================================================================

pub mod config;
pub mod crawl;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod job;
pub mod scope;
pub mod store;

pub use crawl::{CrawlSummary, Crawler};
pub use error::{CrawlError, Result};
pub use extract::CrawlEdge;
pub use fetch::{FetchResult, Fetcher, HeadlessRenderer, PageRenderer, RateLimiter};
pub use job::CrawlJob;
pub use scope::ScopePrefixes;
pub use store::{ContentStore, CrawlArchive};
