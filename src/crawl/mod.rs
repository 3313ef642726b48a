// src/crawl/mod.rs
// =============================================================================
// This module runs a crawl job from seeds to a finished archive.
//
// Features:
// - Breadth-first walk from the seed URLs
// - Only edges inside the scope prefixes are followed
// - Depth and page-count bounds from the job
// - JSON/YAML documents go through the HTTP fetcher (with the job's auth),
//   everything else through the page renderer
// - One crawl_graph.json written at the end of the run
//
// A page that can't be fetched is logged and skipped; the run goes on.
// Only bad job input and filesystem errors end a run early.
// =============================================================================

mod queue;

pub use queue::Crawler;

use serde::Serialize;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

/// Counters for one finished run.
#[derive(Debug, Clone, Serialize)]
pub struct CrawlSummary {
    /// Distinct valid seeds the run started from
    pub seeds: usize,
    /// URLs ever queued, seeds included
    pub visited: usize,
    /// Queue entries taken off the frontier
    pub crawl_count: usize,
    /// Entries that produced a fetch result (successful or not)
    pub fetched: usize,
    /// Entries whose fetch or render gave up with an error
    pub failed: usize,
    /// Entries dropped by the depth or count bound
    pub skipped: usize,
    pub edges: usize,
    pub spec_candidates: usize,
    pub graph_path: PathBuf,
    pub started_at: SystemTime,
    pub finished_at: SystemTime,
}

impl CrawlSummary {
    pub fn duration(&self) -> Duration {
        self.finished_at
            .duration_since(self.started_at)
            .unwrap_or_default()
    }
}
