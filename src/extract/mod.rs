// src/extract/mod.rs
// =============================================================================
// Link extraction: turn a fetched payload into crawl edges.
//
// Submodules:
// - html: <a href> anchors in (rendered) HTML pages
// - json: URL-looking strings anywhere inside a JSON document
//
// Every edge records where it was found (source url + content hash of that
// page) and whether the target is inside the crawl scope (`follow`). Out of
// scope targets are still recorded, just never traversed.
// =============================================================================

mod html;
mod json;

pub use html::extract_html_links;
pub use json::extract_json_links;

use crate::scope::{absolute_url, ScopePrefixes};
use serde::{Deserialize, Serialize};
use url::Url;

/// One discovered link. Serialized as-is into crawl_graph.json.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlEdge {
    pub source: String,
    pub target: String,
    /// Anchor text for HTML links, the JSON key for JSON links
    pub text: String,
    // Not computed yet; always null
    pub xpath: Option<String>,
    pub source_hash: String,
    pub follow: bool,
}

/// The page an extractor is working on.
#[derive(Debug, Clone, Copy)]
pub struct SourcePage<'a> {
    pub url: &'a str,
    pub content_hash: &'a str,
    pub scope: &'a ScopePrefixes,
}

impl<'a> SourcePage<'a> {
    pub fn new(url: &'a str, content_hash: &'a str, scope: &'a ScopePrefixes) -> Self {
        Self {
            url,
            content_hash,
            scope,
        }
    }

    // Builds an edge to `target`, or None for non-absolute targets and self-links
    fn edge_to(&self, mut target: Url, text: &str) -> Option<CrawlEdge> {
        target.set_fragment(None);
        let target = absolute_url(target.as_str())?.to_string();
        if target == self.url {
            return None;
        }
        Some(CrawlEdge {
            source: self.url.to_string(),
            follow: self.scope.is_in_scope(&target),
            target,
            text: text.to_string(),
            xpath: None,
            source_hash: self.content_hash.to_string(),
        })
    }
}
