// src/extract/html.rs
// =============================================================================
// This module extracts links from HTML pages.
//
// We use the `scraper` crate to find every <a href> and the `url` crate to
// resolve hrefs against the page URL:
//
//   page:  https://a.com/docs/
//   href:  guide#install   ->  https://a.com/docs/guide
//   href:  #top            ->  (the page itself, skipped)
//   href:  mailto:x@a.com  ->  (no host, skipped)
// =============================================================================

use super::{CrawlEdge, SourcePage};
use scraper::{Html, Selector};
use std::sync::LazyLock;
use url::Url;

static ANCHORS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("'a[href]' is a valid selector"));

/// Extracts one edge per usable anchor, in document order.
pub fn extract_html_links(html: &str, page: &SourcePage<'_>) -> Vec<CrawlEdge> {
    let mut edges = Vec::new();
    if html.is_empty() {
        return edges;
    }

    let base = match Url::parse(page.url) {
        Ok(url) => url,
        Err(e) => {
            tracing::warn!("Invalid base URL '{}': {}", page.url, e);
            return edges;
        }
    };

    let document = Html::parse_document(html);
    for element in document.select(&ANCHORS) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let href = href.split('#').next().unwrap_or_default();

        match base.join(href) {
            Ok(target) => {
                let text: String = element.text().collect();
                if let Some(edge) = page.edge_to(target, &text) {
                    edges.push(edge);
                }
            }
            Err(e) => {
                tracing::debug!("Failed to join href '{}' with base '{}': {}", href, base, e);
            }
        }
    }

    tracing::debug!("Extracted {} links from {}", edges.len(), page.url);
    edges
}
