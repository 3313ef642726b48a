// src/extract/json.rs
// =============================================================================
// Link heuristics for JSON documents (OpenAPI specs, API index files).
//
// Walks the whole document. Every string value that sits directly under an
// object key is scanned with two patterns:
//   1. full http(s) URLs          "see https://a.com/docs/guide#intro"
//   2. absolute-looking paths     "GET /v1/pets returns a list"
// Paths are resolved against the document's own URL. The key the string was
// found under becomes the edge text.
//
// A path match is dropped when it is really a piece of something else:
//   - part of one of the full URLs found in the same string
//   - preceded by '/' in the string   ("//cdn.example.com/x")
//   - preceded by '#' in the string   ("#/components/schemas/Pet")
//
// Strings sitting directly inside arrays are not scanned; objects inside
// arrays are.
// =============================================================================

use super::{CrawlEdge, SourcePage};
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;
use url::Url;

static FULL_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"https?://(?:[a-zA-Z0-9-]+\.)+[a-zA-Z]{2,}(?::\d+)?(?:/[^/\s()]*)*(?:\?[^\s]*)?(?:#[^\s]*)?",
    )
    .expect("full url pattern compiles")
});

static PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/[^/\s()\[\]]+(?:/[^/\s()\[\]]+)*").expect("path pattern compiles")
});

/// Extracts edges from an already parsed JSON document.
pub fn extract_json_links(document: &Value, page: &SourcePage<'_>) -> Vec<CrawlEdge> {
    let base = Url::parse(page.url).ok();
    let mut walker = Walker {
        page,
        base: base.as_ref(),
        edges: Vec::new(),
    };
    walker.walk(document);
    tracing::debug!("Extracted {} links from JSON at {}", walker.edges.len(), page.url);
    walker.edges
}

struct Walker<'p, 'a> {
    page: &'p SourcePage<'a>,
    base: Option<&'p Url>,
    edges: Vec<CrawlEdge>,
}

impl Walker<'_, '_> {
    fn walk(&mut self, value: &Value) {
        match value {
            Value::Object(map) => self.walk_object(map),
            Value::Array(items) => items.iter().for_each(|item| self.walk(item)),
            _ => {}
        }
    }

    fn walk_object(&mut self, map: &Map<String, Value>) {
        for (key, value) in map {
            match value {
                Value::String(s) => self.scan(key, s),
                other => self.walk(other),
            }
        }
    }

    fn scan(&mut self, key: &str, s: &str) {
        let mut full_urls: Vec<&str> = Vec::new();

        for found in FULL_URL.find_iter(s) {
            let found = found.as_str().split('#').next().unwrap_or_default();
            if !full_urls.contains(&found) {
                full_urls.push(found);
            }
            if let Ok(target) = Url::parse(found) {
                self.push(target, key);
            }
        }

        let Some(base) = self.base else {
            return;
        };
        for found in PATH.find_iter(s) {
            let path = found.as_str();
            if full_urls.iter().any(|u| u.contains(path))
                || s.contains(&format!("/{path}"))
                || s.contains(&format!("#{path}"))
            {
                continue;
            }
            if let Ok(target) = base.join(path) {
                self.push(target, key);
            }
        }
    }

    fn push(&mut self, target: Url, key: &str) {
        if let Some(edge) = self.page.edge_to(target, key) {
            self.edges.push(edge);
        }
    }
}
