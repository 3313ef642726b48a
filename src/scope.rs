// src/scope.rs
// =============================================================================
// Scope calculation: which part of the web a crawl is allowed to walk into.
//
// For every domain (scheme + host + port) that shows up in the seeds or the
// declared prefixes, take the SHORTEST url of that domain and cut off its
// last path segment. That's the domain's prefix.
//
//   seeds: https://a.com/docs/v1/x, https://a.com/docs/v1/y
//   prefix for a.com: https://a.com/docs/v1
//
// The shortest seed is a cheap stand-in for the common ancestor of all seeds.
// Callers who know better pass explicit prefixes, which take part in the same
// shortest-wins selection.
//
// Scope only decides the `follow` flag on discovered edges. It never stops
// the fetcher from requesting a URL it was handed directly (seeds included).
// =============================================================================

use std::collections::BTreeMap;
use url::Url;

/// Parses `raw` and keeps it only if it is absolute: a scheme AND a host.
///
/// `mailto:`, `javascript:`, relative paths and `file:///` all fail this.
pub fn absolute_url(raw: &str) -> Option<Url> {
    let url = Url::parse(raw).ok()?;
    match url.host_str() {
        Some(host) if !host.is_empty() => Some(url),
        _ => None,
    }
}

// "https://a.com", "http://127.0.0.1:8080"
fn domain_of(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
        None => format!("{}://{}", url.scheme(), host),
    })
}

/// One prefix per domain, computed once per crawl run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopePrefixes {
    by_domain: BTreeMap<String, String>,
}

impl ScopePrefixes {
    /// Computes prefixes from the seeds plus any declared prefixes.
    ///
    /// Inputs that don't parse as absolute URLs are skipped. No input at all
    /// gives an empty set, which makes every edge `follow = false`.
    pub fn compute(seed_urls: &[String], declared: &[String]) -> Self {
        // domain -> shortest raw url seen so far (first one wins on ties)
        let mut shortest: BTreeMap<String, (&str, Url)> = BTreeMap::new();

        for raw in seed_urls.iter().chain(declared.iter()) {
            let Some(url) = absolute_url(raw) else {
                tracing::warn!("Ignoring scope input that is not an absolute URL: '{}'", raw);
                continue;
            };
            let Some(domain) = domain_of(&url) else {
                continue;
            };
            let shorter = shortest
                .get(&domain)
                .map_or(true, |(current, _)| raw.len() < current.len());
            if shorter {
                shortest.insert(domain, (raw.as_str(), url));
            }
        }

        let by_domain = shortest
            .into_iter()
            .map(|(domain, (_, url))| {
                let prefix = format!("{}{}", domain, truncate_last_segment(url.path()));
                tracing::debug!("Scope prefix for {}: {}", domain, prefix);
                (domain, prefix)
            })
            .collect();

        Self { by_domain }
    }

    /// True when `url` starts with any of the prefixes.
    pub fn is_in_scope(&self, url: &str) -> bool {
        self.by_domain.values().any(|prefix| url.starts_with(prefix.as_str()))
    }

    pub fn prefix_for(&self, domain: &str) -> Option<&str> {
        self.by_domain.get(domain).map(String::as_str)
    }

    pub fn prefixes(&self) -> impl Iterator<Item = &str> {
        self.by_domain.values().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_domain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_domain.is_empty()
    }
}

// "/docs/v1/x" -> "/docs/v1", "/docs/" -> "/docs", "/" -> ""
fn truncate_last_segment(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[..idx],
        None => "",
    }
}
