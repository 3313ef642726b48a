// src/fetch/mod.rs
// =============================================================================
// Everything that goes out to the network.
//
// Submodules:
// - http: the rate-limited, 429-retrying HTTP fetcher (JSON/YAML documents)
// - render: headless browser rendering for ordinary doc pages
// - rate_limit: the process-wide request quota shared by all fetchers
//
// Both paths produce a FetchResult. Only Success carries content; HttpError
// and TransportError are ordinary outcomes that the crawl records and moves
// past.
// =============================================================================

mod http;
mod rate_limit;
mod render;

pub use http::{backoff_delay, FetchOptions, Fetcher, FilePart, RequestBody, Verb};
pub use rate_limit::RateLimiter;
pub use render::{HeadlessRenderer, PageRenderer};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What was asked for. Stored in the `.info` file next to every payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestMeta {
    pub method: String,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub browser_type: Option<String>,
}

/// What came back.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseMeta {
    pub headers: BTreeMap<String, String>,
    pub cookies: BTreeMap<String, String>,
    // Browser renders don't expose a status code
    pub status_code: Option<u16>,
    pub elapsed_seconds: f64,
    pub num_bytes: usize,
    /// Every URL we were redirected to, in order
    pub redirects: Vec<String>,
    pub charset: Option<String>,
    pub content_type: Option<String>,
    pub retry_count: u32,
}

/// Why a request never produced an HTTP response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportErrorKind {
    Timeout,
    Dns,
    Connect,
    Tls,
    TooManyRedirects,
    Body,
    Request,
}

/// Outcome of one fetch or render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FetchResult {
    Success {
        request: RequestMeta,
        response: ResponseMeta,
        content: String,
    },
    HttpError {
        request: RequestMeta,
        response: ResponseMeta,
        status_code: u16,
        message: String,
    },
    TransportError {
        request: RequestMeta,
        error_kind: TransportErrorKind,
        message: String,
    },
}

impl FetchResult {
    pub fn is_success(&self) -> bool {
        matches!(self, FetchResult::Success { .. })
    }

    pub fn content(&self) -> Option<&str> {
        match self {
            FetchResult::Success { content, .. } => Some(content),
            _ => None,
        }
    }

    pub fn request(&self) -> &RequestMeta {
        match self {
            FetchResult::Success { request, .. }
            | FetchResult::HttpError { request, .. }
            | FetchResult::TransportError { request, .. } => request,
        }
    }
}
