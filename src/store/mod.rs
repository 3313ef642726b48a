// src/store/mod.rs
// =============================================================================
// The content-addressed crawl archive.
//
// Layout under storage_dir:
//
//   crawl/<url_hash>/<content_hash>.info    request/response metadata (JSON)
//   crawl/<url_hash>/<content_hash>.data    the payload as fetched/rendered
//   openapi_spec/<content_hash>.json        JSON payloads that look like specs
//   crawl_graph.json                        every edge found during the run
//
// Both hashes are lowercase hex MD5 (of the URL string, of the content).
// The same content for the same URL always lands on the same pair of files,
// so re-crawls only add files and never rewrite them.
//
// ContentStore also decides which link extractor a payload goes to: URLs whose
// path ends in `.json` are parsed as JSON, everything else is treated as HTML.
// =============================================================================

mod archive;

pub use archive::{Artifact, CrawlArchive};

use crate::error::{CrawlError, Result};
use crate::extract::{extract_html_links, extract_json_links, CrawlEdge, SourcePage};
use crate::fetch::{FetchResult, RequestMeta, ResponseMeta};
use crate::scope::ScopePrefixes;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use url::Url;

pub const CRAWL_DIR: &str = "crawl";
pub const SPEC_DIR: &str = "openapi_spec";
pub const GRAPH_FILE: &str = "crawl_graph.json";

pub fn url_hash(url: &str) -> String {
    format!("{:x}", md5::compute(url.as_bytes()))
}

pub fn content_hash(content: &str) -> String {
    format!("{:x}", md5::compute(content.as_bytes()))
}

/// Contents of a `.info` file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactInfo {
    pub response: ResponseMeta,
    pub request: RequestMeta,
}

/// What processing one payload produced.
#[derive(Debug, Default)]
pub struct Processed {
    pub edges: Vec<CrawlEdge>,
    /// Set when the payload was saved under openapi_spec/
    pub spec_candidate: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ContentStore {
    root: PathBuf,
}

impl ContentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn graph_path(&self) -> PathBuf {
        self.root.join(GRAPH_FILE)
    }

    /// Archives a successful fetch and extracts its links.
    ///
    /// Anything other than `Success` is ignored and yields no edges.
    /// Filesystem errors are returned; content that fails to parse is not an error.
    pub async fn process(&self, result: &FetchResult, url: &str, scope: &ScopePrefixes) -> Result<Processed> {
        let FetchResult::Success {
            request,
            response,
            content,
        } = result
        else {
            return Ok(Processed::default());
        };

        let content_hash = content_hash(content);
        let url_dir = self.root.join(CRAWL_DIR).join(url_hash(url));
        tokio::fs::create_dir_all(&url_dir)
            .await
            .map_err(CrawlError::io(&url_dir))?;

        let info = ArtifactInfo {
            response: response.clone(),
            request: request.clone(),
        };
        write_once(&url_dir.join(format!("{content_hash}.info")), &serde_json::to_vec(&info)?).await?;
        write_once(&url_dir.join(format!("{content_hash}.data")), content.as_bytes()).await?;

        let page = SourcePage::new(url, &content_hash, scope);
        if !path_ends_with(url, ".json") {
            return Ok(Processed {
                edges: extract_html_links(content, &page),
                spec_candidate: None,
            });
        }

        let document: serde_json::Value = match serde_json::from_str(content) {
            Ok(document) => document,
            Err(e) => {
                tracing::debug!("Not valid JSON at {}: {}", url, e);
                return Ok(Processed::default());
            }
        };

        let mut processed = Processed::default();
        if looks_like_spec(&document) {
            let spec_dir = self.root.join(SPEC_DIR);
            tokio::fs::create_dir_all(&spec_dir)
                .await
                .map_err(CrawlError::io(&spec_dir))?;
            let spec_path = spec_dir.join(format!("{content_hash}.json"));
            write_once(&spec_path, content.as_bytes()).await?;
            tracing::info!("Saved OpenAPI spec candidate: {}", url);
            processed.spec_candidate = Some(spec_path);
        }
        processed.edges = extract_json_links(&document, &page);
        Ok(processed)
    }

    /// Writes the crawl graph as pretty-printed JSON, replacing any previous one.
    pub async fn write_graph(&self, edges: &[CrawlEdge]) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(CrawlError::io(&self.root))?;
        let path = self.graph_path();
        tokio::fs::write(&path, serde_json::to_vec_pretty(edges)?)
            .await
            .map_err(CrawlError::io(&path))?;
        Ok(path)
    }
}

/// True when the URL's path (query and fragment ignored) ends with `suffix`.
pub fn path_ends_with(url: &str, suffix: &str) -> bool {
    match Url::parse(url) {
        Ok(parsed) => parsed.path().ends_with(suffix),
        Err(_) => url.ends_with(suffix),
    }
}

fn looks_like_spec(document: &serde_json::Value) -> bool {
    document
        .as_object()
        .is_some_and(|map| map.contains_key("openapi") || map.contains_key("swagger"))
}

// Existing files are left untouched
async fn write_once(path: &Path, bytes: &[u8]) -> Result<()> {
    if tokio::fs::try_exists(path).await.map_err(CrawlError::io(path))? {
        return Ok(());
    }
    let target = path.to_path_buf();
    let bytes = bytes.to_vec();
    tokio::task::spawn_blocking(move || write_atomically(&target, &bytes))
        .await
        .map_err(|e| CrawlError::io(path)(std::io::Error::other(e)))?
}

// Written next to the target and renamed into place, so a file under its
// final name is always complete
fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut staged = tempfile::NamedTempFile::new_in(dir).map_err(CrawlError::io(dir))?;
    staged.write_all(bytes).map_err(CrawlError::io(path))?;
    staged.persist(path).map_err(|e| CrawlError::io(path)(e.error))?;
    Ok(())
}
