// src/store/archive.rs
// =============================================================================
// Read-only view over a finished crawl directory.
//
// Used by `doc-crawler inspect` and by anything downstream that wants the
// graph, the spec candidates or the stored pages without knowing the layout.
// =============================================================================

use super::{url_hash, ArtifactInfo, CRAWL_DIR, GRAPH_FILE, SPEC_DIR};
use crate::error::{CrawlError, Result};
use crate::extract::CrawlEdge;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// One stored `(info, data)` pair for a URL.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub content_hash: String,
    pub info_path: PathBuf,
    pub data_path: PathBuf,
    pub info: ArtifactInfo,
}

#[derive(Debug, Clone)]
pub struct CrawlArchive {
    root: PathBuf,
}

impl CrawlArchive {
    /// Opens an existing storage directory.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(CrawlError::io(&root)(std::io::Error::new(
                ErrorKind::NotFound,
                "not a crawl directory",
            )));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Loads crawl_graph.json.
    pub fn graph(&self) -> Result<Vec<CrawlEdge>> {
        let path = self.root.join(GRAPH_FILE);
        let bytes = std::fs::read(&path).map_err(CrawlError::io(&path))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Saved spec candidates, sorted by path. Empty if none were found.
    pub fn spec_candidates(&self) -> Result<Vec<PathBuf>> {
        let mut paths = list_files(&self.root.join(SPEC_DIR))?;
        paths.retain(|p| p.extension().is_some_and(|ext| ext == "json"));
        Ok(paths)
    }

    /// Every version of `url` stored in the archive, ordered by content hash.
    pub fn artifacts_for(&self, url: &str) -> Result<Vec<Artifact>> {
        let url_dir = self.root.join(CRAWL_DIR).join(url_hash(url));
        let mut artifacts = Vec::new();

        for info_path in list_files(&url_dir)? {
            if !info_path.extension().is_some_and(|ext| ext == "info") {
                continue;
            }
            let Some(content_hash) = info_path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let data_path = info_path.with_extension("data");
            if !data_path.is_file() {
                tracing::warn!("Missing data file next to {}", info_path.display());
                continue;
            }
            let bytes = std::fs::read(&info_path).map_err(CrawlError::io(&info_path))?;
            artifacts.push(Artifact {
                content_hash: content_hash.to_string(),
                info: serde_json::from_slice(&bytes)?,
                data_path,
                info_path,
            });
        }

        Ok(artifacts)
    }

    pub fn read_data(&self, path: &Path) -> Result<String> {
        std::fs::read_to_string(path).map_err(CrawlError::io(path))
    }
}

// Sorted regular files in `dir`; a missing dir is simply empty
fn list_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(CrawlError::io(dir)(e)),
    };

    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(CrawlError::io(dir))?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
