// src/job.rs
// =============================================================================
// The crawl job: everything one crawl run needs to know up front.
//
// A job is immutable for the duration of a run. It usually arrives as JSON
// from whatever keeps track of APIs and their docs, e.g.
//
//   {
//     "storage_dir": "data/petstore/crawl-1",
//     "seed_urls": ["https://petstore.swagger.io/v2/swagger.json"],
//     "url_prefixes": ["https://petstore.swagger.io"],
//     "auth": {"Authorization": "Bearer ..."},
//     "max_crawl_depth": 3,
//     "max_crawl_count": 100
//   }
//
// Optional collections stay `None` when not supplied; nothing is shared
// between jobs.
// =============================================================================

use crate::error::{CrawlError, Result};
use crate::scope::absolute_url;
use reqwest::header::{HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

pub const DEFAULT_MAX_CRAWL_DEPTH: usize = 3;
pub const DEFAULT_MAX_CRAWL_COUNT: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlJob {
    /// Root of the archive this run writes into
    pub storage_dir: PathBuf,
    pub seed_urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_prefixes: Option<Vec<String>>,
    /// Extra headers sent with every JSON/YAML fetch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<BTreeMap<String, String>>,
    #[serde(default = "default_max_crawl_depth")]
    pub max_crawl_depth: usize,
    #[serde(default = "default_max_crawl_count")]
    pub max_crawl_count: usize,
}

fn default_max_crawl_depth() -> usize {
    DEFAULT_MAX_CRAWL_DEPTH
}

fn default_max_crawl_count() -> usize {
    DEFAULT_MAX_CRAWL_COUNT
}

impl CrawlJob {
    pub fn new(storage_dir: impl Into<PathBuf>, seed_urls: Vec<String>) -> Self {
        Self {
            storage_dir: storage_dir.into(),
            seed_urls,
            url_prefixes: None,
            auth: None,
            max_crawl_depth: DEFAULT_MAX_CRAWL_DEPTH,
            max_crawl_count: DEFAULT_MAX_CRAWL_COUNT,
        }
    }

    pub fn with_url_prefixes(mut self, prefixes: Vec<String>) -> Self {
        self.url_prefixes = Some(prefixes);
        self
    }

    pub fn with_auth(mut self, auth: BTreeMap<String, String>) -> Self {
        self.auth = Some(auth);
        self
    }

    pub fn with_limits(mut self, max_crawl_depth: usize, max_crawl_count: usize) -> Self {
        self.max_crawl_depth = max_crawl_depth;
        self.max_crawl_count = max_crawl_count;
        self
    }

    /// Loads a job from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(CrawlError::io(path))?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Checks the job and returns its usable seeds.
    ///
    /// Auth entries must be valid HTTP header names and values. Seeds that
    /// are not absolute URLs (scheme and host) are dropped; the rest are
    /// normalized and de-duplicated in their original order. Fails when
    /// nothing usable is left, before any I/O happens.
    pub fn validate(&self) -> Result<Vec<String>> {
        if self.storage_dir.as_os_str().is_empty() {
            return Err(CrawlError::InvalidJob("storage_dir is required".to_string()));
        }
        if self.seed_urls.is_empty() {
            return Err(CrawlError::InvalidJob("seed_urls is required".to_string()));
        }
        if self.max_crawl_count == 0 {
            return Err(CrawlError::InvalidJob(
                "max_crawl_count must be at least 1".to_string(),
            ));
        }

        if let Some(auth) = &self.auth {
            for (name, value) in auth {
                HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                    CrawlError::InvalidJob(format!("invalid auth header name '{}': {}", name, e))
                })?;
                HeaderValue::from_str(value).map_err(|e| {
                    CrawlError::InvalidJob(format!("invalid value for auth header '{}': {}", name, e))
                })?;
            }
        }

        let mut seen = HashSet::new();
        let seeds: Vec<String> = self
            .seed_urls
            .iter()
            .filter_map(|seed| {
                let parsed = absolute_url(seed);
                if parsed.is_none() {
                    tracing::warn!("Dropping invalid seed URL: '{}'", seed);
                }
                parsed
            })
            .map(|url| url.to_string())
            .filter(|url| seen.insert(url.clone()))
            .collect();

        if seeds.is_empty() {
            return Err(CrawlError::InvalidJob("no valid seed urls found".to_string()));
        }
        Ok(seeds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_defaults_from_json() {
        let job: CrawlJob = serde_json::from_str(
            r#"{"storage_dir": "data", "seed_urls": ["https://a.com/docs"]}"#,
        )
        .unwrap();
        assert_eq!(job.max_crawl_depth, 3);
        assert_eq!(job.max_crawl_count, 100);
        assert_eq!(job.url_prefixes, None);
        assert_eq!(job.auth, None);
    }

    #[test]
    fn test_validate_rejects_empty_storage_dir() {
        let job = CrawlJob::new("", vec!["https://a.com/".to_string()]);
        assert!(matches!(job.validate(), Err(CrawlError::InvalidJob(_))));
    }

    #[test]
    fn test_validate_rejects_missing_seeds() {
        let job = CrawlJob::new("data", vec![]);
        assert!(matches!(job.validate(), Err(CrawlError::InvalidJob(_))));
    }

    #[test]
    fn test_validate_rejects_when_no_seed_is_valid() {
        let job = CrawlJob::new("data", vec!["not a url".to_string(), "/relative".to_string()]);
        let err = job.validate().unwrap_err();
        assert!(err.to_string().contains("no valid seed urls"));
    }

    #[test]
    fn test_validate_rejects_zero_count() {
        let job = CrawlJob::new("data", vec!["https://a.com/".to_string()]).with_limits(3, 0);
        assert!(matches!(job.validate(), Err(CrawlError::InvalidJob(_))));
    }

    #[test]
    fn test_validate_rejects_bad_auth_headers() {
        let seeds = vec!["https://a.com/openapi.json".to_string()];

        let bad_name = CrawlJob::new("data", seeds.clone())
            .with_auth(BTreeMap::from([("Bad Header".to_string(), "x".to_string())]));
        let err = bad_name.validate().unwrap_err();
        assert!(matches!(err, CrawlError::InvalidJob(_)));
        assert!(err.to_string().contains("Bad Header"));

        let bad_value = CrawlJob::new("data", seeds.clone())
            .with_auth(BTreeMap::from([("X-Api-Key".to_string(), "line\nbreak".to_string())]));
        assert!(matches!(bad_value.validate(), Err(CrawlError::InvalidJob(_))));

        let good = CrawlJob::new("data", seeds)
            .with_auth(BTreeMap::from([("Authorization".to_string(), "Bearer t".to_string())]));
        assert!(good.validate().is_ok());
    }

    #[test]
    fn test_validate_filters_and_dedups_seeds() {
        let job = CrawlJob::new(
            "data",
            vec![
                "https://a.com/docs/v1/x".to_string(),
                "mailto:someone@a.com".to_string(),
                "https://a.com/docs/v1/x".to_string(),
                "https://a.com".to_string(),
            ],
        );
        let seeds = job.validate().unwrap();
        assert_eq!(seeds, vec!["https://a.com/docs/v1/x", "https://a.com/"]);
    }
}
