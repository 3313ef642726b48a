// src/cli.rs
// =============================================================================
// This file defines our command-line interface using the `clap` crate.
//
// Two subcommands:
// - crawl:   run one crawl job (from a JSON job file or from flags)
// - inspect: summarize a storage directory left behind by a crawl
//
// Every tunable also reads a DOC_CRAWLER_* environment variable, so the
// same binary can be configured from a CI job or a container without flags.
// =============================================================================

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use doc_crawler::config::{
    FetchConfig, RenderConfig, DEFAULT_BACKOFF_FACTOR, DEFAULT_MAX_RETRIES, DEFAULT_RATE_LIMIT,
    DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT,
};
use doc_crawler::CrawlJob;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(
    name = "doc-crawler",
    version,
    about = "Crawl API documentation sites and collect OpenAPI spec candidates",
    long_about = "doc-crawler walks API documentation from a set of seed URLs, stores every page \
                  it fetches in a content-addressed archive and sets aside JSON documents that \
                  look like OpenAPI/Swagger specs."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a crawl job
    ///
    /// Example: doc-crawler crawl --storage-dir out --seed https://petstore3.swagger.io/api/v3/openapi.json
    Crawl(CrawlArgs),

    /// Summarize a finished crawl directory
    ///
    /// Example: doc-crawler inspect out
    Inspect {
        /// Directory a previous crawl wrote to
        storage_dir: PathBuf,

        /// Output the summary as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
pub struct CrawlArgs {
    /// JSON job file: {storage_dir, seed_urls, url_prefixes?, auth?, max_crawl_depth?, max_crawl_count?}
    ///
    /// Flags below are merged on top of the file
    #[arg(long, env = "DOC_CRAWLER_JOB")]
    pub job: Option<PathBuf>,

    /// Where the archive is written
    #[arg(long, env = "DOC_CRAWLER_STORAGE_DIR")]
    pub storage_dir: Option<PathBuf>,

    /// Seed URL (repeatable)
    #[arg(long = "seed", value_name = "URL")]
    pub seeds: Vec<String>,

    /// Extra scope prefix (repeatable)
    #[arg(long = "prefix", value_name = "URL")]
    pub prefixes: Vec<String>,

    /// Header sent with JSON/YAML document requests, "Name: value" (repeatable)
    #[arg(long = "header", value_name = "NAME: VALUE", value_parser = parse_header)]
    pub headers: Vec<(String, String)>,

    /// Pages deeper than this many hops from a seed are not fetched [default: 3]
    #[arg(long, env = "DOC_CRAWLER_MAX_DEPTH")]
    pub max_depth: Option<usize>,

    /// Stop after this many pages [default: 100]
    #[arg(long, env = "DOC_CRAWLER_MAX_COUNT")]
    pub max_count: Option<usize>,

    /// Print the run summary as JSON
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub fetch: FetchArgs,

    #[command(flatten)]
    pub render: RenderArgs,
}

#[derive(Args, Debug)]
pub struct FetchArgs {
    #[arg(long, env = "DOC_CRAWLER_USER_AGENT", default_value = DEFAULT_USER_AGENT)]
    pub user_agent: String,

    /// Request timeout in seconds
    #[arg(long, env = "DOC_CRAWLER_TIMEOUT", default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout: u64,

    /// Don't follow HTTP redirects
    #[arg(long, env = "DOC_CRAWLER_NO_REDIRECTS")]
    pub no_redirects: bool,

    /// Retries after an HTTP 429
    #[arg(long, env = "DOC_CRAWLER_MAX_RETRIES", default_value_t = DEFAULT_MAX_RETRIES)]
    pub max_retries: u32,

    /// Seconds; the n-th retry waits factor * 2^n
    #[arg(long, env = "DOC_CRAWLER_BACKOFF_FACTOR", default_value_t = DEFAULT_BACKOFF_FACTOR)]
    pub backoff_factor: f64,

    /// Requests per second across the whole crawl
    #[arg(long, env = "DOC_CRAWLER_RATE_LIMIT", default_value_t = DEFAULT_RATE_LIMIT)]
    pub rate_limit: u32,
}

#[derive(Args, Debug)]
pub struct RenderArgs {
    /// Fetch pages with plain HTTP instead of a headless browser
    #[arg(long, env = "DOC_CRAWLER_NO_BROWSER")]
    pub no_browser: bool,

    /// Milliseconds to let a page settle before reading it [default: 2000]
    #[arg(long, env = "DOC_CRAWLER_RENDER_WAIT_MS")]
    pub render_wait_ms: Option<u64>,

    /// Extra attempts after a failed render [default: 3]
    #[arg(long, env = "DOC_CRAWLER_RENDER_RETRIES")]
    pub render_retries: Option<u32>,

    /// Save a full-page PNG of every rendered page into this directory
    #[arg(long, env = "DOC_CRAWLER_SCREENSHOTS")]
    pub screenshots: Option<PathBuf>,
}

impl CrawlArgs {
    // Builds the job from --job (if any) plus the job flags
    pub fn to_job(&self) -> Result<CrawlJob> {
        let mut job = match (&self.job, &self.storage_dir) {
            (Some(path), _) => CrawlJob::from_json_file(path)
                .with_context(|| format!("Failed to load job file {}", path.display()))?,
            (None, Some(dir)) => CrawlJob::new(dir, Vec::new()),
            (None, None) => return Err(anyhow!("either --job or --storage-dir is required")),
        };

        if let Some(dir) = &self.storage_dir {
            job.storage_dir = dir.clone();
        }
        job.seed_urls.extend(self.seeds.iter().cloned());
        if !self.prefixes.is_empty() {
            job.url_prefixes
                .get_or_insert_with(Vec::new)
                .extend(self.prefixes.iter().cloned());
        }
        if !self.headers.is_empty() {
            job.auth
                .get_or_insert_with(BTreeMap::new)
                .extend(self.headers.iter().cloned());
        }
        if let Some(depth) = self.max_depth {
            job.max_crawl_depth = depth;
        }
        if let Some(count) = self.max_count {
            job.max_crawl_count = count;
        }
        Ok(job)
    }
}

impl FetchArgs {
    pub fn to_config(&self) -> FetchConfig {
        FetchConfig {
            user_agent: self.user_agent.clone(),
            timeout: Duration::from_secs(self.timeout),
            follow_redirects: !self.no_redirects,
            max_retries: self.max_retries,
            backoff_factor: self.backoff_factor,
            requests_per_second: self.rate_limit,
        }
    }
}

impl RenderArgs {
    pub fn to_config(&self, user_agent: &str) -> RenderConfig {
        let mut config = RenderConfig {
            user_agent: user_agent.to_string(),
            screenshot_dir: self.screenshots.clone(),
            ..RenderConfig::default()
        };
        if let Some(ms) = self.render_wait_ms {
            config.wait = Duration::from_millis(ms);
        }
        if let Some(retries) = self.render_retries {
            config.retries = retries;
        }
        config
    }
}

// "Authorization: Bearer abc" -> ("Authorization", "Bearer abc")
fn parse_header(raw: &str) -> std::result::Result<(String, String), String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected 'Name: value', got '{}'", raw))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing header name in '{}'", raw));
    }
    Ok((name.to_string(), value.trim().to_string()))
}
