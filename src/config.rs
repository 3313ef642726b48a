// src/config.rs
// =============================================================================
// Tunables for fetching and rendering, with the defaults the archive format
// was built around:
//
// - User-Agent: doc-crawler/<version>
// - 30 second timeout, redirects followed
// - 10 requests per second across the whole process
// - Retry only on HTTP 429: backoff = factor * 2^retry_count, factor 1, 3 retries
// - Browser renders wait 5s on app.swaggerhub.com and 2s everywhere else
//
// The CLI (src/cli.rs) fills these from flags / DOC_CRAWLER_* env vars.
// =============================================================================

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_BACKOFF_FACTOR: f64 = 1.0;
pub const DEFAULT_RATE_LIMIT: u32 = 10;

// SwaggerHub renders its docs client-side and is slow to settle
pub const SLOW_RENDER_HOST: &str = "app.swaggerhub.com";

/// Settings for the HTTP fetcher.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout: Duration,
    pub follow_redirects: bool,
    pub max_retries: u32,
    pub backoff_factor: f64,
    /// Process-wide quota, applied by the shared rate limiter
    pub requests_per_second: u32,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            follow_redirects: true,
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_factor: DEFAULT_BACKOFF_FACTOR,
            requests_per_second: DEFAULT_RATE_LIMIT,
        }
    }
}

/// Settings for the headless browser renderer.
#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub user_agent: String,
    pub wait: Duration,
    pub slow_host_wait: Duration,
    pub slow_host: String,
    /// Extra attempts after the first failed render
    pub retries: u32,
    /// When set, a PNG screenshot of every rendered page lands here
    pub screenshot_dir: Option<PathBuf>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            wait: Duration::from_millis(2000),
            slow_host_wait: Duration::from_millis(5000),
            slow_host: SLOW_RENDER_HOST.to_string(),
            retries: 3,
            screenshot_dir: None,
        }
    }
}

impl RenderConfig {
    // Fixed wait heuristic, not a "network idle" detector
    pub fn wait_for(&self, url: &str) -> Duration {
        if url.contains(&self.slow_host) {
            self.slow_host_wait
        } else {
            self.wait
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_user_agent_is_product_and_version() {
        let config = FetchConfig::default();
        assert_eq!(
            config.user_agent,
            format!("doc-crawler/{}", env!("CARGO_PKG_VERSION"))
        );
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.requests_per_second, 10);
        assert!(config.follow_redirects);
    }

    #[test]
    fn test_render_wait_depends_on_host() {
        let config = RenderConfig::default();
        assert_eq!(
            config.wait_for("https://app.swaggerhub.com/apis-docs/x/y/4"),
            Duration::from_secs(5)
        );
        assert_eq!(
            config.wait_for("https://docs.example.com/api"),
            Duration::from_secs(2)
        );
    }
}
