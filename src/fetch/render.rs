// src/fetch/render.rs
// =============================================================================
// Headless rendering for doc pages that only show their content after
// JavaScript runs (SwaggerHub, Redoc, Stoplight, ...).
//
// Each render gets its own browser with a throwaway profile directory:
//   launch -> open page -> navigate -> fixed wait -> grab HTML (+ screenshot)
//   -> close browser
// The browser is closed and the profile removed whatever happens in between,
// navigation failures included.
//
// The wait is a plain sleep: 5s on app.swaggerhub.com, 2s elsewhere.
//
// A failed render is retried a few times (RenderConfig::retries). This is
// separate from the HTTP fetcher's 429 handling.
// =============================================================================

use super::{FetchResult, Fetcher, RequestMeta, ResponseMeta};
use crate::config::RenderConfig;
use crate::error::{CrawlError, Result};
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::{Browser, BrowserConfig};
use futures::StreamExt;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

const BROWSER_TYPE: &str = "chromium";

fn render_error(url: &str, error: impl std::fmt::Display) -> CrawlError {
    CrawlError::Render {
        url: url.to_string(),
        message: error.to_string(),
    }
}

#[derive(Debug, Clone)]
pub struct HeadlessRenderer {
    config: RenderConfig,
}

impl HeadlessRenderer {
    pub fn new(config: RenderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Where the screenshot for `url` goes, if screenshots are enabled.
    pub fn screenshot_path_for(&self, url: &str) -> Option<PathBuf> {
        self.config
            .screenshot_dir
            .as_ref()
            .map(|dir| dir.join(format!("{}.png", crate::store::url_hash(url))))
    }

    /// Renders `url`, retrying failed attempts.
    pub async fn render(&self, url: &str, screenshot_path: Option<&Path>) -> Result<FetchResult> {
        let attempts = self.config.retries + 1;
        let mut attempt = 1;
        loop {
            match self.render_once(url, screenshot_path).await {
                Ok(result) => return Ok(result),
                Err(e) if attempt < attempts => {
                    tracing::warn!("Render attempt {}/{} failed for {}: {}", attempt, attempts, url, e);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn render_once(&self, url: &str, screenshot_path: Option<&Path>) -> Result<FetchResult> {
        tracing::debug!("browser visit {} {}", BROWSER_TYPE, url);
        let started = Instant::now();

        let profile = tempfile::tempdir().map_err(CrawlError::io(std::env::temp_dir()))?;
        let browser_config = BrowserConfig::builder()
            .user_data_dir(profile.path())
            .no_sandbox()
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .build()
            .map_err(|e| render_error(url, e))?;

        let (mut browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| render_error(url, e))?;
        let events = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let visited = self.visit(&browser, url, screenshot_path).await;

        // Released on every path, including a failed visit
        if let Err(e) = browser.close().await {
            tracing::debug!("Closing browser after {} failed: {}", url, e);
        }
        if let Err(e) = browser.wait().await {
            tracing::debug!("Waiting for browser process after {} failed: {}", url, e);
        }
        events.abort();
        drop(profile);

        let content = visited?;
        Ok(rendered(url, &self.config.user_agent, started.elapsed(), content))
    }

    async fn visit(&self, browser: &Browser, url: &str, screenshot_path: Option<&Path>) -> Result<String> {
        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| render_error(url, e))?;
        page.set_user_agent(self.config.user_agent.as_str())
            .await
            .map_err(|e| render_error(url, e))?;
        page.goto(url).await.map_err(|e| render_error(url, e))?;

        tokio::time::sleep(self.config.wait_for(url)).await;

        let content = page.content().await.map_err(|e| render_error(url, e))?;
        if let Some(path) = screenshot_path {
            let params = ScreenshotParams::builder().full_page(true).build();
            page.save_screenshot(params, path)
                .await
                .map_err(|e| render_error(url, e))?;
        }
        Ok(content)
    }
}

// Browsers don't hand back status, headers or cookies
fn rendered(url: &str, user_agent: &str, elapsed: Duration, content: String) -> FetchResult {
    FetchResult::Success {
        request: RequestMeta {
            method: "GET".to_string(),
            url: url.to_string(),
            headers: BTreeMap::from([("user-agent".to_string(), user_agent.to_string())]),
            browser_type: Some(BROWSER_TYPE.to_string()),
        },
        response: ResponseMeta {
            elapsed_seconds: elapsed.as_secs_f64(),
            num_bytes: content.len(),
            ..ResponseMeta::default()
        },
        content,
    }
}

/// How ordinary (non JSON/YAML) pages are retrieved.
#[derive(Debug, Clone)]
pub enum PageRenderer {
    /// Real browser, scripts executed
    Headless(HeadlessRenderer),
    /// Plain GET through the fetcher, for hosts without a browser
    Plain(Fetcher),
}

impl PageRenderer {
    pub async fn render(&self, url: &str) -> Result<FetchResult> {
        match self {
            PageRenderer::Headless(renderer) => {
                let screenshot = renderer.screenshot_path_for(url);
                renderer.render(url, screenshot.as_deref()).await
            }
            PageRenderer::Plain(fetcher) => fetcher.fetch(url, &fetcher.options()).await,
        }
    }
}
