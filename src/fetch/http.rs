// src/fetch/http.rs
// =============================================================================
// The HTTP fetcher: one request, with
// - the shared rate limiter awaited before every request sent (redirect hops
//   and retries included)
// - a per-request timeout
// - redirects followed by hand, so the redirect chain ends up in the metadata
// - retry on HTTP 429 only, backoff = backoff_factor * 2^retry_count seconds
//
// Outcomes:
//   status < 400                  -> FetchResult::Success
//   429, retries left             -> sleep, try again
//   429, retries used up          -> Err(CrawlError::RetriesExhausted)
//   any other 4xx / 5xx           -> FetchResult::HttpError (never retried)
//   timeout, DNS, refused, TLS... -> FetchResult::TransportError (never retried)
//
// The fetcher does NOT remember what it fetched. Asking twice means two
// requests; the crawl scheduler's visited set is what prevents that.
// =============================================================================

use super::{FetchResult, RateLimiter, RequestMeta, ResponseMeta, TransportErrorKind};
use crate::config::FetchConfig;
use crate::error::{CrawlError, Result};
use reqwest::header::{HeaderMap, CONTENT_TYPE, LOCATION, USER_AGENT};
use reqwest::{Client, Method, StatusCode};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};
use url::Url;

const MAX_REDIRECTS: usize = 10;

// Header values that never get written to the archive
const REDACTED_HEADERS: [&str; 4] = ["authorization", "proxy-authorization", "cookie", "x-api-key"];

/// The HTTP verbs the fetcher knows how to send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verb {
    #[default]
    Get,
    Head,
    Post,
    Patch,
    Put,
    Delete,
}

impl Verb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Get => "GET",
            Verb::Head => "HEAD",
            Verb::Post => "POST",
            Verb::Patch => "PATCH",
            Verb::Put => "PUT",
            Verb::Delete => "DELETE",
        }
    }

    fn method(&self) -> Method {
        match self {
            Verb::Get => Method::GET,
            Verb::Head => Method::HEAD,
            Verb::Post => Method::POST,
            Verb::Patch => Method::PATCH,
            Verb::Put => Method::PUT,
            Verb::Delete => Method::DELETE,
        }
    }

    // GET and HEAD never carry a body
    fn sends_body(&self) -> bool {
        !matches!(self, Verb::Get | Verb::Head)
    }
}

impl FromStr for Verb {
    type Err = CrawlError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Verb::Get),
            "HEAD" => Ok(Verb::Head),
            "POST" => Ok(Verb::Post),
            "PATCH" => Ok(Verb::Patch),
            "PUT" => Ok(Verb::Put),
            "DELETE" => Ok(Verb::Delete),
            _ => Err(CrawlError::UnsupportedVerb(s.to_string())),
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file in a multipart upload.
#[derive(Debug, Clone, PartialEq)]
pub struct FilePart {
    pub field: String,
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub mime: Option<String>,
}

/// Request payload for POST/PATCH/PUT/DELETE.
///
/// Owned so it can be rebuilt for every retry attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Raw(Vec<u8>),
    Form(BTreeMap<String, String>),
    Multipart {
        fields: BTreeMap<String, String>,
        files: Vec<FilePart>,
    },
}

/// Per-call knobs. Start from [`FetchOptions::from_config`] and override.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub verb: Verb,
    pub timeout: Duration,
    pub follow_redirects: bool,
    pub max_retries: u32,
    pub backoff_factor: f64,
    pub user_agent: String,
    pub auth: Option<BTreeMap<String, String>>,
    pub body: Option<RequestBody>,
    /// Retries already spent before this call
    pub retry_count: u32,
}

impl FetchOptions {
    pub fn from_config(config: &FetchConfig) -> Self {
        Self {
            verb: Verb::Get,
            timeout: config.timeout,
            follow_redirects: config.follow_redirects,
            max_retries: config.max_retries,
            backoff_factor: config.backoff_factor,
            user_agent: config.user_agent.clone(),
            auth: None,
            body: None,
            retry_count: 0,
        }
    }

    pub fn with_verb(mut self, verb: Verb) -> Self {
        self.verb = verb;
        self
    }

    pub fn with_auth(mut self, auth: Option<BTreeMap<String, String>>) -> Self {
        self.auth = auth;
        self
    }

    pub fn with_body(mut self, body: RequestBody) -> Self {
        self.body = Some(body);
        self
    }
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self::from_config(&FetchConfig::default())
    }
}

/// Sleep before retry number `retry_count + 1`: `factor * 2^retry_count` seconds.
pub fn backoff_delay(backoff_factor: f64, retry_count: u32) -> Duration {
    let secs = backoff_factor * 2f64.powi(retry_count as i32);
    Duration::try_from_secs_f64(secs).unwrap_or_default()
}

// One round trip, redirects included
enum Attempt {
    Done(FetchResult),
    Throttled,
}

#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    limiter: RateLimiter,
    config: FetchConfig,
}

impl Fetcher {
    pub fn new(config: FetchConfig, limiter: RateLimiter) -> Result<Self> {
        // Redirects are handled in send_once so we can record each hop
        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .pool_idle_timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            limiter,
            config,
        })
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Options pre-filled from this fetcher's config.
    pub fn options(&self) -> FetchOptions {
        FetchOptions::from_config(&self.config)
    }

    /// Fetches `url`, retrying on HTTP 429 as described at the top of this file.
    pub async fn fetch(&self, url: &str, options: &FetchOptions) -> Result<FetchResult> {
        let target = Url::parse(url).map_err(|e| CrawlError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let mut retry_count = options.retry_count;
        loop {
            tracing::debug!("request {} {} (retry {})", options.verb, url, retry_count);

            match self.send_once(&target, options, retry_count).await? {
                Attempt::Done(result) => return Ok(result),
                Attempt::Throttled if retry_count >= options.max_retries => {
                    tracing::error!("Max retries reached for URL: {}", url);
                    return Err(CrawlError::RetriesExhausted {
                        url: url.to_string(),
                        attempts: retry_count - options.retry_count + 1,
                    });
                }
                Attempt::Throttled => {
                    let delay = backoff_delay(options.backoff_factor, retry_count);
                    tracing::warn!(
                        "Request failed with status code 429. Retrying {} in {:?}...",
                        url,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    retry_count += 1;
                }
            }
        }
    }

    async fn send_once(&self, url: &Url, options: &FetchOptions, retry_count: u32) -> Result<Attempt> {
        let started = Instant::now();
        let mut current = url.clone();
        let mut verb = options.verb;
        let mut redirects = Vec::new();

        loop {
            let body = options.body.as_ref().filter(|_| verb.sends_body());
            let request = self.build_request(&current, verb, body, options)?;
            let request_meta = describe_request(&request);

            // Every hop is a request of its own
            self.limiter.acquire().await;
            let response = match self.client.execute(request).await {
                Ok(response) => response,
                Err(e) => return Ok(Attempt::Done(categorize_error(request_meta, e))),
            };
            let status = response.status();

            if options.follow_redirects && status.is_redirection() {
                if let Some(next) = redirect_target(&current, response.headers()) {
                    if redirects.len() >= MAX_REDIRECTS {
                        tracing::error!("Too many redirects for URL: {}", url);
                        return Ok(Attempt::Done(FetchResult::TransportError {
                            request: request_meta,
                            error_kind: TransportErrorKind::TooManyRedirects,
                            message: format!("more than {} redirects", MAX_REDIRECTS),
                        }));
                    }
                    // Same rules browsers use: 303 always becomes GET, 301/302
                    // turn a POST (or any other body-carrying verb) into GET
                    let downgrade = status == StatusCode::SEE_OTHER
                        || matches!(status, StatusCode::MOVED_PERMANENTLY | StatusCode::FOUND);
                    if downgrade && verb != Verb::Head {
                        verb = Verb::Get;
                    }
                    tracing::debug!("redirect {} -> {}", current, next);
                    redirects.push(next.to_string());
                    current = next;
                    continue;
                }
            }

            if status == StatusCode::TOO_MANY_REQUESTS {
                return Ok(Attempt::Throttled);
            }

            let result = analyze_response(request_meta, response, started, redirects, retry_count).await;
            return Ok(Attempt::Done(result));
        }
    }

    fn build_request(
        &self,
        url: &Url,
        verb: Verb,
        body: Option<&RequestBody>,
        options: &FetchOptions,
    ) -> Result<reqwest::Request> {
        let mut builder = self
            .client
            .request(verb.method(), url.clone())
            .timeout(options.timeout)
            .header(USER_AGENT, options.user_agent.as_str());

        if let Some(auth) = &options.auth {
            for (name, value) in auth {
                builder = builder.header(name.as_str(), value.as_str());
            }
        }

        builder = match body {
            None => builder,
            Some(RequestBody::Raw(bytes)) => builder.body(bytes.clone()),
            Some(RequestBody::Form(fields)) => builder.form(fields),
            Some(RequestBody::Multipart { fields, files }) => {
                let mut form = reqwest::multipart::Form::new();
                for (name, value) in fields {
                    form = form.text(name.clone(), value.clone());
                }
                for file in files {
                    let mut part = reqwest::multipart::Part::bytes(file.bytes.clone())
                        .file_name(file.file_name.clone());
                    if let Some(mime) = &file.mime {
                        part = part.mime_str(mime)?;
                    }
                    form = form.part(file.field.clone(), part);
                }
                builder.multipart(form)
            }
        };

        Ok(builder.build()?)
    }
}

fn redirect_target(current: &Url, headers: &HeaderMap) -> Option<Url> {
    let location = headers.get(LOCATION)?.to_str().ok()?;
    current.join(location).ok()
}

fn header_map(headers: &HeaderMap) -> BTreeMap<String, String> {
    headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect()
}

fn describe_request(request: &reqwest::Request) -> RequestMeta {
    let mut headers = header_map(request.headers());
    for (name, value) in headers.iter_mut() {
        if REDACTED_HEADERS.contains(&name.as_str()) {
            *value = "<redacted>".to_string();
        }
    }
    RequestMeta {
        method: request.method().as_str().to_string(),
        url: request.url().to_string(),
        headers,
        browser_type: None,
    }
}

// "text/html; charset=ISO-8859-1" -> "ISO-8859-1"
fn charset_from_content_type(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches('"').to_string())
    })
}

fn decode_body(bytes: &[u8], charset: Option<&str>) -> String {
    let encoding = charset
        .and_then(|label| encoding_rs::Encoding::for_label(label.as_bytes()))
        .unwrap_or(encoding_rs::UTF_8);
    let (text, _, _) = encoding.decode(bytes);
    text.into_owned()
}

// Turns a received response into Success or HttpError
async fn analyze_response(
    request: RequestMeta,
    response: reqwest::Response,
    started: Instant,
    redirects: Vec<String>,
    retry_count: u32,
) -> FetchResult {
    let status = response.status();
    let headers = header_map(response.headers());
    let cookies = response
        .cookies()
        .map(|cookie| (cookie.name().to_string(), cookie.value().to_string()))
        .collect();
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let charset = content_type.as_deref().and_then(charset_from_content_type);

    let bytes = match response.bytes().await {
        Ok(bytes) => bytes,
        Err(e) => return categorize_error(request, e),
    };

    let meta = ResponseMeta {
        headers,
        cookies,
        status_code: Some(status.as_u16()),
        elapsed_seconds: started.elapsed().as_secs_f64(),
        num_bytes: bytes.len(),
        redirects,
        charset,
        content_type,
        retry_count,
    };

    if status.is_client_error() || status.is_server_error() {
        tracing::error!(
            "Request failed with status code {} for URL: {}",
            status.as_u16(),
            request.url
        );
        let message = format!("HTTP {} for url '{}'", status, request.url);
        return FetchResult::HttpError {
            request,
            response: meta,
            status_code: status.as_u16(),
            message,
        };
    }

    let content = decode_body(&bytes, meta.charset.as_deref());
    FetchResult::Success {
        request,
        response: meta,
        content,
    }
}

// reqwest hides the interesting part (dns, certificate...) in the source chain
fn error_chain(error: &reqwest::Error) -> String {
    let mut message = error.to_string();
    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

fn categorize_error(request: RequestMeta, error: reqwest::Error) -> FetchResult {
    let message = error_chain(&error);
    let lowered = message.to_lowercase();
    let looks_like_tls = lowered.contains("certificate") || lowered.contains("tls") || lowered.contains("ssl");

    let error_kind = if error.is_timeout() {
        TransportErrorKind::Timeout
    } else if error.is_redirect() {
        TransportErrorKind::TooManyRedirects
    } else if error.is_connect() {
        if lowered.contains("dns") {
            TransportErrorKind::Dns
        } else if looks_like_tls {
            TransportErrorKind::Tls
        } else {
            TransportErrorKind::Connect
        }
    } else if error.is_body() || error.is_decode() {
        TransportErrorKind::Body
    } else if looks_like_tls {
        TransportErrorKind::Tls
    } else {
        TransportErrorKind::Request
    };

    tracing::error!("Request failed due to {:?} for URL: {}", error_kind, request.url);
    FetchResult::TransportError {
        request,
        error_kind,
        message,
    }
}
