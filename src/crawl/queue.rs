// src/crawl/queue.rs
// =============================================================================
// The breadth-first crawl loop.
//
// How it works:
// 1. Validate the job (before touching disk or network)
// 2. Compute the scope prefixes, queue every seed at depth 0
// 3. Take the next entry; drop it if it is too deep or the page budget is spent
// 4. Fetch it (.json/.yaml) or render it (everything else)
// 5. Archive the payload and collect its edges
// 6. Queue every followable target we haven't queued before, one level deeper
// 7. When the queue is empty, write crawl_graph.json
//
// A URL is marked visited when it is QUEUED, not when it is fetched, so the
// same page can never sit in the queue twice.
// =============================================================================

use super::CrawlSummary;
use crate::error::{CrawlError, Result};
use crate::extract::CrawlEdge;
use crate::fetch::{FetchResult, Fetcher, PageRenderer};
use crate::job::CrawlJob;
use crate::scope::ScopePrefixes;
use crate::store::{path_ends_with, ContentStore};
use std::collections::{HashSet, VecDeque};
use std::time::SystemTime;

// Represents a page in the crawl queue
#[derive(Debug, Clone)]
struct CrawlItem {
    url: String,
    depth: usize, // link hops from the nearest seed
}

/// Runs crawl jobs with one fetcher and one page renderer.
#[derive(Debug, Clone)]
pub struct Crawler {
    fetcher: Fetcher,
    renderer: PageRenderer,
}

impl Crawler {
    pub fn new(fetcher: Fetcher, renderer: PageRenderer) -> Self {
        Self { fetcher, renderer }
    }

    // Runs one job to completion
    //
    // Parameters:
    //   job: seeds, scope, auth and bounds for this run
    //
    // Returns: counters for the run; the archive itself is on disk under
    // job.storage_dir
    pub async fn run(&self, job: &CrawlJob) -> Result<CrawlSummary> {
        let seeds = job.validate()?;
        let started_at = SystemTime::now();

        tokio::fs::create_dir_all(&job.storage_dir)
            .await
            .map_err(CrawlError::io(&job.storage_dir))?;
        let store = ContentStore::new(&job.storage_dir);

        let declared = job.url_prefixes.clone().unwrap_or_default();
        let scope = ScopePrefixes::compute(&seeds, &declared);
        tracing::info!(
            "Crawling {} seed(s) into {} (depth < {}, at most {} pages, {} scope prefix(es))",
            seeds.len(),
            job.storage_dir.display(),
            job.max_crawl_depth,
            job.max_crawl_count,
            scope.len()
        );

        let document_options = self.fetcher.options().with_auth(job.auth.clone());

        let mut queue = VecDeque::new();
        let mut visited = HashSet::new();
        for seed in &seeds {
            if visited.insert(seed.clone()) {
                tracing::debug!("queued (depth=0): '{}'", seed);
                queue.push_back(CrawlItem {
                    url: seed.clone(),
                    depth: 0,
                });
            }
        }

        let mut graph: Vec<CrawlEdge> = Vec::new();
        let mut crawl_count = 0;
        let mut fetched = 0;
        let mut failed = 0;
        let mut skipped = 0;
        let mut spec_candidates = 0;

        while let Some(item) = queue.pop_front() {
            crawl_count += 1;
            if item.depth >= job.max_crawl_depth || crawl_count > job.max_crawl_count {
                skipped += 1;
                continue;
            }

            tracing::info!("Crawling [depth {}]: {}", item.depth, item.url);
            let result = if is_document(&item.url) {
                self.fetcher.fetch(&item.url, &document_options).await
            } else {
                self.renderer.render(&item.url).await
            };

            let result = match result {
                Ok(result) => result,
                Err(e) => {
                    tracing::warn!("Giving up on {}: {}", item.url, e);
                    failed += 1;
                    continue;
                }
            };
            fetched += 1;
            log_outcome(&item.url, &result);

            let processed = store.process(&result, &item.url, &scope).await?;
            if processed.spec_candidate.is_some() {
                spec_candidates += 1;
            }
            tracing::info!("Found {} links in {}", processed.edges.len(), item.url);

            for edge in &processed.edges {
                if edge.follow && visited.insert(edge.target.clone()) {
                    tracing::debug!("queued (depth={}): '{}'", item.depth + 1, edge.target);
                    queue.push_back(CrawlItem {
                        url: edge.target.clone(),
                        depth: item.depth + 1,
                    });
                }
            }
            graph.extend(processed.edges);
        }

        let graph_path = store.write_graph(&graph).await?;
        tracing::info!("Saved crawl to {}", job.storage_dir.display());
        tracing::info!("Visited {} URLs", visited.len());

        Ok(CrawlSummary {
            seeds: seeds.len(),
            visited: visited.len(),
            crawl_count,
            fetched,
            failed,
            skipped,
            edges: graph.len(),
            spec_candidates,
            graph_path,
            started_at,
            finished_at: SystemTime::now(),
        })
    }
}

// Machine-readable documents skip the browser
fn is_document(url: &str) -> bool {
    path_ends_with(url, ".json") || path_ends_with(url, ".yaml")
}

fn log_outcome(url: &str, result: &FetchResult) {
    match result {
        FetchResult::Success { .. } => {}
        FetchResult::HttpError { message, .. } => tracing::error!("{}", message),
        FetchResult::TransportError {
            error_kind, message, ..
        } => tracing::error!("Request to {} failed ({:?}): {}", url, error_kind, message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FetchConfig;
    use crate::fetch::RateLimiter;
    use crate::store::{CrawlArchive, CRAWL_DIR};
    use httpmock::{Method::GET, MockServer};
    use rstest::rstest;
    use std::collections::BTreeMap;

    fn crawler() -> Crawler {
        let config = FetchConfig {
            max_retries: 1,
            backoff_factor: 0.0,
            ..FetchConfig::default()
        };
        let fetcher = Fetcher::new(config, RateLimiter::per_second(1000)).unwrap();
        Crawler::new(fetcher.clone(), PageRenderer::Plain(fetcher))
    }

    fn data_files(root: &std::path::Path) -> usize {
        let crawl_dir = root.join(CRAWL_DIR);
        std::fs::read_dir(crawl_dir)
            .map(|dirs| {
                dirs.flatten()
                    .flat_map(|d| std::fs::read_dir(d.path()).into_iter().flatten().flatten())
                    .filter(|f| f.path().extension().is_some_and(|e| e == "data"))
                    .count()
            })
            .unwrap_or(0)
    }

    #[rstest]
    #[case("https://a.com/openapi.json", true)]
    #[case("https://a.com/openapi.yaml?raw=1", true)]
    #[case("https://a.com/docs/index.html", false)]
    #[case("https://a.com/docs", false)]
    fn test_is_document(#[case] url: &str, #[case] expected: bool) {
        assert_eq!(is_document(url), expected);
    }

    #[tokio::test]
    async fn test_openapi_seed_saves_spec_and_empty_graph() {
        let server = MockServer::start_async().await;
        let spec = server
            .mock_async(|when, then| {
                when.method(GET).path("/openapi.json");
                then.status(200)
                    .header("content-type", "application/json")
                    .body(r#"{"openapi":"3.1.0","paths":{}}"#);
            })
            .await;

        let dir = tempfile::tempdir().unwrap();
        let job = CrawlJob::new(dir.path(), vec![server.url("/openapi.json")]);
        let summary = crawler().run(&job).await.unwrap();

        spec.assert_async().await;
        assert_eq!(summary.spec_candidates, 1);
        assert_eq!(summary.edges, 0);
        assert_eq!(summary.fetched, 1);

        let archive = CrawlArchive::open(dir.path()).unwrap();
        assert_eq!(archive.spec_candidates().unwrap().len(), 1);
        assert!(archive.graph().unwrap().is_empty());
        assert_eq!(summary.graph_path, dir.path().join("crawl_graph.json"));
    }

    #[tokio::test]
    async fn test_follows_in_scope_links_up_to_depth() {
        let server = MockServer::start_async().await;
        let index = server
            .mock_async(|when, then| {
                when.method(GET).path("/docs/index.html");
                then.status(200).body(
                    r#"<a href="guide.html">Guide</a>
                       <a href="/other/page">Elsewhere</a>
                       <a href="https://b.com/">B</a>"#,
                );
            })
            .await;
        let guide = server
            .mock_async(|when, then| {
                when.method(GET).path("/docs/guide.html");
                then.status(200)
                    .body(r#"<a href="index.html">Home</a><a href="deep.html">Deep</a>"#);
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/docs/deep.html");
                then.status(200).body("<p>too deep</p>");
            })
            .await;

        let dir = tempfile::tempdir().unwrap();
        let job = CrawlJob::new(dir.path(), vec![server.url("/docs/index.html")]).with_limits(2, 100);
        let summary = crawler().run(&job).await.unwrap();

        // each page fetched exactly once, deep.html queued but never fetched
        index.assert_async().await;
        guide.assert_async().await;
        assert_eq!(summary.fetched, 2);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.crawl_count, 3);
        assert_eq!(summary.visited, 3);

        let archive = CrawlArchive::open(dir.path()).unwrap();
        assert!(archive.artifacts_for(&server.url("/docs/deep.html")).unwrap().is_empty());

        let graph = archive.graph().unwrap();
        assert_eq!(graph.len(), 5);
        let follow: Vec<_> = graph.iter().map(|e| (e.text.as_str(), e.follow)).collect();
        assert_eq!(
            follow,
            vec![
                ("Guide", true),
                ("Elsewhere", false),
                ("B", false),
                ("Home", true),
                ("Deep", true)
            ]
        );
    }

    #[tokio::test]
    async fn test_page_count_bound() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/docs/index.html");
                then.status(200)
                    .body(r#"<a href="a.html">A</a><a href="b.html">B</a><a href="c.html">C</a>"#);
            })
            .await;
        for page in ["/docs/a.html", "/docs/b.html", "/docs/c.html"] {
            server
                .mock_async(|when, then| {
                    when.method(GET).path(page);
                    then.status(200).body("<p>leaf</p>");
                })
                .await;
        }

        let dir = tempfile::tempdir().unwrap();
        let job = CrawlJob::new(dir.path(), vec![server.url("/docs/index.html")]).with_limits(5, 2);
        let summary = crawler().run(&job).await.unwrap();

        assert_eq!(summary.fetched, 2);
        assert_eq!(summary.crawl_count, 4);
        assert_eq!(summary.skipped, 2);
        assert_eq!(data_files(dir.path()), 2);
    }

    #[tokio::test]
    async fn test_json_documents_get_auth_and_pages_do_not() {
        let server = MockServer::start_async().await;
        let spec = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/api/openapi.json")
                    .header("authorization", "Bearer t0k3n");
                then.status(200).body(
                    r#"{"swagger":"2.0","externalDocs":{"description":"Guide","url":"/api/guide.html"}}"#,
                );
            })
            .await;
        let guide = server
            .mock_async(|when, then| {
                when.method(GET).path("/api/guide.html");
                then.status(200).body("<h1>Guide</h1>");
            })
            .await;

        let dir = tempfile::tempdir().unwrap();
        let auth = BTreeMap::from([("Authorization".to_string(), "Bearer t0k3n".to_string())]);
        let job = CrawlJob::new(dir.path(), vec![server.url("/api/openapi.json")]).with_auth(auth);
        let summary = crawler().run(&job).await.unwrap();

        spec.assert_async().await;
        guide.assert_async().await;
        assert_eq!(summary.spec_candidates, 1);

        let graph = CrawlArchive::open(dir.path()).unwrap().graph().unwrap();
        assert_eq!(graph.len(), 1);
        assert_eq!(graph[0].target, server.url("/api/guide.html"));
        assert_eq!(graph[0].text, "url");
        assert!(graph[0].follow);
    }

    #[tokio::test]
    async fn test_failed_fetch_does_not_stop_the_run() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/throttled.json");
                then.status(429);
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/missing.html");
                then.status(404).body("not here");
            })
            .await;
        let ok = server
            .mock_async(|when, then| {
                when.method(GET).path("/ok.html");
                then.status(200).body("<p>fine</p>");
            })
            .await;

        let dir = tempfile::tempdir().unwrap();
        let job = CrawlJob::new(
            dir.path(),
            vec![
                server.url("/throttled.json"),
                server.url("/missing.html"),
                server.url("/ok.html"),
            ],
        );
        let summary = crawler().run(&job).await.unwrap();

        ok.assert_async().await;
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.fetched, 2);
        // the 404 is a fetch result but has no content to archive
        assert_eq!(data_files(dir.path()), 1);
        assert!(summary.graph_path.exists());
    }

    #[tokio::test]
    async fn test_rerun_adds_no_files() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/docs/index.html");
                then.status(200).body(r#"<a href="next.html">Next</a>"#);
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/docs/next.html");
                then.status(200).body("<p>end</p>");
            })
            .await;

        let dir = tempfile::tempdir().unwrap();
        let job = CrawlJob::new(dir.path(), vec![server.url("/docs/index.html")]);

        let first = crawler().run(&job).await.unwrap();
        let files_after_first = data_files(dir.path());
        let second = crawler().run(&job).await.unwrap();

        assert_eq!(files_after_first, 2);
        assert_eq!(data_files(dir.path()), files_after_first);
        assert_eq!(first.edges, second.edges);
    }

    #[tokio::test]
    async fn test_bad_auth_header_fails_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let storage = dir.path().join("never-created");
        let auth = BTreeMap::from([("Bad Header".to_string(), "x".to_string())]);
        let job = CrawlJob::new(&storage, vec!["https://a.com/openapi.json".to_string()]).with_auth(auth);

        let err = crawler().run(&job).await.unwrap_err();

        assert!(matches!(err, CrawlError::InvalidJob(_)));
        assert!(!storage.exists());
    }

    #[tokio::test]
    async fn test_invalid_job_touches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let storage = dir.path().join("never-created");
        let job = CrawlJob::new(&storage, vec!["not a url".to_string()]);

        let err = crawler().run(&job).await.unwrap_err();

        assert!(matches!(err, CrawlError::InvalidJob(_)));
        assert!(!storage.exists());
    }
}
