// src/main.rs
// =============================================================================
// This is the entry point of the doc-crawler binary.
//
// What happens here:
// 1. Set up logging (RUST_LOG, default "info", written to stderr)
// 2. Parse command-line arguments using clap
// 3. Build the fetcher/renderer and run the crawl (or read an archive)
// 4. Print a summary on stdout
// 5. Exit with proper code (0 = spec found / archive ok, 1 = no spec found, 2 = error)
// =============================================================================

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands, CrawlArgs};
use doc_crawler::{CrawlArchive, CrawlSummary, Crawler, Fetcher, HeadlessRenderer, PageRenderer, RateLimiter};
use serde::Serialize;
use std::path::Path;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let exit_code = match run().await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            2
        }
    };

    std::process::exit(exit_code);
}

async fn run() -> Result<i32> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Crawl(args) => handle_crawl(&args).await,
        Commands::Inspect { storage_dir, json } => handle_inspect(&storage_dir, json),
    }
}

// Handles the 'crawl' subcommand
//
// Returns Ok(0) when at least one spec candidate was saved, Ok(1) otherwise
async fn handle_crawl(args: &CrawlArgs) -> Result<i32> {
    let job = args.to_job()?;

    let fetch_config = args.fetch.to_config();
    let limiter = RateLimiter::per_second(fetch_config.requests_per_second);
    let fetcher = Fetcher::new(fetch_config, limiter).context("Failed to build HTTP client")?;

    let renderer = if args.render.no_browser {
        PageRenderer::Plain(fetcher.clone())
    } else {
        let config = args.render.to_config(&fetcher.config().user_agent);
        if let Some(dir) = &config.screenshot_dir {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create screenshot directory {}", dir.display()))?;
        }
        PageRenderer::Headless(HeadlessRenderer::new(config))
    };

    let summary = Crawler::new(fetcher, renderer)
        .run(&job)
        .await
        .context("Crawl failed")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_crawl_summary(&summary);
    }

    Ok(if summary.spec_candidates > 0 { 0 } else { 1 })
}

fn print_crawl_summary(summary: &CrawlSummary) {
    println!("📊 Crawl summary:");
    println!("   Seeds:           {}", summary.seeds);
    println!("   Queued URLs:     {}", summary.visited);
    println!("   Fetched:         {}", summary.fetched);
    println!("   Failed:          {}", summary.failed);
    println!("   Skipped:         {}", summary.skipped);
    println!("   Edges:           {}", summary.edges);
    println!("   Spec candidates: {}", summary.spec_candidates);
    println!("   Graph:           {}", summary.graph_path.display());
    println!("   Took:            {:.1}s", summary.duration().as_secs_f64());
}

#[derive(Debug, Serialize)]
struct ArchiveReport {
    edges: usize,
    followed_edges: usize,
    distinct_targets: usize,
    spec_candidates: Vec<String>,
}

// Handles the 'inspect' subcommand
fn handle_inspect(storage_dir: &Path, json: bool) -> Result<i32> {
    let archive = CrawlArchive::open(storage_dir)
        .with_context(|| format!("Cannot open crawl directory {}", storage_dir.display()))?;
    let graph = archive.graph().context("Failed to read crawl graph")?;
    let specs = archive.spec_candidates()?;

    let targets: std::collections::HashSet<&str> = graph.iter().map(|e| e.target.as_str()).collect();
    let report = ArchiveReport {
        edges: graph.len(),
        followed_edges: graph.iter().filter(|e| e.follow).count(),
        distinct_targets: targets.len(),
        spec_candidates: specs.iter().map(|p| p.display().to_string()).collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("📂 {}", archive.root().display());
        println!("   Edges:            {}", report.edges);
        println!("   Followed edges:   {}", report.followed_edges);
        println!("   Distinct targets: {}", report.distinct_targets);
        println!("   Spec candidates:  {}", report.spec_candidates.len());
        for spec in &report.spec_candidates {
            println!("     - {}", spec);
        }
    }

    Ok(0)
}
