//! Command-line driver: crawl a Canvas site with saved session cookies
//! and write the per-course corpora as JSON.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use coursescrape::{
    start_crawl, ChromiumHost, CrawlConfig, LogProgress, SessionCookie, StopSignal,
};

#[derive(Parser, Debug)]
#[command(name = "coursescrape", version, about = "Crawl an LMS into per-course text corpora")]
struct Cli {
    /// Canvas origin, e.g. https://canvas.example.edu
    #[arg(long)]
    base_url: String,

    /// JSON file with session cookies: [{"name", "value", "domain", "path"?}, ...]
    #[arg(long)]
    cookies: Option<PathBuf>,

    /// Only crawl URLs that mention "syllabus"
    #[arg(long)]
    syllabus_only: bool,

    /// Number of browser tabs to crawl with
    #[arg(long, default_value_t = 6)]
    pool_size: usize,

    /// Crawl exactly these course ids instead of discovering them
    #[arg(long = "course")]
    courses: Vec<String>,

    /// Course ids to skip entirely
    #[arg(long = "exclude")]
    excluded: Vec<String>,

    /// Hard page cap per course
    #[arg(long, default_value_t = 250)]
    max_links_per_course: usize,

    /// Show the browser window while crawling
    #[arg(long)]
    headful: bool,

    /// Where to write the crawl report
    #[arg(long, default_value = "corpus.json")]
    output: PathBuf,
}

/// Tolerant cookie-file reader: accepts browser-export JSON where the
/// name key may be `name` or `key`; entries without name or domain are
/// skipped.
fn load_cookies(path: &PathBuf) -> Result<Vec<SessionCookie>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading cookie file {}", path.display()))?;
    let raw: Vec<serde_json::Value> =
        serde_json::from_str(&content).context("cookie file is not a JSON array")?;

    let mut cookies = Vec::new();
    for value in raw {
        let name = value
            .get("name")
            .or_else(|| value.get("key"))
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        let domain = value
            .get("domain")
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        if name.is_empty() || domain.is_empty() {
            warn!("skipping cookie entry without name/domain");
            continue;
        }
        cookies.push(SessionCookie {
            name: name.to_string(),
            value: value
                .get("value")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            domain: domain.to_string(),
            path: value
                .get("path")
                .and_then(|v| v.as_str())
                .map(str::to_string),
        });
    }
    Ok(cookies)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("coursescrape=info,warn")
        }))
        .init();

    let cli = Cli::parse();

    let cookies = match &cli.cookies {
        Some(path) => load_cookies(path)?,
        None => {
            warn!("no --cookies given; crawling unauthenticated");
            Vec::new()
        }
    };

    let mut builder = CrawlConfig::builder()
        .base_url(&cli.base_url)
        .session_cookies(cookies)
        .syllabus_only(cli.syllabus_only)
        .pool_size(cli.pool_size)
        .max_links_per_course(cli.max_links_per_course)
        .excluded_course_ids(cli.excluded.clone())
        .headless(!cli.headful);
    if !cli.courses.is_empty() {
        builder = builder.course_ids(cli.courses.clone());
    }
    let config = builder.build()?;

    let host = Arc::new(ChromiumHost::new(
        config.headless(),
        config.session_cookies().to_vec(),
    ));
    let (stop_handle, stop) = StopSignal::new_pair();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, finishing in-flight work");
            stop_handle.stop();
        }
    });

    let report = start_crawl(config, host, Arc::new(LogProgress), stop).await?;

    let json = serde_json::to_string_pretty(&report).context("serializing crawl report")?;
    std::fs::write(&cli.output, json)
        .with_context(|| format!("writing report to {}", cli.output.display()))?;

    for (id, corpus) in &report.courses {
        info!(
            "{} ({id}): {} pages, {} files",
            corpus.display_name,
            corpus.pages.len(),
            corpus.files.len()
        );
    }
    info!(
        "wrote {} ({} errors logged)",
        cli.output.display(),
        report.errors.len()
    );
    Ok(())
}
