//! Crawl scheduling.
//!
//! One logical task per course drives that course's BFS to completion,
//! pulling workers from the shared pool. Files are scraped the moment
//! they are discovered; pages flow through the per-course FIFO queue.
//! The cross-course driver lives in [`driver`].

pub mod driver;

use dashmap::{DashMap, DashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::cancel::StopSignal;
use crate::config::CrawlConfig;
use crate::course::CourseState;
use crate::errors::{ErrorEntry, ErrorKind, ErrorLog};
use crate::extract::schema::{FileExtract, ModulePrefetch, PageExtract};
use crate::extract::{scripts, truncate_chars, ScrapedFile, ScrapedPage};
use crate::progress::{ProgressReporter, ProgressUpdate};
use crate::supervisor::{RestartRequest, Supervisor};
use crate::urls::{classify, mentions_syllabus, Classification, Normalized, UrlRules};
use crate::worker_pool::{Acquired, RunOutcome, Worker, WorkerPool};

/// How a course task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CourseOutcome {
    Completed,
    /// Unwound for a restart (as requester or sibling); the preserved
    /// state resumes next round.
    Restart,
    Cancelled,
}

/// Why the course loop unwound early.
#[derive(Debug, Clone, Copy)]
enum Unwind {
    Restart,
    Cancelled,
}

/// State shared by every course task of one crawl run.
pub(crate) struct CrawlContext {
    pub config: CrawlConfig,
    pub rules: UrlRules,
    pub supervisor: Supervisor,
    pub progress: Arc<dyn ProgressReporter>,
    pub errors: ErrorLog,
    pub stop: StopSignal,
    /// Every URL ever enqueued or discovered, for progress reporting.
    pub discovered: DashSet<String>,
    /// File URL -> owning course. A file belongs to whichever course
    /// discovered it first.
    pub file_owners: DashMap<String, String>,
    pub scraped: AtomicUsize,
}

impl CrawlContext {
    pub(crate) fn new(
        config: CrawlConfig,
        rules: UrlRules,
        progress: Arc<dyn ProgressReporter>,
        stop: StopSignal,
    ) -> Self {
        Self {
            config,
            rules,
            supervisor: Supervisor::new(),
            progress,
            errors: ErrorLog::new(),
            stop,
            discovered: DashSet::new(),
            file_owners: DashMap::new(),
            scraped: AtomicUsize::new(0),
        }
    }

    fn note_discovered(&self, url: &str) {
        self.discovered.insert(url.to_string());
    }

    pub(crate) fn report(&self, message: impl Into<String>, done: bool) {
        self.progress.report(ProgressUpdate {
            message: message.into(),
            discovered: self.discovered.len(),
            scraped: self.scraped.load(Ordering::Relaxed),
            done,
        });
    }

    pub(crate) fn log_error(&self, entry: ErrorEntry) {
        self.progress.report_error(&entry);
        self.errors.push(entry);
    }
}

/// Drive one course to completion (or an early unwind), consuming and
/// returning its state so the driver can preserve it across restarts.
pub(crate) async fn crawl_course(
    ctx: Arc<CrawlContext>,
    pool: Arc<WorkerPool>,
    mut state: CourseState,
) -> (CourseState, CourseOutcome) {
    match drive_course(&ctx, &pool, &mut state).await {
        Ok(()) => {
            state.completed = true;
            ctx.report(
                format!(
                    "course {} done: {} pages, {} files",
                    state.display_name,
                    state.pages.len(),
                    state.files.len()
                ),
                false,
            );
            (state, CourseOutcome::Completed)
        }
        Err(Unwind::Restart) => (state, CourseOutcome::Restart),
        Err(Unwind::Cancelled) => (state, CourseOutcome::Cancelled),
    }
}

async fn drive_course(
    ctx: &CrawlContext,
    pool: &WorkerPool,
    state: &mut CourseState,
) -> Result<(), Unwind> {
    let course_base = ctx.rules.course_base(&state.id);

    if !state.prefetched {
        prefetch_module_files(ctx, pool, state).await?;
    }

    if !state.seeded {
        state.seed(&course_base);
        if ctx.config.syllabus_only() {
            state.queue.retain(|url| mentions_syllabus(url, &[]));
        }
    }
    for url in &state.queue {
        ctx.note_discovered(url);
    }

    while !state.page_cap_reached(ctx.config.max_links_per_course()) {
        let Some(url) = state.queue.pop_front() else {
            break;
        };
        if ctx.stop.is_stopped() {
            return Err(Unwind::Cancelled);
        }

        match classify(&url) {
            Classification::File => {
                if state.visited_files.contains(&url) {
                    continue;
                }
                scrape_file(ctx, pool, state, &url).await?;
            }
            Classification::Page => {
                if state.visited_pages.contains(&url) {
                    continue;
                }
                state.visited_pages.insert(url.clone());
                visit_page(ctx, pool, state, &url).await?;
            }
        }

        // Politeness pause, also giving the host a breath between tabs.
        sleep_checked(ctx, ctx.config.inter_page_delay()).await?;
    }

    Ok(())
}

/// Acquire a worker, mapping a cancelled acquire onto the right unwind:
/// restart-in-flight means the pool was torn down under us and our queue
/// will be resumed; otherwise the crawl is stopping.
async fn acquire(ctx: &CrawlContext, pool: &WorkerPool) -> Result<Worker, Unwind> {
    match pool.acquire().await {
        Acquired::Worker(worker) => Ok(worker),
        Acquired::Cancelled => {
            if !ctx.stop.is_stopped() && ctx.supervisor.restart_in_flight() {
                Err(Unwind::Restart)
            } else {
                Err(Unwind::Cancelled)
            }
        }
    }
}

async fn sleep_checked(ctx: &CrawlContext, delay: Duration) -> Result<(), Unwind> {
    tokio::select! {
        _ = tokio::time::sleep(delay) => Ok(()),
        _ = ctx.stop.cancelled() => Err(Unwind::Cancelled),
    }
}

/// Visit one page URL: extract, store if long enough, fan its links out
/// into the queue and the file path.
async fn visit_page(
    ctx: &CrawlContext,
    pool: &WorkerPool,
    state: &mut CourseState,
    url: &str,
) -> Result<(), Unwind> {
    let mut worker = acquire(ctx, pool).await?;
    let arg = serde_json::json!({
        "max_chars": ctx.config.max_page_chars(),
        "allowed_hosts": ctx.config.allowed_hosts(),
    });
    let outcome = pool
        .navigate_and_run(&mut worker, url, &state.id, scripts::PAGE_EXTRACTOR, arg, false)
        .await;
    pool.release(worker).await;

    match outcome {
        Err(e) => {
            // Worker is dead or navigation broke; the page URL stays
            // visited and is dropped.
            ctx.log_error(ErrorEntry::new(
                ErrorKind::NavigationFailure,
                Some(state.id.clone()),
                Some(url.to_string()),
                e.to_string(),
            ));
        }
        Ok(RunOutcome::Detached) => {
            debug!("page torn down mid-extraction, dropped: {url}");
        }
        Ok(RunOutcome::Timeout { .. }) => {
            ctx.log_error(ErrorEntry::new(
                ErrorKind::HangTimeout,
                Some(state.id.clone()),
                Some(url.to_string()),
                format!("page extraction timed out, url dropped: {url}"),
            ));
        }
        Ok(RunOutcome::Value(value)) => {
            let extract: PageExtract = match serde_json::from_value(value) {
                Ok(extract) => extract,
                Err(e) => {
                    debug!("unparseable page extract for {url}: {e}");
                    return Ok(());
                }
            };
            handle_page_extract(ctx, pool, state, url, extract).await?;
        }
    }
    Ok(())
}

async fn handle_page_extract(
    ctx: &CrawlContext,
    pool: &WorkerPool,
    state: &mut CourseState,
    url: &str,
    extract: PageExtract,
) -> Result<(), Unwind> {
    if extract.text.chars().count() >= ctx.config.min_text_len() {
        state.pages.push(ScrapedPage {
            course_id: state.id.clone(),
            url: url.to_string(),
            title: extract.title.clone(),
            text: truncate_chars(&extract.text, ctx.config.max_page_chars()),
            links: extract.links.clone(),
            extracted_at: chrono::Utc::now(),
        });
        ctx.scraped.fetch_add(1, Ordering::Relaxed);
        ctx.report(format!("scraped page {url}"), false);
    }
    // A too-short body is dropped silently, but its links still count.

    // Page links are enqueued before any file is scraped, so an unwind
    // during the file sweep cannot lose them.
    let mut file_links: Vec<(String, String)> = Vec::new();
    for link in &extract.links {
        match ctx.rules.normalize(&link.url, &state.id) {
            Normalized::Rejected(_) => {}
            Normalized::File(canonical) => file_links.push((canonical, link.text.clone())),
            Normalized::Page(canonical) => {
                if ctx.config.syllabus_only() && !mentions_syllabus(&canonical, &[&link.text]) {
                    continue;
                }
                if state.enqueue_page(&canonical) {
                    ctx.note_discovered(&canonical);
                }
            }
        }
    }
    sweep_files(ctx, pool, state, &file_links).await
}

/// Scrape a batch of discovered file links. If one of them unwinds the
/// course (restart or cancellation), the rest are parked in the queue so
/// the resumed run dispatches them from the pop path.
async fn sweep_files(
    ctx: &CrawlContext,
    pool: &WorkerPool,
    state: &mut CourseState,
    file_links: &[(String, String)],
) -> Result<(), Unwind> {
    for index in 0..file_links.len() {
        let (canonical, anchor) = &file_links[index];
        if let Err(unwind) = maybe_scrape_file(ctx, pool, state, canonical, anchor).await {
            for (rest, rest_anchor) in &file_links[index + 1..] {
                defer_file(ctx, state, rest, rest_anchor);
            }
            return Err(unwind);
        }
    }
    Ok(())
}

/// Park a discovered-but-unscraped file URL in the queue, applying the
/// same gating and ownership rules the immediate path would have.
fn defer_file(ctx: &CrawlContext, state: &mut CourseState, url: &str, anchor_text: &str) {
    if state.visited_files.contains(url) {
        return;
    }
    if ctx.config.syllabus_only() && !mentions_syllabus(url, &[anchor_text]) {
        return;
    }
    let owner = ctx
        .file_owners
        .entry(url.to_string())
        .or_insert_with(|| state.id.clone())
        .clone();
    if owner != state.id {
        return;
    }
    ctx.note_discovered(url);
    state.requeue_back(url);
}

/// Discovery handoff for a file URL: dedupe, apply syllabus gating and
/// cross-course ownership, then scrape immediately.
async fn maybe_scrape_file(
    ctx: &CrawlContext,
    pool: &WorkerPool,
    state: &mut CourseState,
    url: &str,
    anchor_text: &str,
) -> Result<(), Unwind> {
    if state.visited_files.contains(url) {
        return Ok(());
    }
    if ctx.config.syllabus_only() && !mentions_syllabus(url, &[anchor_text]) {
        return Ok(());
    }
    let owner = ctx
        .file_owners
        .entry(url.to_string())
        .or_insert_with(|| state.id.clone())
        .clone();
    if owner != state.id {
        return Ok(());
    }
    ctx.note_discovered(url);
    scrape_file(ctx, pool, state, url).await
}

/// Scrape one file URL through the viewer. Restart-inducing timeouts and
/// navigation failures are absorbed here, bounded by the per-URL cap.
async fn scrape_file(
    ctx: &CrawlContext,
    pool: &WorkerPool,
    state: &mut CourseState,
    url: &str,
) -> Result<(), Unwind> {
    state.visited_files.insert(url.to_string());

    let mut worker = acquire(ctx, pool).await?;
    let arg = serde_json::json!({ "max_chars": ctx.config.max_file_chars() });
    let outcome = pool
        .navigate_and_run(
            &mut worker,
            url,
            &state.id,
            scripts::FILE_VIEWER_EXTRACTOR,
            arg,
            true,
        )
        .await;
    pool.release(worker).await;

    match outcome {
        Err(e) => {
            let count = state.bump_retry(url);
            if count > ctx.config.max_url_restarts() {
                ctx.log_error(ErrorEntry::new(
                    ErrorKind::RestartCapExceeded,
                    Some(state.id.clone()),
                    Some(url.to_string()),
                    format!("restart cap exceeded, file abandoned: {url}"),
                ));
            } else {
                ctx.log_error(ErrorEntry::new(
                    ErrorKind::NavigationFailure,
                    Some(state.id.clone()),
                    Some(url.to_string()),
                    format!("file navigation failed (attempt {count}): {e}"),
                ));
                state.visited_files.remove(url);
                state.requeue_back(url);
            }
        }
        Ok(RunOutcome::Detached) => {
            debug!("file viewer torn down mid-extraction, dropped: {url}");
        }
        Ok(RunOutcome::Timeout { .. }) => {
            let count = state.bump_retry(url);
            if count > ctx.config.max_url_restarts() {
                ctx.log_error(ErrorEntry::new(
                    ErrorKind::RestartCapExceeded,
                    Some(state.id.clone()),
                    Some(url.to_string()),
                    format!("restart cap exceeded, file abandoned: {url}"),
                ));
                // Stays in visited_files without being scraped.
            } else {
                ctx.supervisor.request_restart(RestartRequest {
                    course_id: state.id.clone(),
                    url: url.to_string(),
                    reason: "file extraction timeout".into(),
                });
                state.visited_files.remove(url);
                state.requeue_front(url);
                ctx.log_error(ErrorEntry::new(
                    ErrorKind::RestartInduced,
                    Some(state.id.clone()),
                    Some(url.to_string()),
                    format!("file extraction timed out, restarting window (attempt {count})"),
                ));
                return Err(Unwind::Restart);
            }
        }
        Ok(RunOutcome::Value(value)) => {
            let extract: FileExtract = match serde_json::from_value(value) {
                Ok(extract) => extract,
                Err(e) => {
                    debug!("unparseable file extract for {url}: {e}");
                    return Ok(());
                }
            };
            if extract.text.chars().count() >= ctx.config.min_text_len() {
                let filename = if extract.filename.is_empty() {
                    url.split('/').last().unwrap_or(url).to_string()
                } else {
                    extract.filename
                };
                state.files.push(ScrapedFile {
                    course_id: state.id.clone(),
                    url: url.to_string(),
                    filename,
                    text: truncate_chars(&extract.text, ctx.config.max_file_chars()),
                    extracted_at: chrono::Utc::now(),
                });
                ctx.scraped.fetch_add(1, Ordering::Relaxed);
                ctx.report(format!("scraped file {url}"), false);
            }
            // Short files are dropped entirely; viewers yield no links.
        }
    }
    Ok(())
}

/// Visit `/modules` once before BFS and scrape every file it reveals:
/// many modules only expose their files after expansion.
async fn prefetch_module_files(
    ctx: &CrawlContext,
    pool: &WorkerPool,
    state: &mut CourseState,
) -> Result<(), Unwind> {
    let modules_url = format!("{}/modules", ctx.rules.course_base(&state.id));

    let mut worker = acquire(ctx, pool).await?;
    let arg = serde_json::json!({ "allowed_hosts": ctx.config.allowed_hosts() });
    let outcome = pool
        .navigate_and_run(
            &mut worker,
            &modules_url,
            &state.id,
            scripts::MODULE_PREFETCH,
            arg,
            false,
        )
        .await;
    pool.release(worker).await;

    // Prefetch is done exactly once, even if a restart interrupts the
    // file sweep below; anything missed resurfaces during BFS.
    state.prefetched = true;

    let links = match outcome {
        Err(e) => {
            ctx.log_error(ErrorEntry::new(
                ErrorKind::NavigationFailure,
                Some(state.id.clone()),
                Some(modules_url.clone()),
                format!("module prefetch failed: {e}"),
            ));
            return Ok(());
        }
        Ok(RunOutcome::Detached) => return Ok(()),
        Ok(RunOutcome::Timeout { .. }) => {
            ctx.log_error(ErrorEntry::new(
                ErrorKind::HangTimeout,
                Some(state.id.clone()),
                Some(modules_url.clone()),
                "module prefetch timed out".to_string(),
            ));
            return Ok(());
        }
        Ok(RunOutcome::Value(value)) => match serde_json::from_value::<ModulePrefetch>(value) {
            Ok(prefetch) => prefetch.links,
            Err(e) => {
                debug!("unparseable module prefetch for {modules_url}: {e}");
                return Ok(());
            }
        },
    };

    let file_links: Vec<(String, String)> = links
        .into_iter()
        .filter_map(|link| match ctx.rules.normalize(&link.url, &state.id) {
            Normalized::File(canonical) => Some((canonical, link.text)),
            _ => None,
        })
        .collect();
    sweep_files(ctx, pool, state, &file_links).await
}
