//! Cross-course driver and restart rounds.
//!
//! The driver discovers the course list, spawns one task per incomplete
//! course, and drains them. When a course task unwinds with a restart
//! request, the pool is destroyed immediately (waking blocked siblings),
//! the scraping window is rebuilt, and every incomplete course resumes
//! from its preserved queue. Completed courses are never re-driven.

use futures::stream::FuturesUnordered;
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use super::{crawl_course, CourseOutcome, CrawlContext};
use crate::browser::BrowserHost;
use crate::cancel::StopSignal;
use crate::config::CrawlConfig;
use crate::course::CourseState;
use crate::errors::{CrawlError, ErrorEntry, ErrorKind};
use crate::extract::schema::CourseLink;
use crate::extract::scripts;
use crate::progress::ProgressReporter;
use crate::report::{CourseCorpus, CrawlReport};
use crate::supervisor::SupervisorState;
use crate::urls::UrlRules;
use crate::worker_pool::{Acquired, RunOutcome, WorkerPool};

/// Crawl every current-term course reachable from the configured canvas
/// origin and return the per-course corpora.
///
/// Cancellation is orderly: stopping mid-run yields `Ok` with the
/// partial report and an error entry noting the cancellation.
pub async fn start_crawl(
    config: CrawlConfig,
    host: Arc<dyn BrowserHost>,
    progress: Arc<dyn ProgressReporter>,
    stop: StopSignal,
) -> Result<CrawlReport, CrawlError> {
    let rules = UrlRules::from_config(&config)?;
    let ctx = Arc::new(CrawlContext::new(config, rules, progress, stop));
    let started = Instant::now();

    host.open_window()
        .await
        .map_err(|e| CrawlError::WindowCreation(e.to_string()))?;
    let mut pool = WorkerPool::start(
        Arc::clone(&host),
        ctx.config.pool_size(),
        ctx.config.settle_delay(),
        ctx.config.run_timeout(),
        ctx.stop.clone(),
    )
    .await?;

    ctx.report("crawl started", false);

    let mut states = match build_course_states(&ctx, &pool).await {
        Ok(states) => states,
        Err(e) => {
            pool.destroy_all().await;
            let _ = host.close_window().await;
            return Err(e);
        }
    };
    if states.is_empty() {
        warn!("no courses to crawl");
    }

    let mut cancelled = false;
    loop {
        ctx.supervisor.set_state(SupervisorState::Running);

        let mut tasks = FuturesUnordered::new();
        let pending: Vec<CourseState> = {
            let ids: Vec<String> = states
                .iter()
                .filter(|(_, s)| !s.completed)
                .map(|(id, _)| id.clone())
                .collect();
            ids.into_iter()
                .filter_map(|id| states.remove(&id))
                .collect()
        };
        for state in pending {
            ctx.report(format!("crawling course {}", state.display_name), false);
            tasks.push(tokio::spawn(crawl_course(
                Arc::clone(&ctx),
                Arc::clone(&pool),
                state,
            )));
        }

        let mut teardown_started = false;
        while let Some(joined) = tasks.next().await {
            match joined {
                Ok((state, outcome)) => {
                    match outcome {
                        CourseOutcome::Completed => {}
                        CourseOutcome::Restart => {
                            // Tear the pool down as soon as the first
                            // restarting task unwinds; blocked siblings
                            // wake with cancellation and preserve their
                            // queues.
                            if !teardown_started {
                                teardown_started = true;
                                ctx.supervisor.set_state(SupervisorState::TearingDown);
                                pool.destroy_all().await;
                            }
                        }
                        CourseOutcome::Cancelled => cancelled = true,
                    }
                    states.insert(state.id.clone(), state);
                }
                Err(e) => {
                    error!("course task panicked: {e}");
                }
            }
        }

        if cancelled || ctx.stop.is_stopped() {
            ctx.supervisor.set_state(SupervisorState::Stopped);
            ctx.log_error(ErrorEntry::new(
                ErrorKind::Cancelled,
                None,
                None,
                "crawl cancelled by host".to_string(),
            ));
            break;
        }

        let Some(request) = ctx.supervisor.take_request() else {
            break;
        };

        info!(
            "restarting scraping window after hang on {} (course {})",
            request.url, request.course_id
        );
        ctx.report(
            format!("restarting browser after hang on {}", request.url),
            false,
        );
        pool.destroy_all().await;
        if let Err(e) = host.close_window().await {
            warn!("window close during restart: {e}");
        }
        tokio::time::sleep(ctx.config.rebuild_delay()).await;

        ctx.supervisor.set_state(SupervisorState::Rebuilding);
        if let Err(e) = host.open_window().await {
            // Rebuild failure is fatal: no window, no crawl.
            return Err(CrawlError::WindowCreation(e.to_string()));
        }
        pool = WorkerPool::start(
            Arc::clone(&host),
            ctx.config.pool_size(),
            ctx.config.settle_delay(),
            ctx.config.run_timeout(),
            ctx.stop.clone(),
        )
        .await?;
    }

    pool.destroy_all().await;
    let _ = host.close_window().await;

    let report = assemble_report(&ctx, states);
    info!(
        "crawl finished in {:.1?}: {} courses, {} items, {} errors",
        started.elapsed(),
        report.courses.len(),
        report.item_count(),
        report.errors.len()
    );
    ctx.report("crawl finished", true);
    Ok(report)
}

/// Build the initial course states, from the explicit id list when
/// given, otherwise from the dashboard.
async fn build_course_states(
    ctx: &Arc<CrawlContext>,
    pool: &Arc<WorkerPool>,
) -> Result<HashMap<String, CourseState>, CrawlError> {
    let links = match ctx.config.course_ids() {
        Some(ids) => ids
            .iter()
            .map(|id| CourseLink {
                id: id.clone(),
                name: String::new(),
                url: ctx.rules.course_base(id),
            })
            .collect(),
        None => discover_courses(ctx, pool).await?,
    };

    let mut states = HashMap::new();
    for link in links {
        if link.id.is_empty() {
            continue;
        }
        if ctx
            .config
            .excluded_course_ids()
            .iter()
            .any(|excluded| excluded == &link.id)
        {
            info!("skipping excluded course {}", link.id);
            continue;
        }
        states
            .entry(link.id.clone())
            .or_insert_with(|| CourseState::new(link.id.clone(), &link.name));
    }
    info!("crawling {} courses", states.len());
    Ok(states)
}

/// Read the enrolled-course list off the dashboard.
async fn discover_courses(
    ctx: &Arc<CrawlContext>,
    pool: &Arc<WorkerPool>,
) -> Result<Vec<CourseLink>, CrawlError> {
    let dashboard = ctx.rules.dashboard_url();
    let mut worker = match pool.acquire().await {
        Acquired::Worker(worker) => worker,
        Acquired::Cancelled => return Ok(Vec::new()),
    };
    let outcome = pool
        .navigate_and_run(
            &mut worker,
            &dashboard,
            "",
            scripts::COURSE_LIST,
            serde_json::json!({}),
            false,
        )
        .await;
    pool.release(worker).await;

    match outcome {
        Ok(RunOutcome::Value(value)) => {
            let links: Vec<CourseLink> = serde_json::from_value(value)
                .map_err(|e| CrawlError::Browser(format!("course list did not parse: {e}")))?;
            Ok(links)
        }
        Ok(RunOutcome::Detached) => Ok(Vec::new()),
        Ok(RunOutcome::Timeout { .. }) => Err(CrawlError::Browser(
            "course discovery timed out".to_string(),
        )),
        Err(e) => Err(CrawlError::Browser(format!("course discovery failed: {e}"))),
    }
}

fn assemble_report(ctx: &CrawlContext, states: HashMap<String, CourseState>) -> CrawlReport {
    let mut report = CrawlReport {
        courses: HashMap::new(),
        errors: ctx.errors.snapshot(),
    };
    for (id, state) in states {
        report.courses.insert(
            id,
            CourseCorpus {
                display_name: state.display_name,
                pages: state.pages,
                files: state.files,
            },
        );
    }
    report
}
