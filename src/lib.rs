//! coursescrape: an authenticated crawler for Canvas-style LMS sites.
//!
//! Given a logged-in browser session, the engine visits every accessible
//! page and embedded file of every enrolled course and emits one text
//! corpus per course, ready for downstream summarization. The crawl is
//! bounded, parallel, and breadth-first, over a fixed pool of reusable
//! browser tabs, with restart-on-hang recovery that resumes mid-crawl
//! without redoing completed work.

pub mod browser;
pub mod cancel;
pub mod config;
pub mod course;
pub mod errors;
pub mod extract;
pub mod progress;
pub mod report;
pub mod scheduler;
pub mod supervisor;
pub mod urls;
pub mod worker_pool;

pub use browser::{BrowserHost, ChromiumHost, TabHandle};
pub use cancel::{StopHandle, StopSignal};
pub use config::{CrawlConfig, CrawlConfigBuilder, SessionCookie};
pub use course::CourseState;
pub use errors::{BrowserHostError, CrawlError, ErrorEntry, ErrorKind, ErrorLog};
pub use extract::schema::{
    CourseLink, FileExtract, ModulePrefetch, PageExtract, PageLink, ScrapedFile, ScrapedPage,
};
pub use progress::{LogProgress, NoOpProgress, ProgressReporter, ProgressUpdate};
pub use report::{CourseCorpus, CrawlReport};
pub use scheduler::driver::start_crawl;
pub use supervisor::{RestartRequest, Supervisor, SupervisorState};
pub use urls::{classify, Classification, Normalized, RejectReason, UrlRules};
pub use worker_pool::{Acquired, RunOutcome, Worker, WorkerPool};

use std::sync::Arc;

/// Crawl with the production chromiumoxide backend and no progress
/// reporting. The cookies in `config` authenticate every tab.
pub async fn crawl(config: CrawlConfig) -> Result<CrawlReport, CrawlError> {
    let host = Arc::new(ChromiumHost::new(
        config.headless(),
        config.session_cookies().to_vec(),
    ));
    start_crawl(
        config,
        host,
        Arc::new(NoOpProgress),
        StopSignal::never(),
    )
    .await
}
