//! Crawl configuration.
//!
//! `CrawlConfig` carries every knob the engine honors. Construct it via
//! [`CrawlConfig::builder`], which validates the base URL and derives the
//! allowed-host list.

pub mod builder;

pub use builder::CrawlConfigBuilder;

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One authenticated session cookie, passed through opaquely to every
/// tab the browser backend creates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    #[serde(default)]
    pub path: Option<String>,
}

/// Main configuration for a crawl run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlConfig {
    /// Canvas origin, e.g. `https://canvas.example.edu`. Always a valid
    /// absolute URL (checked in the builder).
    pub(crate) base_url: String,
    /// Hosts that harvested links may resolve to. Defaults to the base
    /// host.
    pub(crate) allowed_hosts: Vec<String>,
    pub(crate) session_cookies: Vec<SessionCookie>,
    /// When true, only URLs whose text, title, or address mentions
    /// "syllabus" are enqueued or scraped (seeds excepted).
    pub(crate) syllabus_only: bool,
    pub(crate) pool_size: usize,
    pub(crate) max_links_per_course: usize,
    pub(crate) min_text_len: usize,
    pub(crate) max_page_chars: usize,
    pub(crate) max_file_chars: usize,
    pub(crate) excluded_course_ids: Vec<String>,
    /// When set, dashboard discovery is skipped and exactly these courses
    /// are crawled.
    pub(crate) course_ids: Option<Vec<String>>,
    /// Wall-clock budget from navigate start to script return.
    pub(crate) run_timeout_ms: u64,
    /// Post-load settling delay before a script runs.
    pub(crate) settle_delay_ms: u64,
    /// Politeness pause between page visits of one course.
    pub(crate) inter_page_delay_ms: u64,
    /// Pause between window teardown and rebuild during a restart.
    pub(crate) rebuild_delay_ms: u64,
    /// Restart-inducing timeouts tolerated per URL before abandonment.
    pub(crate) max_url_restarts: u32,
    pub(crate) headless: bool,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            allowed_hosts: Vec::new(),
            session_cookies: Vec::new(),
            syllabus_only: false,
            pool_size: 6,
            max_links_per_course: 250,
            min_text_len: 80,
            max_page_chars: 50_000,
            max_file_chars: 200_000,
            excluded_course_ids: Vec::new(),
            course_ids: None,
            run_timeout_ms: 60_000,
            settle_delay_ms: 700,
            inter_page_delay_ms: 250,
            rebuild_delay_ms: 1_500,
            max_url_restarts: 4,
            headless: true,
        }
    }
}

impl CrawlConfig {
    #[must_use]
    pub fn builder() -> CrawlConfigBuilder {
        CrawlConfigBuilder::new()
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn allowed_hosts(&self) -> &[String] {
        &self.allowed_hosts
    }

    #[must_use]
    pub fn session_cookies(&self) -> &[SessionCookie] {
        &self.session_cookies
    }

    #[must_use]
    pub fn syllabus_only(&self) -> bool {
        self.syllabus_only
    }

    #[must_use]
    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    #[must_use]
    pub fn max_links_per_course(&self) -> usize {
        self.max_links_per_course
    }

    #[must_use]
    pub fn min_text_len(&self) -> usize {
        self.min_text_len
    }

    #[must_use]
    pub fn max_page_chars(&self) -> usize {
        self.max_page_chars
    }

    #[must_use]
    pub fn max_file_chars(&self) -> usize {
        self.max_file_chars
    }

    #[must_use]
    pub fn excluded_course_ids(&self) -> &[String] {
        &self.excluded_course_ids
    }

    #[must_use]
    pub fn course_ids(&self) -> Option<&[String]> {
        self.course_ids.as_deref()
    }

    #[must_use]
    pub fn run_timeout(&self) -> Duration {
        Duration::from_millis(self.run_timeout_ms)
    }

    #[must_use]
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    #[must_use]
    pub fn inter_page_delay(&self) -> Duration {
        Duration::from_millis(self.inter_page_delay_ms)
    }

    #[must_use]
    pub fn rebuild_delay(&self) -> Duration {
        Duration::from_millis(self.rebuild_delay_ms)
    }

    #[must_use]
    pub fn max_url_restarts(&self) -> u32 {
        self.max_url_restarts
    }

    #[must_use]
    pub fn headless(&self) -> bool {
        self.headless
    }
}
