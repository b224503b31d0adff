//! Fallible builder for [`CrawlConfig`].

use url::Url;

use super::{CrawlConfig, SessionCookie};
use crate::errors::CrawlError;

/// Builder for [`CrawlConfig`]. `base_url` is the only required field;
/// everything else falls back to the engine defaults.
#[derive(Debug, Default)]
pub struct CrawlConfigBuilder {
    config: CrawlConfig,
}

impl CrawlConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config.base_url = base_url.into();
        self
    }

    /// Additional hosts links may resolve to (the base host is always
    /// allowed).
    #[must_use]
    pub fn allowed_hosts(mut self, hosts: Vec<String>) -> Self {
        self.config.allowed_hosts = hosts;
        self
    }

    #[must_use]
    pub fn session_cookies(mut self, cookies: Vec<SessionCookie>) -> Self {
        self.config.session_cookies = cookies;
        self
    }

    #[must_use]
    pub fn syllabus_only(mut self, syllabus_only: bool) -> Self {
        self.config.syllabus_only = syllabus_only;
        self
    }

    #[must_use]
    pub fn pool_size(mut self, pool_size: usize) -> Self {
        self.config.pool_size = pool_size;
        self
    }

    #[must_use]
    pub fn max_links_per_course(mut self, max: usize) -> Self {
        self.config.max_links_per_course = max;
        self
    }

    #[must_use]
    pub fn min_text_len(mut self, min: usize) -> Self {
        self.config.min_text_len = min;
        self
    }

    #[must_use]
    pub fn max_page_chars(mut self, max: usize) -> Self {
        self.config.max_page_chars = max;
        self
    }

    #[must_use]
    pub fn max_file_chars(mut self, max: usize) -> Self {
        self.config.max_file_chars = max;
        self
    }

    #[must_use]
    pub fn excluded_course_ids(mut self, ids: Vec<String>) -> Self {
        self.config.excluded_course_ids = ids;
        self
    }

    #[must_use]
    pub fn course_ids(mut self, ids: Vec<String>) -> Self {
        self.config.course_ids = Some(ids);
        self
    }

    #[must_use]
    pub fn run_timeout_ms(mut self, ms: u64) -> Self {
        self.config.run_timeout_ms = ms;
        self
    }

    #[must_use]
    pub fn settle_delay_ms(mut self, ms: u64) -> Self {
        self.config.settle_delay_ms = ms;
        self
    }

    #[must_use]
    pub fn inter_page_delay_ms(mut self, ms: u64) -> Self {
        self.config.inter_page_delay_ms = ms;
        self
    }

    #[must_use]
    pub fn rebuild_delay_ms(mut self, ms: u64) -> Self {
        self.config.rebuild_delay_ms = ms;
        self
    }

    #[must_use]
    pub fn max_url_restarts(mut self, max: u32) -> Self {
        self.config.max_url_restarts = max;
        self
    }

    #[must_use]
    pub fn headless(mut self, headless: bool) -> Self {
        self.config.headless = headless;
        self
    }

    /// Validate and finish. Fails when the base URL does not parse, has
    /// no host, or when numeric knobs are degenerate (zero pool, zero
    /// timeout).
    pub fn build(mut self) -> Result<CrawlConfig, CrawlError> {
        let trimmed = self.config.base_url.trim_end_matches('/').to_string();
        let parsed = Url::parse(&trimmed)
            .map_err(|e| CrawlError::Config(format!("invalid base_url {trimmed:?}: {e}")))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| CrawlError::Config(format!("base_url {trimmed:?} has no host")))?
            .to_ascii_lowercase();
        self.config.base_url = trimmed;

        if !self.config.allowed_hosts.iter().any(|h| h == &host) {
            self.config.allowed_hosts.push(host);
        }
        for h in &mut self.config.allowed_hosts {
            *h = h.to_ascii_lowercase();
        }

        if self.config.pool_size == 0 {
            return Err(CrawlError::Config("pool_size must be at least 1".into()));
        }
        if self.config.run_timeout_ms == 0 {
            return Err(CrawlError::Config("run_timeout_ms must be non-zero".into()));
        }

        Ok(self.config)
    }
}
