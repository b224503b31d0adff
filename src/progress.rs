//! Progress reporting abstraction.
//!
//! The host observes a crawl through coarse updates carrying the
//! monotonic discovered/scraped counters, plus the structured error
//! stream. Implementations can push to channels, update UI, or log.

use tracing::{info, warn};

use crate::errors::ErrorEntry;

/// One progress update.
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    pub message: String,
    /// URLs ever discovered, process-wide.
    pub discovered: usize,
    /// Pages plus files stored so far.
    pub scraped: usize,
    pub done: bool,
}

/// Sink for crawl progress and errors.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, update: ProgressUpdate);

    fn report_error(&self, entry: &ErrorEntry);
}

/// Progress reporter that does nothing.
#[derive(Debug, Clone, Copy)]
pub struct NoOpProgress;

impl ProgressReporter for NoOpProgress {
    #[inline(always)]
    fn report(&self, _update: ProgressUpdate) {}

    #[inline(always)]
    fn report_error(&self, _entry: &ErrorEntry) {}
}

/// Progress reporter that forwards everything to `tracing`.
#[derive(Debug, Clone, Copy)]
pub struct LogProgress;

impl ProgressReporter for LogProgress {
    fn report(&self, update: ProgressUpdate) {
        info!(
            discovered = update.discovered,
            scraped = update.scraped,
            done = update.done,
            "{}",
            update.message
        );
    }

    fn report_error(&self, entry: &ErrorEntry) {
        warn!(
            kind = ?entry.kind,
            course = entry.course_id.as_deref().unwrap_or("-"),
            url = entry.url.as_deref().unwrap_or("-"),
            "{}",
            entry.message
        );
    }
}
