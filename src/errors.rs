//! Error taxonomy and the append-only crawl error log.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Fatal errors the crawl entry point can return.
///
/// Everything recoverable (empty extractions, dead tabs, single-URL
/// timeouts) is absorbed into the error log instead; see [`ErrorKind`].
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("scraping window could not be created: {0}")]
    WindowCreation(String),
    #[error("browser error: {0}")]
    Browser(String),
}

/// Errors surfaced by a [`crate::browser::BrowserHost`] implementation.
#[derive(Debug, Error)]
pub enum BrowserHostError {
    /// The tab no longer exists ("No tab with id" class). The worker
    /// holding it is dead and must be replaced.
    #[error("tab gone: {0}")]
    TabGone(String),
    #[error("navigation failed: {0}")]
    Navigation(String),
    /// The injected script raised or the evaluation channel broke.
    #[error("script error: {0}")]
    Script(String),
    #[error("window error: {0}")]
    Window(String),
}

impl BrowserHostError {
    /// DOM-access failures caused by the page being torn down mid-run.
    /// These resolve to an empty extraction rather than a worker death.
    #[must_use]
    pub fn is_frame_detached(&self) -> bool {
        match self {
            Self::Script(msg) => msg.contains("Frame") || msg.contains("removed"),
            _ => false,
        }
    }

    /// Whether the error means the tab itself is unusable from now on.
    #[must_use]
    pub fn is_tab_dead(&self) -> bool {
        matches!(self, Self::TabGone(_))
    }
}

/// Recoverability classes for the error log, one per failure mode the
/// scheduler knows how to absorb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    EmptyExtraction,
    FrameDetached,
    NavigationFailure,
    HangTimeout,
    RestartInduced,
    RestartCapExceeded,
    WindowCreation,
    Cancelled,
}

/// One structured entry in the crawl error log.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorEntry {
    pub course_id: Option<String>,
    pub url: Option<String>,
    pub kind: ErrorKind,
    pub message: String,
    pub at: DateTime<Utc>,
}

impl ErrorEntry {
    pub fn new(
        kind: ErrorKind,
        course_id: Option<String>,
        url: Option<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            course_id,
            url,
            kind,
            message: message.into(),
            at: Utc::now(),
        }
    }
}

/// Append-only, shareable error log. Entries are never mutated or removed
/// once pushed; the final snapshot lands in the crawl report.
#[derive(Debug, Clone, Default)]
pub struct ErrorLog {
    entries: Arc<Mutex<Vec<ErrorEntry>>>,
}

impl ErrorLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: ErrorEntry) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(entry);
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<ErrorEntry> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
