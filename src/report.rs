//! The crawl's final product: one text corpus per course.

use serde::Serialize;
use std::collections::HashMap;

use crate::errors::ErrorEntry;
use crate::extract::{ScrapedFile, ScrapedPage};

/// Everything harvested for one course.
#[derive(Debug, Clone, Serialize)]
pub struct CourseCorpus {
    pub display_name: String,
    pub pages: Vec<ScrapedPage>,
    pub files: Vec<ScrapedFile>,
}

/// Result of a crawl run, complete or partial (after cancellation).
#[derive(Debug, Clone, Serialize, Default)]
pub struct CrawlReport {
    pub courses: HashMap<String, CourseCorpus>,
    pub errors: Vec<ErrorEntry>,
}

impl CrawlReport {
    /// Total stored items across all courses.
    #[must_use]
    pub fn item_count(&self) -> usize {
        self.courses
            .values()
            .map(|c| c.pages.len() + c.files.len())
            .sum()
    }
}
