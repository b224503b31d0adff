//! Structured values exchanged with the page-side extraction routines
//! and the records that end up in the per-course corpus.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One harvested anchor: already absolutized and host-filtered inside
/// the page, but not yet normalized or classified.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageLink {
    pub url: String,
    #[serde(default)]
    pub text: String,
    /// Preliminary guess made in-page; the classifier has the last word.
    #[serde(default)]
    pub is_file: bool,
}

/// Return value of the page extractor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageExtract {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub links: Vec<PageLink>,
}

/// Return value of the file-viewer extractor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileExtract {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub url: String,
}

/// Return value of the module-prefetch extractor: every href in the
/// expanded modules view that looks like a file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModulePrefetch {
    #[serde(default)]
    pub links: Vec<PageLink>,
}

/// One enrolled course, as read off the dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseLink {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: String,
}

/// A stored page of a course corpus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapedPage {
    pub course_id: String,
    pub url: String,
    pub title: String,
    pub text: String,
    pub links: Vec<PageLink>,
    pub extracted_at: DateTime<Utc>,
}

/// A stored file of a course corpus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapedFile {
    pub course_id: String,
    pub url: String,
    pub filename: String,
    pub text: String,
    pub extracted_at: DateTime<Utc>,
}
