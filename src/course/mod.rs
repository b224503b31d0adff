//! Per-course crawl state.
//!
//! One `CourseState` per course, touched by exactly one scheduler task
//! at a time (single writer). States are disjoint across courses, so no
//! locking is needed anywhere in here.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::extract::{ScrapedFile, ScrapedPage};

/// The six URLs always present in a course's initial queue, relative to
/// its base page.
pub const SEED_SUFFIXES: &[&str] = &[
    "",
    "/assignments",
    "/modules",
    "/assignments/syllabus",
    "/grades",
    "/announcements",
];

/// Sanitize a course display name to `[A-Za-z0-9 _-]`, falling back to
/// `Course <id>`.
#[must_use]
pub fn sanitize_display_name(id: &str, raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '_' | '-'))
        .collect();
    let cleaned = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    if cleaned.is_empty() {
        format!("Course {id}")
    } else {
        cleaned
    }
}

/// All mutable state of one course's crawl.
#[derive(Debug, Clone)]
pub struct CourseState {
    pub id: String,
    pub display_name: String,
    /// FIFO queue of canonical URLs still to visit. Push-front is
    /// reserved for the restart supervisor.
    pub queue: VecDeque<String>,
    pub visited_pages: HashSet<String>,
    pub visited_files: HashSet<String>,
    /// Restart-inducing timeouts (and file requeues) seen per URL.
    pub retry_counts: HashMap<String, u32>,
    pub pages: Vec<ScrapedPage>,
    pub files: Vec<ScrapedFile>,
    /// Flips true only once the queue drains or the page cap is hit.
    pub completed: bool,
    pub seeded: bool,
    pub prefetched: bool,
}

impl CourseState {
    #[must_use]
    pub fn new(id: impl Into<String>, raw_name: &str) -> Self {
        let id = id.into();
        let display_name = sanitize_display_name(&id, raw_name);
        Self {
            id,
            display_name,
            queue: VecDeque::new(),
            visited_pages: HashSet::new(),
            visited_files: HashSet::new(),
            retry_counts: HashMap::new(),
            pages: Vec::new(),
            files: Vec::new(),
            completed: false,
            seeded: false,
            prefetched: false,
        }
    }

    /// Enqueue the seed set. Runs once; a restart resume does not
    /// re-seed.
    pub fn seed(&mut self, course_base: &str) {
        if self.seeded {
            return;
        }
        for suffix in SEED_SUFFIXES {
            self.enqueue_page(&format!("{course_base}{suffix}"));
        }
        self.seeded = true;
    }

    /// Push a page URL to the queue tail unless it was visited or is
    /// already queued.
    pub fn enqueue_page(&mut self, url: &str) -> bool {
        if self.visited_pages.contains(url) {
            return false;
        }
        if self.queue.iter().any(|queued| queued == url) {
            return false;
        }
        self.queue.push_back(url.to_string());
        true
    }

    /// Requeue a URL at the very front (restart resume path). Any older
    /// queue entry for the same URL is dropped first.
    pub fn requeue_front(&mut self, url: &str) {
        self.queue.retain(|queued| queued != url);
        self.queue.push_front(url.to_string());
    }

    /// Requeue a URL at the tail (navigation-failure retry path).
    pub fn requeue_back(&mut self, url: &str) {
        self.queue.retain(|queued| queued != url);
        self.queue.push_back(url.to_string());
    }

    /// Bump and return the retry count of a URL.
    pub fn bump_retry(&mut self, url: &str) -> u32 {
        let count = self.retry_counts.entry(url.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    #[must_use]
    pub fn retry_count(&self, url: &str) -> u32 {
        self.retry_counts.get(url).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn page_cap_reached(&self, max_links_per_course: usize) -> bool {
        self.visited_pages.len() >= max_links_per_course
    }
}
