//! In-memory browser host for integration tests.
//!
//! The mock serves a scripted site graph and mimics the page-side
//! routines: it answers the real script constants with the structured
//! values the extractors would have produced, absolutizing links the way
//! the in-page `new URL(href, location)` call does. Per-URL hang budgets
//! make a document hang (pend forever) a fixed number of times, which
//! the pool's wall-clock timeout converts into `Timeout` outcomes.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use url::Url;

use coursescrape::browser::{BrowserHost, TabHandle};
use coursescrape::errors::BrowserHostError;
use coursescrape::extract::scripts;
use coursescrape::{CrawlConfig, SessionCookie};

pub const BASE: &str = "https://canvas.example.edu";

/// One scripted document.
#[derive(Debug, Clone, Default)]
pub struct MockDoc {
    pub text: String,
    pub title: String,
    /// (href, anchor text) pairs, relative or absolute.
    pub links: Vec<(String, String)>,
    /// How many visits hang before the document starts answering.
    pub hangs: u32,
}

impl MockDoc {
    pub fn page(text: &str, links: &[(&str, &str)]) -> Self {
        Self {
            text: text.to_string(),
            title: String::new(),
            links: links
                .iter()
                .map(|(href, t)| (href.to_string(), t.to_string()))
                .collect(),
            hangs: 0,
        }
    }

    pub fn file(text: &str) -> Self {
        Self {
            text: text.to_string(),
            ..Self::default()
        }
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.title = title.to_string();
        self
    }

    pub fn with_hangs(mut self, hangs: u32) -> Self {
        self.hangs = hangs;
        self
    }
}

pub struct MockHost {
    docs: Mutex<HashMap<String, MockDoc>>,
    hang_budget: Mutex<HashMap<String, u32>>,
    tabs: Mutex<HashMap<u64, String>>,
    next_tab: AtomicU64,
    window_open: AtomicBool,
    pub navigations: Mutex<Vec<String>>,
    pub tabs_created: AtomicUsize,
    pub max_live_tabs: AtomicUsize,
    pub windows_opened: AtomicUsize,
    /// When set, every `open_window` call past the first N fails.
    pub fail_window_opens_after: Option<usize>,
}

impl MockHost {
    pub fn new(site: HashMap<String, MockDoc>) -> Arc<Self> {
        Self::build(site, None)
    }

    /// A host whose `open_window` starts failing after `cap` successes.
    pub fn failing_windows(site: HashMap<String, MockDoc>, cap: usize) -> Arc<Self> {
        Self::build(site, Some(cap))
    }

    fn build(site: HashMap<String, MockDoc>, fail_window_opens_after: Option<usize>) -> Arc<Self> {
        let hang_budget = site
            .iter()
            .filter(|(_, doc)| doc.hangs > 0)
            .map(|(url, doc)| (url.clone(), doc.hangs))
            .collect();
        Arc::new(Self {
            docs: Mutex::new(site),
            hang_budget: Mutex::new(hang_budget),
            tabs: Mutex::new(HashMap::new()),
            next_tab: AtomicU64::new(0),
            window_open: AtomicBool::new(false),
            navigations: Mutex::new(Vec::new()),
            tabs_created: AtomicUsize::new(0),
            max_live_tabs: AtomicUsize::new(0),
            windows_opened: AtomicUsize::new(0),
            fail_window_opens_after,
        })
    }

    pub fn live_tabs(&self) -> usize {
        self.tabs.lock().unwrap().len()
    }

    pub fn navigation_count(&self) -> usize {
        self.navigations.lock().unwrap().len()
    }

    pub fn navigations_to(&self, url: &str) -> usize {
        self.navigations
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.as_str() == url)
            .count()
    }

    fn current_url(&self, tab: &TabHandle) -> Result<String, BrowserHostError> {
        self.tabs
            .lock()
            .unwrap()
            .get(&tab.0)
            .cloned()
            .ok_or_else(|| BrowserHostError::TabGone(format!("No tab with id {}", tab.0)))
    }

    fn doc_for(&self, url: &str) -> MockDoc {
        self.docs.lock().unwrap().get(url).cloned().unwrap_or_default()
    }

    /// Take one hang token for this URL. True means "hang this visit".
    fn should_hang(&self, url: &str) -> bool {
        let mut budget = self.hang_budget.lock().unwrap();
        match budget.get_mut(url) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        }
    }

    fn absolutize(&self, base: &str, href: &str) -> Option<String> {
        let base = Url::parse(base).ok()?;
        let abs = base.join(href).ok()?;
        if abs.scheme() != "http" && abs.scheme() != "https" {
            return None;
        }
        Some(abs.to_string())
    }

    fn looks_like_file(path: &str) -> bool {
        let lower = path.to_ascii_lowercase();
        lower.contains("/files/")
            || lower.contains("/download")
            || [
                ".pdf", ".doc", ".docx", ".ppt", ".pptx", ".xls", ".xlsx", ".csv", ".txt", ".md",
                ".rtf",
            ]
            .iter()
            .any(|ext| lower.ends_with(ext))
    }

    fn link_objects(&self, current: &str, doc: &MockDoc) -> Vec<Value> {
        let mut seen = std::collections::HashSet::new();
        let mut links = Vec::new();
        for (href, text) in &doc.links {
            let Some(abs) = self.absolutize(current, href) else {
                continue;
            };
            if !seen.insert(abs.clone()) {
                continue;
            }
            let path = Url::parse(&abs).map(|u| u.path().to_string()).unwrap_or_default();
            links.push(json!({
                "url": abs,
                "text": text,
                "is_file": Self::looks_like_file(&path),
            }));
        }
        links
    }
}

#[async_trait]
impl BrowserHost for MockHost {
    async fn open_window(&self) -> Result<(), BrowserHostError> {
        let opened = self.windows_opened.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(cap) = self.fail_window_opens_after {
            if opened > cap {
                return Err(BrowserHostError::Window("window creation failed".into()));
            }
        }
        self.window_open.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn close_window(&self) -> Result<(), BrowserHostError> {
        self.window_open.store(false, Ordering::SeqCst);
        self.tabs.lock().unwrap().clear();
        Ok(())
    }

    async fn create_tab(&self) -> Result<TabHandle, BrowserHostError> {
        if !self.window_open.load(Ordering::SeqCst) {
            return Err(BrowserHostError::Window("no window".into()));
        }
        let id = self.next_tab.fetch_add(1, Ordering::SeqCst);
        let live = {
            let mut tabs = self.tabs.lock().unwrap();
            tabs.insert(id, "about:blank".to_string());
            tabs.len()
        };
        self.tabs_created.fetch_add(1, Ordering::SeqCst);
        self.max_live_tabs.fetch_max(live, Ordering::SeqCst);
        Ok(TabHandle(id))
    }

    async fn close_tab(&self, tab: &TabHandle) -> Result<(), BrowserHostError> {
        self.tabs.lock().unwrap().remove(&tab.0);
        Ok(())
    }

    async fn set_non_discardable(&self, tab: &TabHandle) -> Result<(), BrowserHostError> {
        self.current_url(tab).map(|_| ())
    }

    async fn navigate(&self, tab: &TabHandle, url: &str) -> Result<(), BrowserHostError> {
        {
            let mut tabs = self.tabs.lock().unwrap();
            let entry = tabs
                .get_mut(&tab.0)
                .ok_or_else(|| BrowserHostError::TabGone(format!("No tab with id {}", tab.0)))?;
            *entry = url.to_string();
        }
        self.navigations.lock().unwrap().push(url.to_string());
        Ok(())
    }

    async fn wait_for_load(&self, tab: &TabHandle) -> Result<(), BrowserHostError> {
        self.current_url(tab).map(|_| ())
    }

    async fn run_script(
        &self,
        tab: &TabHandle,
        script: &str,
        arg: Value,
    ) -> Result<Value, BrowserHostError> {
        let current = self.current_url(tab)?;
        if self.should_hang(&current) {
            std::future::pending::<()>().await;
        }
        let doc = self.doc_for(&current);
        let max_chars = arg
            .get("max_chars")
            .and_then(Value::as_u64)
            .unwrap_or(u64::MAX) as usize;
        let clipped: String = doc.text.chars().take(max_chars).collect();

        if script == scripts::PAGE_EXTRACTOR {
            Ok(json!({
                "text": clipped,
                "title": doc.title,
                "url": current,
                "links": self.link_objects(&current, &doc),
            }))
        } else if script == scripts::FILE_VIEWER_EXTRACTOR {
            let filename = if doc.title.is_empty() {
                Url::parse(&current)
                    .ok()
                    .and_then(|u| {
                        u.path_segments()
                            .and_then(|s| s.filter(|seg| !seg.is_empty()).last())
                            .map(str::to_string)
                    })
                    .unwrap_or_else(|| current.clone())
            } else {
                doc.title.clone()
            };
            Ok(json!({
                "text": clipped,
                "filename": filename,
                "url": current,
            }))
        } else if script == scripts::MODULE_PREFETCH {
            let links: Vec<Value> = self
                .link_objects(&current, &doc)
                .into_iter()
                .filter(|l| l.get("is_file").and_then(Value::as_bool).unwrap_or(false))
                .collect();
            Ok(json!({ "links": links }))
        } else if script == scripts::COURSE_LIST {
            let mut seen = std::collections::HashSet::new();
            let mut courses = Vec::new();
            for (href, text) in &doc.links {
                let Some(abs) = self.absolutize(&current, href) else {
                    continue;
                };
                let Ok(parsed) = Url::parse(&abs) else {
                    continue;
                };
                let segments: Vec<&str> = parsed
                    .path_segments()
                    .map(|s| s.filter(|seg| !seg.is_empty()).collect())
                    .unwrap_or_default();
                if segments.len() == 2
                    && segments[0] == "courses"
                    && segments[1].chars().all(|c| c.is_ascii_digit())
                    && seen.insert(segments[1].to_string())
                {
                    courses.push(json!({
                        "id": segments[1],
                        "name": text,
                        "url": abs,
                    }));
                }
            }
            Ok(json!(courses))
        } else {
            Err(BrowserHostError::Script("unknown script".into()))
        }
    }
}

/// A config tuned for tests: tiny delays, a short run budget so hangs
/// time out in milliseconds, and a low storage threshold.
pub fn test_config(course_ids: &[&str]) -> CrawlConfig {
    CrawlConfig::builder()
        .base_url(BASE)
        .course_ids(course_ids.iter().map(|s| s.to_string()).collect())
        .pool_size(2)
        .min_text_len(10)
        .run_timeout_ms(250)
        .settle_delay_ms(0)
        .inter_page_delay_ms(1)
        .rebuild_delay_ms(1)
        .build()
        .expect("test config")
}

/// Convenience: a session cookie for tests that need one.
#[allow(dead_code)]
pub fn test_cookie() -> SessionCookie {
    SessionCookie {
        name: "canvas_session".into(),
        value: "secret".into(),
        domain: "canvas.example.edu".into(),
        path: Some("/".into()),
    }
}

/// Text long enough to clear the test `min_text_len`.
pub fn filler(label: &str) -> String {
    format!("{label} lorem ipsum dolor sit amet, consectetur adipiscing elit")
}
