//! URL normalization and classification.
//!
//! Pure functions: canonicalize raw hrefs into the single absolute form
//! the rest of the engine uses for identity, reject anything out of
//! scope, and tag every surviving URL as a page or a file.
//!
//! Canonical form: fragment stripped, host lowercased, query reduced to
//! the whitelisted parameters, and `/files/` URLs coerced to their
//! `?preview=1` viewer form so a worker renders text instead of
//! triggering a binary download.

use url::Url;

use crate::config::CrawlConfig;
use crate::errors::CrawlError;

/// Document extensions that mark a URL as a file even outside `/files/`.
pub const DOCUMENT_EXTENSIONS: &[&str] = &[
    ".pdf", ".doc", ".docx", ".ppt", ".pptx", ".xls", ".xlsx", ".csv", ".txt", ".md", ".rtf",
];

/// Path fragments that are never worth visiting in an LMS session.
const FORBIDDEN_SEGMENTS: &[&str] = &[
    "/login",
    "/conversations",
    "/calendar",
    "/profile",
    "/settings/profile",
    "/settings/notifications",
];

/// Query parameters that survive normalization, in canonical order.
const KEPT_QUERY_KEYS: &[&str] = &["module_item_id", "course_id", "preview"];

/// Tag on every canonical URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Page,
    File,
}

/// Why a raw href was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    Malformed,
    UnsupportedScheme,
    AnchorOnly,
    ForeignHost,
    ForbiddenPath,
    OutsideCourse,
}

/// Outcome of [`UrlRules::normalize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Normalized {
    Page(String),
    File(String),
    Rejected(RejectReason),
}

impl Normalized {
    /// The canonical URL, when not rejected.
    #[must_use]
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Page(u) | Self::File(u) => Some(u),
            Self::Rejected(_) => None,
        }
    }
}

/// Host scoping plus the canvas base used to resolve relative hrefs.
#[derive(Debug, Clone)]
pub struct UrlRules {
    base: Url,
    allowed_hosts: Vec<String>,
}

impl UrlRules {
    pub fn new(base_url: &str, allowed_hosts: &[String]) -> Result<Self, CrawlError> {
        let base = Url::parse(base_url)
            .map_err(|e| CrawlError::Config(format!("invalid base url {base_url:?}: {e}")))?;
        let base_host = base
            .host_str()
            .ok_or_else(|| CrawlError::Config(format!("base url {base_url:?} has no host")))?
            .to_ascii_lowercase();
        let mut hosts: Vec<String> = allowed_hosts
            .iter()
            .map(|h| h.to_ascii_lowercase())
            .collect();
        if !hosts.contains(&base_host) {
            hosts.push(base_host);
        }
        Ok(Self {
            base,
            allowed_hosts: hosts,
        })
    }

    pub fn from_config(config: &CrawlConfig) -> Result<Self, CrawlError> {
        Self::new(config.base_url(), config.allowed_hosts())
    }

    /// Base page of a course: `{origin}/courses/{id}`.
    #[must_use]
    pub fn course_base(&self, course_id: &str) -> String {
        let origin = self.base.origin().ascii_serialization();
        format!("{origin}/courses/{course_id}")
    }

    /// The enrolled-courses dashboard.
    #[must_use]
    pub fn dashboard_url(&self) -> String {
        let origin = self.base.origin().ascii_serialization();
        format!("{origin}/courses")
    }

    #[must_use]
    pub fn host_allowed(&self, host: &str) -> bool {
        let host = host.to_ascii_lowercase();
        self.allowed_hosts.iter().any(|h| h == &host)
    }

    /// Canonicalize `raw` in the context of `course_id`.
    ///
    /// Pages outside the contextual course are rejected; files are
    /// accepted cross-course because file ids are globally scoped.
    /// Idempotent: feeding a canonical URL back through yields the same
    /// string.
    #[must_use]
    pub fn normalize(&self, raw: &str, course_id: &str) -> Normalized {
        let raw = raw.trim();
        if raw.is_empty() {
            return Normalized::Rejected(RejectReason::Malformed);
        }
        if raw.starts_with('#') {
            return Normalized::Rejected(RejectReason::AnchorOnly);
        }
        let lower = raw.to_ascii_lowercase();
        if lower.starts_with("javascript:") || lower.starts_with("mailto:") || lower.starts_with("data:")
        {
            return Normalized::Rejected(RejectReason::UnsupportedScheme);
        }

        let mut url = match Url::parse(raw) {
            Ok(u) => u,
            Err(url::ParseError::RelativeUrlWithoutBase) => match self.base.join(raw) {
                Ok(u) => u,
                Err(_) => return Normalized::Rejected(RejectReason::Malformed),
            },
            Err(_) => return Normalized::Rejected(RejectReason::Malformed),
        };

        if url.scheme() != "http" && url.scheme() != "https" {
            return Normalized::Rejected(RejectReason::UnsupportedScheme);
        }
        let host = match url.host_str() {
            Some(h) => h.to_ascii_lowercase(),
            None => return Normalized::Rejected(RejectReason::Malformed),
        };
        if !self.host_allowed(&host) {
            return Normalized::Rejected(RejectReason::ForeignHost);
        }

        url.set_fragment(None);

        // Coerce file links to their preview form: the viewer renders a
        // text layer, the download endpoint serves bytes.
        let mut path = url.path().to_string();
        let is_file_path = path.contains("/files/");
        if is_file_path {
            if let Some(idx) = path.find("/download") {
                path.truncate(idx);
                url.set_path(&path);
            }
        }

        if FORBIDDEN_SEGMENTS.iter().any(|s| path.contains(s)) {
            return Normalized::Rejected(RejectReason::ForbiddenPath);
        }

        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        url.set_query(None);
        let mut kept: Vec<(String, String)> = Vec::new();
        for key in KEPT_QUERY_KEYS {
            if *key == "preview" {
                continue;
            }
            if let Some((k, v)) = pairs.iter().find(|(k, _)| k == key) {
                kept.push((k.clone(), v.clone()));
            }
        }
        if is_file_path {
            kept.push(("preview".to_string(), "1".to_string()));
        }
        if !kept.is_empty() {
            let mut serializer = url.query_pairs_mut();
            for (k, v) in &kept {
                serializer.append_pair(k, v);
            }
            drop(serializer);
        }

        match classify(url.as_str()) {
            Classification::File => Normalized::File(url.into()),
            Classification::Page => {
                if page_in_course(url.path(), course_id) {
                    Normalized::Page(url.into())
                } else {
                    Normalized::Rejected(RejectReason::OutsideCourse)
                }
            }
        }
    }
}

/// Tag a URL as page or file. Total: every URL gets exactly one tag.
#[must_use]
pub fn classify(url: &str) -> Classification {
    let path = match Url::parse(url) {
        Ok(u) => u.path().to_string(),
        Err(_) => url.split(['?', '#']).next().unwrap_or(url).to_string(),
    };
    let lower = path.to_ascii_lowercase();
    if lower.contains("/files/")
        || lower.contains("/download")
        || DOCUMENT_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
    {
        Classification::File
    } else {
        Classification::Page
    }
}

/// Whether `path` lies inside `/courses/{course_id}`.
#[must_use]
pub fn page_in_course(path: &str, course_id: &str) -> bool {
    let prefix = format!("/courses/{course_id}");
    if let Some(rest) = path.strip_prefix(prefix.as_str()) {
        rest.is_empty() || rest.starts_with('/')
    } else {
        false
    }
}

/// Case-insensitive check used by syllabus-only mode: does the URL or any
/// of its discovery context mention "syllabus"?
#[must_use]
pub fn mentions_syllabus(url: &str, context: &[&str]) -> bool {
    let needle = "syllabus";
    if url.to_ascii_lowercase().contains(needle) {
        return true;
    }
    context
        .iter()
        .any(|c| c.to_ascii_lowercase().contains(needle))
}
