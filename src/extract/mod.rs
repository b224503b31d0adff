//! Extraction routines and their result types.

pub mod schema;
pub mod scripts;

pub use schema::{
    CourseLink, FileExtract, ModulePrefetch, PageExtract, PageLink, ScrapedFile, ScrapedPage,
};

/// Truncate on a char boundary. The page-side routines already cap what
/// they return; this re-enforces the cap host-side so a misbehaving
/// viewer cannot blow up a corpus record.
#[must_use]
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
