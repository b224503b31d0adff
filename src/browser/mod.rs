//! The browser capability boundary.
//!
//! The engine needs exactly five things from a browser: create and
//! destroy tabs inside one isolated window, pin a tab against memory
//! reclamation, observe load-complete, and run a one-argument function
//! against a tab's DOM. Everything above this trait is browser-agnostic;
//! the production backend lives in [`chromium`].

pub mod chromium;

pub use chromium::ChromiumHost;

use async_trait::async_trait;

use crate::errors::BrowserHostError;

/// Opaque identifier of a tab inside the scraping window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TabHandle(pub u64);

/// The five-primitive browser capability the crawl engine runs on.
#[async_trait]
pub trait BrowserHost: Send + Sync {
    /// Open the isolated scraping window. Idempotent.
    async fn open_window(&self) -> Result<(), BrowserHostError>;

    /// Close the scraping window and every tab in it. Idempotent.
    async fn close_window(&self) -> Result<(), BrowserHostError>;

    async fn create_tab(&self) -> Result<TabHandle, BrowserHostError>;

    async fn close_tab(&self, tab: &TabHandle) -> Result<(), BrowserHostError>;

    /// Pin the tab so the host does not reclaim it under memory pressure.
    async fn set_non_discardable(&self, tab: &TabHandle) -> Result<(), BrowserHostError>;

    /// Direct the tab to `url`. Resolves once navigation is dispatched.
    async fn navigate(&self, tab: &TabHandle, url: &str) -> Result<(), BrowserHostError>;

    /// Resolves once the tab reports load-complete for its current
    /// navigation.
    async fn wait_for_load(&self, tab: &TabHandle) -> Result<(), BrowserHostError>;

    /// Inject `script` (the source of an `async (arg) => ...` function)
    /// into the tab's DOM, call it with `arg`, and return its value.
    async fn run_script(
        &self,
        tab: &TabHandle,
        script: &str,
        arg: serde_json::Value,
    ) -> Result<serde_json::Value, BrowserHostError>;
}
