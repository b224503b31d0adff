//! chromiumoxide-backed [`BrowserHost`].
//!
//! One Chromium instance per scraping window; tabs are CDP pages inside
//! it. Session cookies are injected into every tab before first use.

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::CookieParam;
use chromiumoxide::cdp::browser_protocol::page::{
    SetWebLifecycleStateParams, SetWebLifecycleStateState,
};
use chromiumoxide::Page;
use futures::StreamExt;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use super::{BrowserHost, TabHandle};
use crate::config::SessionCookie;
use crate::errors::BrowserHostError;

struct WindowState {
    browser: Browser,
    handler_task: JoinHandle<()>,
    user_data_dir: PathBuf,
    tabs: HashMap<u64, Page>,
}

/// Production browser host over chromiumoxide.
pub struct ChromiumHost {
    headless: bool,
    cookies: Vec<SessionCookie>,
    window: Mutex<Option<WindowState>>,
    next_tab_id: AtomicU64,
    window_seq: AtomicU64,
}

impl ChromiumHost {
    #[must_use]
    pub fn new(headless: bool, cookies: Vec<SessionCookie>) -> Self {
        Self {
            headless,
            cookies,
            window: Mutex::new(None),
            next_tab_id: AtomicU64::new(0),
            window_seq: AtomicU64::new(0),
        }
    }

    /// Locate a Chrome/Chromium executable: `CHROMIUM_PATH` overrides,
    /// then well-known install paths, then `which`.
    fn find_executable() -> Result<PathBuf, BrowserHostError> {
        if let Ok(path) = std::env::var("CHROMIUM_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                info!("using browser from CHROMIUM_PATH: {}", path.display());
                return Ok(path);
            }
            warn!(
                "CHROMIUM_PATH points to non-existent file: {}",
                path.display()
            );
        }

        let candidates: Vec<PathBuf> = [
            "/usr/bin/google-chrome",
            "/usr/bin/google-chrome-stable",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/snap/bin/chromium",
            "/opt/google/chrome/chrome",
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
        ]
        .into_iter()
        .map(PathBuf::from)
        .chain(dirs::home_dir().into_iter().flat_map(|home| {
            [
                home.join("Applications/Google Chrome.app/Contents/MacOS/Google Chrome"),
                home.join("Applications/Chromium.app/Contents/MacOS/Chromium"),
            ]
        }))
        .collect();

        for path in candidates {
            if path.exists() {
                info!("found browser at {}", path.display());
                return Ok(path);
            }
        }

        for cmd in ["chromium", "chromium-browser", "google-chrome", "chrome"] {
            if let Ok(output) = std::process::Command::new("which").arg(cmd).output() {
                if output.status.success() {
                    let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                    if !path.is_empty() {
                        info!("found browser via which: {path}");
                        return Ok(PathBuf::from(path));
                    }
                }
            }
        }

        Err(BrowserHostError::Window(
            "no Chrome/Chromium executable found (set CHROMIUM_PATH)".into(),
        ))
    }

    async fn with_page<T>(
        &self,
        tab: &TabHandle,
        f: impl FnOnce(&Page) -> T,
    ) -> Result<T, BrowserHostError> {
        let window = self.window.lock().await;
        let state = window
            .as_ref()
            .ok_or_else(|| BrowserHostError::Window("scraping window is not open".into()))?;
        let page = state
            .tabs
            .get(&tab.0)
            .ok_or_else(|| BrowserHostError::TabGone(format!("No tab with id {}", tab.0)))?;
        Ok(f(page))
    }

    fn map_cdp_error(err: chromiumoxide::error::CdpError) -> BrowserHostError {
        let msg = err.to_string();
        if msg.contains("No tab with id") || msg.contains("Target closed") || msg.contains("closed")
        {
            BrowserHostError::TabGone(msg)
        } else {
            BrowserHostError::Navigation(msg)
        }
    }
}

#[async_trait]
impl BrowserHost for ChromiumHost {
    async fn open_window(&self) -> Result<(), BrowserHostError> {
        let mut window = self.window.lock().await;
        if window.is_some() {
            return Ok(());
        }

        let executable = Self::find_executable()?;
        let seq = self.window_seq.fetch_add(1, Ordering::Relaxed);
        let user_data_dir = std::env::temp_dir().join(format!(
            "coursescrape_chrome_{}_{seq}",
            std::process::id()
        ));
        std::fs::create_dir_all(&user_data_dir)
            .map_err(|e| BrowserHostError::Window(format!("user data dir: {e}")))?;

        let mut builder = BrowserConfig::builder()
            .chrome_executable(executable)
            .user_data_dir(user_data_dir.clone())
            .window_size(1440, 900)
            .arg("--disable-notifications")
            .arg("--disable-background-networking")
            .arg("--disable-background-timer-throttling")
            .arg("--disable-backgrounding-occluded-windows")
            .arg("--disable-hang-monitor")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--mute-audio")
            .arg("--hide-scrollbars");
        if !self.headless {
            builder = builder.with_head();
        }
        let config = builder
            .build()
            .map_err(|e| BrowserHostError::Window(format!("browser config: {e}")))?;

        info!("launching scraping window (headless={})", self.headless);
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserHostError::Window(format!("browser launch: {e}")))?;

        let handler_task = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if let Err(e) = h {
                    let msg = e.to_string();
                    // Chrome emits CDP events chromiumoxide cannot decode;
                    // those are not real failures.
                    let benign = msg.contains("data did not match any variant")
                        || msg.contains("Failed to deserialize WS response");
                    if benign {
                        trace!("suppressed CDP decode error: {msg}");
                    } else {
                        warn!("browser handler error: {msg}");
                    }
                }
            }
            debug!("browser handler task finished");
        });

        *window = Some(WindowState {
            browser,
            handler_task,
            user_data_dir,
            tabs: HashMap::new(),
        });
        Ok(())
    }

    async fn close_window(&self) -> Result<(), BrowserHostError> {
        let mut window = self.window.lock().await;
        let Some(mut state) = window.take() else {
            return Ok(());
        };

        for (_, page) in state.tabs.drain() {
            if let Err(e) = page.close().await {
                debug!("tab close during window teardown: {e}");
            }
        }
        if let Err(e) = state.browser.close().await {
            warn!("browser close: {e}");
        }
        if let Err(e) = state.browser.wait().await {
            warn!("browser wait: {e}");
        }
        state.handler_task.abort();
        if let Err(e) = std::fs::remove_dir_all(&state.user_data_dir) {
            warn!(
                "could not remove user data dir {}: {e}",
                state.user_data_dir.display()
            );
        }
        info!("scraping window closed");
        Ok(())
    }

    async fn create_tab(&self) -> Result<TabHandle, BrowserHostError> {
        let mut window = self.window.lock().await;
        let state = window
            .as_mut()
            .ok_or_else(|| BrowserHostError::Window("scraping window is not open".into()))?;

        let page = state
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| BrowserHostError::Window(format!("new tab: {e}")))?;

        for cookie in &self.cookies {
            let mut param = CookieParam::builder()
                .name(cookie.name.clone())
                .value(cookie.value.clone())
                .domain(cookie.domain.clone());
            if let Some(path) = &cookie.path {
                param = param.path(path.clone());
            }
            match param.build() {
                Ok(param) => {
                    if let Err(e) = page.set_cookie(param).await {
                        warn!("failed to set cookie {}: {e}", cookie.name);
                    }
                }
                Err(e) => warn!("failed to build cookie {}: {e}", cookie.name),
            }
        }

        let id = self.next_tab_id.fetch_add(1, Ordering::Relaxed);
        state.tabs.insert(id, page);
        debug!("created tab {id}");
        Ok(TabHandle(id))
    }

    async fn close_tab(&self, tab: &TabHandle) -> Result<(), BrowserHostError> {
        let mut window = self.window.lock().await;
        let state = window
            .as_mut()
            .ok_or_else(|| BrowserHostError::Window("scraping window is not open".into()))?;
        if let Some(page) = state.tabs.remove(&tab.0) {
            page.close().await.map_err(Self::map_cdp_error)?;
        }
        Ok(())
    }

    async fn set_non_discardable(&self, tab: &TabHandle) -> Result<(), BrowserHostError> {
        let page = self.with_page(tab, Page::clone).await?;
        if let Err(e) = page
            .execute(SetWebLifecycleStateParams {
                state: SetWebLifecycleStateState::Active,
            })
            .await
        {
            // Older Chromes reject the command; the tab still works.
            debug!("setWebLifecycleState not honored: {e}");
        }
        Ok(())
    }

    async fn navigate(&self, tab: &TabHandle, url: &str) -> Result<(), BrowserHostError> {
        let page = self.with_page(tab, Page::clone).await?;
        page.goto(url).await.map_err(Self::map_cdp_error)?;
        Ok(())
    }

    async fn wait_for_load(&self, tab: &TabHandle) -> Result<(), BrowserHostError> {
        let page = self.with_page(tab, Page::clone).await?;
        page.wait_for_navigation()
            .await
            .map_err(Self::map_cdp_error)?;
        Ok(())
    }

    async fn run_script(
        &self,
        tab: &TabHandle,
        script: &str,
        arg: serde_json::Value,
    ) -> Result<serde_json::Value, BrowserHostError> {
        let page = self.with_page(tab, Page::clone).await?;
        let expression = format!("({script})({arg})");
        let result = page
            .evaluate(expression)
            .await
            .map_err(|e| BrowserHostError::Script(e.to_string()))?;
        result
            .into_value::<serde_json::Value>()
            .map_err(|e| BrowserHostError::Script(e.to_string()))
    }
}
