//! Lazily launched, process-wide browser with a bounded page pool.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;

use cardfill_core::AppConfig;

use crate::error::BrowserError;

pub const VIEWPORT_WIDTH: u32 = 1366;
pub const VIEWPORT_HEIGHT: u32 = 900;

/// Common Chrome/Chromium install locations, checked in order.
const CHROME_PATHS: &[&str] = &[
    "/usr/bin/google-chrome",
    "/usr/bin/google-chrome-stable",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/snap/bin/chromium",
    "/opt/google/chrome/google-chrome",
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
];

const BROWSER_ARGS: &[&str] = &[
    "--disable-blink-features=AutomationControlled",
    "--disable-dev-shm-usage",
    "--disable-infobars",
    "--no-first-run",
    "--no-default-browser-check",
    "--no-sandbox",
];

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub chrome_path: Option<PathBuf>,
    pub headless: bool,
    pub max_pages: usize,
    pub user_agent: String,
}

impl SessionOptions {
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            chrome_path: config.chrome_path.clone(),
            headless: config.headless,
            max_pages: config.max_pages,
            user_agent: config.user_agent.clone(),
        }
    }
}

struct LiveBrowser {
    browser: Browser,
    handler: JoinHandle<()>,
}

impl LiveBrowser {
    fn is_connected(&self) -> bool {
        !self.handler.is_finished()
    }
}

/// Shared browser handle.
///
/// The process is launched on the first [`Self::open_page`] call and
/// relaunched if its CDP connection drops. At most `max_pages` pages are open
/// at once; further callers wait for a lease to be returned.
pub struct BrowserSession {
    options: SessionOptions,
    live: Mutex<Option<LiveBrowser>>,
    pages: Arc<Semaphore>,
    closed: AtomicBool,
}

impl std::fmt::Debug for BrowserSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrowserSession")
            .field("options", &self.options)
            .field("available_pages", &self.pages.available_permits())
            .field("closed", &self.closed.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

/// A page checked out of the session; returns its pool slot when closed or
/// dropped.
pub struct PageLease {
    page: Page,
    _permit: OwnedSemaphorePermit,
}

impl PageLease {
    #[must_use]
    pub fn page(&self) -> &Page {
        &self.page
    }

    /// Closes the page. Errors are logged; the slot is released either way.
    pub async fn close(self) {
        let Self { page, _permit } = self;
        if let Err(e) = page.close().await {
            tracing::debug!(error = %e, "page close failed");
        }
    }
}

impl BrowserSession {
    #[must_use]
    pub fn new(options: SessionOptions) -> Self {
        let pages = Arc::new(Semaphore::new(options.max_pages.max(1)));
        Self {
            options,
            live: Mutex::new(None),
            pages,
            closed: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(SessionOptions::from_config(config))
    }

    #[must_use]
    pub fn max_pages(&self) -> usize {
        self.options.max_pages.max(1)
    }

    #[must_use]
    pub fn available_pages(&self) -> usize {
        self.pages.available_permits()
    }

    pub async fn is_connected(&self) -> bool {
        self.live
            .lock()
            .await
            .as_ref()
            .is_some_and(LiveBrowser::is_connected)
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Opens a blank page, launching the browser first if needed.
    ///
    /// # Errors
    ///
    /// - [`BrowserError::Closed`] after [`Self::shutdown`].
    /// - [`BrowserError::Launch`] if neither the preferred executable nor the
    ///   default one starts.
    /// - [`BrowserError::Cdp`] if the running browser refuses a new page.
    pub async fn open_page(&self) -> Result<PageLease, BrowserError> {
        if self.is_closed() {
            return Err(BrowserError::Closed);
        }
        let permit = Arc::clone(&self.pages)
            .acquire_owned()
            .await
            .map_err(|_| BrowserError::Closed)?;

        let mut live = self.live.lock().await;
        if self.is_closed() {
            return Err(BrowserError::Closed);
        }

        let browser = match live.take() {
            Some(existing) if existing.is_connected() => live.insert(existing),
            stale => {
                if let Some(stale) = stale {
                    tracing::warn!("browser connection lost, relaunching");
                    stale.handler.abort();
                }
                live.insert(self.launch().await?)
            }
        };

        let page = browser.browser.new_page("about:blank").await?;
        drop(live);

        Ok(PageLease {
            page,
            _permit: permit,
        })
    }

    /// Closes the browser. Only the first call does anything; returns whether
    /// this call was it.
    pub async fn shutdown(&self) -> bool {
        if self.closed.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.pages.close();

        let live = self.live.lock().await.take();
        if let Some(mut live) = live {
            if let Err(e) = live.browser.close().await {
                tracing::debug!(error = %e, "browser close error (ignored)");
            }
            live.handler.abort();
            tracing::info!("browser closed");
        }
        true
    }

    async fn launch(&self) -> Result<LiveBrowser, BrowserError> {
        let preferred = preferred_executable(self.options.chrome_path.as_deref(), CHROME_PATHS, |p| {
            p.exists()
        });

        if let Some(path) = preferred {
            tracing::info!(path = %path.display(), headless = self.options.headless, "launching browser");
            match self.build_config(Some(&path)) {
                Ok(config) => match launch_with(config).await {
                    Ok(live) => return Ok(live),
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "preferred browser failed to launch, retrying with defaults");
                    }
                },
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "preferred browser config rejected, retrying with defaults");
                }
            }
        }

        let config = self
            .build_config(None)
            .map_err(|e| BrowserError::Launch(e.to_string()))?;
        launch_with(config).await
    }

    fn build_config(&self, executable: Option<&Path>) -> Result<BrowserConfig, BrowserError> {
        let mut builder = BrowserConfig::builder()
            .viewport(Some(Viewport {
                width: VIEWPORT_WIDTH,
                height: VIEWPORT_HEIGHT,
                device_scale_factor: Some(1.0),
                ..Default::default()
            }))
            .window_size(VIEWPORT_WIDTH, VIEWPORT_HEIGHT)
            .args(BROWSER_ARGS.iter().copied())
            .arg(format!("--user-agent={}", self.options.user_agent));
        if let Some(path) = executable {
            builder = builder.chrome_executable(path);
        }
        if !self.options.headless {
            builder = builder.with_head();
        }
        builder.build().map_err(BrowserError::Config)
    }
}

async fn launch_with(config: BrowserConfig) -> Result<LiveBrowser, BrowserError> {
    let (browser, mut handler) = Browser::launch(config)
        .await
        .map_err(|e| BrowserError::Launch(e.to_string()))?;

    let handler = tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            let Err(e) = event else { continue };
            let message = e.to_string();
            // Newer Chrome builds emit CDP messages chromiumoxide cannot parse.
            if message.contains("did not match any variant") {
                continue;
            }
            tracing::debug!(error = %e, "CDP handler error");
            if is_connection_loss(&message) {
                tracing::warn!(error = %e, "browser connection lost");
                break;
            }
        }
        tracing::debug!("CDP handler task completed");
    });

    Ok(LiveBrowser { browser, handler })
}

fn is_connection_loss(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    ["connection closed", "websocket closed", "io error", "transport error"]
        .iter()
        .any(|needle| message.contains(needle))
}

/// Picks the executable to try first: the configured one, else the first
/// existing well-known install location.
fn preferred_executable<F>(configured: Option<&Path>, candidates: &[&str], exists: F) -> Option<PathBuf>
where
    F: Fn(&Path) -> bool,
{
    if let Some(path) = configured {
        return Some(path.to_path_buf());
    }
    candidates
        .iter()
        .map(Path::new)
        .find(|p| exists(p))
        .map(Path::to_path_buf)
}
