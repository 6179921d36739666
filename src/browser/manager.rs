//! Per-session browser lifecycle.
//!
//! # Lifecycle
//! - Browser NOT launched on creation (lazy initialization)
//! - First `acquire()` launches it through the session's launcher
//! - Later calls return the same handle
//! - `release()` closes it; later calls are no-ops

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{BrowserLauncher, HeadlessBrowser, LaunchOptions};
use crate::error::Result;

/// Owner of at most one browser process
#[derive(Debug)]
pub struct BrowserManager {
    launcher: Arc<dyn BrowserLauncher>,
    options: LaunchOptions,
    browser: Mutex<Option<Arc<dyn HeadlessBrowser>>>,
    active: AtomicBool,
}

impl BrowserManager {
    /// Create a manager; nothing is launched yet
    #[must_use]
    pub fn new(launcher: Arc<dyn BrowserLauncher>, options: LaunchOptions) -> Self {
        Self {
            launcher,
            options,
            browser: Mutex::new(None),
            active: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn options(&self) -> &LaunchOptions {
        &self.options
    }

    /// Whether a browser is currently running
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Get the session's browser, launching it on first use
    ///
    /// The mutex is held across the launch so concurrent first calls still
    /// produce a single process. Launch failures are returned as-is.
    pub async fn acquire(&self) -> Result<Arc<dyn HeadlessBrowser>> {
        let mut guard = self.browser.lock().await;

        if let Some(browser) = guard.as_ref() {
            debug!("Reusing existing browser");
            return Ok(Arc::clone(browser));
        }

        info!(
            headless = self.options.headless,
            ignore_https_errors = self.options.ignore_https_errors,
            "Launching browser"
        );
        let browser = self.launcher.launch(&self.options).await?;
        *guard = Some(Arc::clone(&browser));
        self.active.store(true, Ordering::Release);

        Ok(browser)
    }

    /// Close the browser if one was launched
    ///
    /// Safe to call multiple times (subsequent calls are no-ops).
    pub async fn release(&self) -> Result<()> {
        let browser = self.browser.lock().await.take();
        self.active.store(false, Ordering::Release);

        if let Some(browser) = browser {
            info!("Shutting down session browser");
            if let Err(e) = browser.close().await {
                warn!("Failed to close browser cleanly: {e}");
                return Err(e);
            }
        }

        Ok(())
    }

    /// Take the browser out without awaiting, for teardown paths that
    /// cannot block (e.g. `Drop`)
    pub(crate) fn detach(&self) -> Option<Arc<dyn HeadlessBrowser>> {
        let browser = self.browser.try_lock().ok()?.take();
        if browser.is_some() {
            self.active.store(false, Ordering::Release);
        }
        browser
    }
}
