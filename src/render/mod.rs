//! Headless rendering of pages.
//!
//! [`orchestrator::run_attempt`] performs one attempt on an open browser;
//! [`retry::render_with_retries`] drives attempts until one produces markup.
//! Both the blocking and async page APIs go through the same loop.

pub mod orchestrator;
pub mod retry;

use std::sync::Arc;
use std::time::Duration;

use crate::browser::{BrowserTab, CookieRecord};
use crate::utils::constants::{DEFAULT_RENDER_RETRIES, DEFAULT_RENDER_TIMEOUT, DEFAULT_RENDER_WAIT};

pub use orchestrator::run_attempt;
pub use retry::render_with_retries;

/// Caller-facing render settings
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Attempts before giving up
    pub retries: u32,
    /// JavaScript run after the page loads; its result is returned
    pub script: Option<String>,
    /// Pause after opening the tab, before navigation
    pub wait: Duration,
    /// Number of page-down presses
    pub scrolldown: u32,
    /// Pause after each scroll, or once when not scrolling
    pub sleep: Duration,
    /// Navigate to the page URL; otherwise the current markup is loaded in place
    pub reload: bool,
    /// Navigation budget per attempt
    pub timeout: Duration,
    /// Leave the tab open and keep it on the page
    pub keep_page: bool,
    pub cookies: Vec<CookieRecord>,
    /// Install the session's cookies instead of `cookies`
    pub send_cookies_session: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            retries: DEFAULT_RENDER_RETRIES,
            script: None,
            wait: DEFAULT_RENDER_WAIT,
            scrolldown: 0,
            sleep: Duration::ZERO,
            reload: true,
            timeout: DEFAULT_RENDER_TIMEOUT,
            keep_page: false,
            cookies: Vec::new(),
            send_cookies_session: false,
        }
    }
}

impl RenderOptions {
    #[must_use]
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    #[must_use]
    pub fn with_script(mut self, script: impl Into<String>) -> Self {
        self.script = Some(script.into());
        self
    }

    #[must_use]
    pub fn with_wait(mut self, wait: Duration) -> Self {
        self.wait = wait;
        self
    }

    #[must_use]
    pub fn with_scrolldown(mut self, scrolldown: u32) -> Self {
        self.scrolldown = scrolldown;
        self
    }

    #[must_use]
    pub fn with_sleep(mut self, sleep: Duration) -> Self {
        self.sleep = sleep;
        self
    }

    #[must_use]
    pub fn with_reload(mut self, reload: bool) -> Self {
        self.reload = reload;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_keep_page(mut self, keep_page: bool) -> Self {
        self.keep_page = keep_page;
        self
    }

    #[must_use]
    pub fn with_cookies(mut self, cookies: Vec<CookieRecord>) -> Self {
        self.cookies = cookies;
        self
    }

    #[must_use]
    pub fn with_send_cookies_session(mut self, send: bool) -> Self {
        self.send_cookies_session = send;
        self
    }
}

/// Everything one render attempt needs
#[derive(Debug, Clone)]
pub struct RenderJob {
    pub url: String,
    /// Markup injected when not reloading
    pub html: String,
    pub script: Option<String>,
    pub scrolldown: u32,
    pub sleep: Duration,
    pub wait: Duration,
    pub timeout: Duration,
    pub cookies: Vec<CookieRecord>,
    pub reload: bool,
    pub keep_page: bool,
}

impl RenderJob {
    /// Job for `url` with markup `html`, taking the rest from `options`
    ///
    /// Cookies are left to the caller since they may come from the session.
    #[must_use]
    pub fn new(url: impl Into<String>, html: impl Into<String>, options: &RenderOptions) -> Self {
        Self {
            url: url.into(),
            html: html.into(),
            script: options.script.clone(),
            scrolldown: options.scrolldown,
            sleep: options.sleep,
            wait: options.wait,
            timeout: options.timeout,
            cookies: Vec::new(),
            reload: options.reload,
            keep_page: options.keep_page,
        }
    }
}

/// Result of a successful attempt
#[derive(Debug, Clone)]
pub struct RenderOutput {
    pub html: String,
    pub script_result: Option<serde_json::Value>,
    /// Open tab when the job asked to keep it
    pub tab: Option<Arc<dyn BrowserTab>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let opts = RenderOptions::default();
        assert_eq!(opts.retries, 8);
        assert_eq!(opts.wait, Duration::from_millis(200));
        assert_eq!(opts.timeout, Duration::from_secs(8));
        assert!(opts.reload);
        assert!(!opts.keep_page);
        assert!(!opts.send_cookies_session);
        assert!(opts.script.is_none());
    }

    #[test]
    fn job_copies_options() {
        let opts = RenderOptions::default()
            .with_script("() => 1")
            .with_scrolldown(3)
            .with_keep_page(true);
        let job = RenderJob::new("https://example.com/", "<p></p>", &opts);
        assert_eq!(job.script.as_deref(), Some("() => 1"));
        assert_eq!(job.scrolldown, 3);
        assert!(job.keep_page);
        assert!(job.cookies.is_empty());
    }
}
