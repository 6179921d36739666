//! Headless browser abstraction.
//!
//! Sessions talk to the browser through three small traits so the render
//! loop can run against Chromium in production and against in-process
//! fakes in tests:
//!
//! - [`BrowserLauncher`] starts a browser process
//! - [`HeadlessBrowser`] is one running process, shared by all renders of a session
//! - [`BrowserTab`] is one page/tab used by a single render attempt

pub mod chromium;
pub mod manager;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use chromium::ChromiumLauncher;
pub use manager::BrowserManager;

/// Options a browser is launched with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchOptions {
    /// Accept invalid TLS certificates
    pub ignore_https_errors: bool,
    pub headless: bool,
    /// Extra command line arguments
    pub args: Vec<String>,
}

/// Cookie as installed into a browser tab
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CookieRecord {
    pub name: String,
    pub value: String,
    /// Empty for host-only cookies
    pub domain: String,
    pub path: String,
    pub secure: bool,
    pub http_only: bool,
    /// `Strict`, `Lax` or `None`
    pub same_site: Option<String>,
    /// Expiry as unix seconds; `None` for session cookies
    pub expires: Option<f64>,
}

impl CookieRecord {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: String::new(),
            path: "/".to_string(),
            secure: false,
            http_only: false,
            same_site: None,
            expires: None,
        }
    }

    #[must_use]
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }
}

/// Starts headless browser processes
#[async_trait]
pub trait BrowserLauncher: Send + Sync + fmt::Debug {
    async fn launch(&self, options: &LaunchOptions) -> Result<Arc<dyn HeadlessBrowser>>;
}

/// A running browser process
#[async_trait]
pub trait HeadlessBrowser: Send + Sync + fmt::Debug {
    /// Open a blank tab
    async fn new_tab(&self) -> Result<Arc<dyn BrowserTab>>;

    /// Terminate the process and release its resources
    async fn close(&self) -> Result<()>;
}

/// One browser tab
#[async_trait]
pub trait BrowserTab: Send + Sync + fmt::Debug {
    /// Install cookies; `url` is the page the cookies are meant for
    async fn set_cookies(&self, cookies: &[CookieRecord], url: &str) -> Result<()>;

    /// Navigate and wait for the load to finish
    async fn goto(&self, url: &str) -> Result<()>;

    /// Replace the tab's document with in-memory markup
    async fn set_content(&self, html: &str) -> Result<()>;

    /// Run a script, returning its JSON-serializable result if any
    async fn evaluate(&self, script: &str) -> Result<Option<serde_json::Value>>;

    async fn key_down(&self, key: &str) -> Result<()>;

    async fn key_up(&self, key: &str) -> Result<()>;

    /// Serialized markup of the current document
    async fn content(&self) -> Result<String>;

    async fn close(&self) -> Result<()>;
}
