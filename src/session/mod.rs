//! HTTP sessions.
//!
//! [`HtmlSession`] blocks on a private single-threaded runtime;
//! [`AsyncHtmlSession`] dispatches requests to a bounded pool of tokio
//! tasks. Both wrap one [`SessionCore`] that owns the HTTP client, the
//! cookie jar and the session's browser.

pub mod blocking;
pub mod cookies;
pub mod nonblocking;
pub mod response;
pub mod user_agent;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::RwLock;
use reqwest::Method;
use reqwest::header::USER_AGENT;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use crate::browser::{BrowserLauncher, BrowserManager, ChromiumLauncher, CookieRecord, LaunchOptions};
use crate::error::{HtmlSessionError, Result};
use crate::page::SessionLink;
use crate::utils::constants::{DEFAULT_BROWSER_ARGS, WORKERS_PER_CORE};

pub use blocking::HtmlSession;
pub use cookies::SessionCookieJar;
pub use nonblocking::AsyncHtmlSession;
pub use response::{HtmlResponse, RequestParams};
pub use user_agent::{RotatingUserAgent, StaticUserAgent, UserAgentProvider};

/// Session settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Send a browser user agent with every request
    pub(crate) mock_browser: bool,
    /// Verify TLS certificates, over HTTP and in the browser
    pub(crate) verify: bool,
    /// Extra arguments for the headless browser
    pub(crate) browser_args: Vec<String>,
    /// Worker pool size for async sessions; defaults to five per core
    pub(crate) workers: Option<usize>,
    pub(crate) request_timeout: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            mock_browser: true,
            verify: true,
            browser_args: DEFAULT_BROWSER_ARGS.iter().map(|a| (*a).to_string()).collect(),
            workers: None,
            request_timeout: None,
        }
    }
}

impl SessionConfig {
    #[must_use]
    pub fn with_mock_browser(mut self, mock_browser: bool) -> Self {
        self.mock_browser = mock_browser;
        self
    }

    #[must_use]
    pub fn with_verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    #[must_use]
    pub fn with_browser_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.browser_args = args.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers.max(1));
        self
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn mock_browser(&self) -> bool {
        self.mock_browser
    }

    #[must_use]
    pub fn verify(&self) -> bool {
        self.verify
    }

    #[must_use]
    pub fn browser_args(&self) -> &[String] {
        &self.browser_args
    }

    /// Configured pool size, or five workers per core
    #[must_use]
    pub fn workers(&self) -> usize {
        self.workers
            .unwrap_or_else(|| num_cpus::get() * WORKERS_PER_CORE)
            .max(1)
    }

    #[must_use]
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout
    }

    /// Options the session's browser is launched with
    #[must_use]
    pub fn launch_options(&self) -> LaunchOptions {
        LaunchOptions {
            ignore_https_errors: !self.verify,
            headless: true,
            args: self.browser_args.clone(),
        }
    }
}

/// Session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    BrowserAbsent,
    BrowserActive,
    Closed,
}

/// Builder shared by both session kinds
#[derive(Debug, Default)]
pub struct SessionBuilder {
    config: SessionConfig,
    launcher: Option<Arc<dyn BrowserLauncher>>,
    user_agent: Option<Arc<dyn UserAgentProvider>>,
}

impl SessionBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Browser launcher used for renders; Chromium when unset
    #[must_use]
    pub fn launcher(mut self, launcher: Arc<dyn BrowserLauncher>) -> Self {
        self.launcher = Some(launcher);
        self
    }

    #[must_use]
    pub fn user_agent(mut self, provider: Arc<dyn UserAgentProvider>) -> Self {
        self.user_agent = Some(provider);
        self
    }

    pub fn build_blocking(self) -> Result<HtmlSession> {
        HtmlSession::from_core(self.into_core()?)
    }

    pub fn build_async(self) -> Result<AsyncHtmlSession> {
        Ok(AsyncHtmlSession::from_core(self.into_core()?))
    }

    fn into_core(self) -> Result<SessionCore> {
        let launcher = self
            .launcher
            .unwrap_or_else(|| Arc::new(ChromiumLauncher::new()));
        let user_agent = self
            .user_agent
            .unwrap_or_else(|| Arc::new(StaticUserAgent::default()));
        SessionCore::new(self.config, launcher, user_agent)
    }
}

/// State shared by both session kinds
#[derive(Debug)]
pub(crate) struct SessionCore {
    config: SessionConfig,
    client: RwLock<Option<reqwest::Client>>,
    cookies: Arc<SessionCookieJar>,
    browser: BrowserManager,
    user_agent: Arc<dyn UserAgentProvider>,
    closed: AtomicBool,
}

impl SessionCore {
    pub(crate) fn new(
        config: SessionConfig,
        launcher: Arc<dyn BrowserLauncher>,
        user_agent: Arc<dyn UserAgentProvider>,
    ) -> Result<Self> {
        let cookies = Arc::new(SessionCookieJar::new());

        let mut builder = reqwest::Client::builder()
            .cookie_provider(Arc::clone(&cookies))
            .danger_accept_invalid_certs(!config.verify)
            .gzip(true)
            .brotli(true);
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        let browser = BrowserManager::new(launcher, config.launch_options());

        Ok(Self {
            config,
            client: RwLock::new(Some(client)),
            cookies,
            browser,
            user_agent,
            closed: AtomicBool::new(false),
        })
    }

    pub(crate) fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub(crate) fn cookies(&self) -> &SessionCookieJar {
        &self.cookies
    }

    pub(crate) fn browser(&self) -> &BrowserManager {
        &self.browser
    }

    pub(crate) fn state(&self) -> SessionState {
        if self.closed.load(Ordering::Acquire) {
            SessionState::Closed
        } else if self.browser.is_active() {
            SessionState::BrowserActive
        } else {
            SessionState::BrowserAbsent
        }
    }

    pub(crate) fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(HtmlSessionError::SessionClosed);
        }
        Ok(())
    }

    /// Session cookies that apply to `url`, shaped for a browser
    pub(crate) fn cookies_for(&self, url: &str) -> Vec<CookieRecord> {
        match Url::parse(url) {
            Ok(url) => self.cookies.records_for(&url),
            Err(e) => {
                debug!("Not sending session cookies to unparsable URL {url}: {e}");
                Vec::new()
            }
        }
    }

    /// Send one request and wrap the response
    pub(crate) async fn execute(
        &self,
        method: Method,
        url: &str,
        params: RequestParams,
        link: SessionLink,
    ) -> Result<HtmlResponse> {
        let client = self
            .client
            .read()
            .clone()
            .ok_or(HtmlSessionError::SessionClosed)?;
        let target = Url::parse(url)?;

        let mut request = client.request(method.clone(), target);
        if !params.query.is_empty() {
            request = request.query(&params.query);
        }
        if self.config.mock_browser && !params.headers.contains_key(USER_AGENT) {
            request = request.header(USER_AGENT, self.user_agent.user_agent());
        }
        request = request.headers(params.headers);
        if let Some(form) = params.form.as_ref() {
            request = request.form(form);
        }
        if let Some(json) = params.json.as_ref() {
            request = request.json(json);
        }
        if let Some(body) = params.body {
            request = request.body(body);
        }
        if let Some(timeout) = params.timeout {
            request = request.timeout(timeout);
        }

        debug!(%method, url, "Sending request");
        let response = request.send().await?;

        let status = response.status();
        let headers = response.headers().clone();
        let final_url = response.url().to_string();
        let content = response.bytes().await?.to_vec();
        debug!(%method, url = %final_url, status = status.as_u16(), bytes = content.len(), "Received response");

        Ok(HtmlResponse::new(status, headers, final_url, content, link))
    }

    /// Release the browser and the HTTP client
    ///
    /// Safe to call multiple times (subsequent calls are no-ops).
    pub(crate) async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        info!("Closing session");
        self.client.write().take();
        self.browser.release().await
    }

    /// Mark closed and hand the browser out for teardown elsewhere
    pub(crate) fn detach_browser(&self) -> Option<Arc<dyn crate::browser::HeadlessBrowser>> {
        self.closed.store(true, Ordering::Release);
        self.client.write().take();
        self.browser.detach()
    }
}
