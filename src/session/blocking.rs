//! Blocking session

use std::future::Future;
use std::sync::Arc;

use reqwest::Method;
use tokio::runtime::{Builder, Handle, Runtime};
use tracing::warn;

use super::{HtmlResponse, RequestParams, SessionBuilder, SessionConfig, SessionCookieJar, SessionCore, SessionState};
use crate::browser::{BrowserLauncher, HeadlessBrowser};
use crate::error::{HtmlSessionError, Result};
use crate::page::{Page, SessionLink};

/// Session whose calls block the current thread
///
/// Each call drives a private current-thread runtime to completion, so the
/// session must not be used from inside an async context; such calls fail
/// with [`HtmlSessionError::Usage`]. Use
/// [`AsyncHtmlSession`](super::AsyncHtmlSession) there instead.
#[derive(Debug)]
pub struct HtmlSession {
    shared: Arc<BlockingShared>,
}

#[derive(Debug)]
pub(crate) struct BlockingShared {
    pub(crate) core: SessionCore,
    runtime: Option<Runtime>,
}

impl BlockingShared {
    /// Run `future` on the session runtime
    pub(crate) fn block_on<F: Future>(&self, action: &str, future: F) -> Result<F::Output> {
        if Handle::try_current().is_ok() {
            return Err(HtmlSessionError::usage(format!(
                "cannot {action} from within an active event loop; use AsyncHtmlSession"
            )));
        }
        let runtime = self.runtime.as_ref().ok_or(HtmlSessionError::SessionClosed)?;
        Ok(runtime.block_on(future))
    }

    pub(crate) fn request(
        self: &Arc<Self>,
        method: Method,
        url: &str,
        params: RequestParams,
    ) -> Result<HtmlResponse> {
        let link = SessionLink::Blocking(Arc::downgrade(self));
        self.block_on(
            "send a blocking request",
            self.core.execute(method, url, params, link),
        )?
    }
}

impl Drop for BlockingShared {
    fn drop(&mut self) {
        match Handle::try_current() {
            Ok(handle) => {
                if let Some(browser) = self.core.detach_browser() {
                    handle.spawn(close_detached(browser));
                }
            }
            Err(_) => {
                if let Some(runtime) = self.runtime.as_ref()
                    && let Err(e) = runtime.block_on(self.core.close())
                {
                    warn!("Failed to close session on drop: {e}");
                }
            }
        }

        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

pub(crate) async fn close_detached(browser: Arc<dyn HeadlessBrowser>) {
    if let Err(e) = browser.close().await {
        warn!("Failed to close browser of dropped session: {e}");
    }
}

impl HtmlSession {
    /// Session with default settings and the Chromium launcher
    pub fn new() -> Result<Self> {
        SessionBuilder::new().build_blocking()
    }

    pub fn with_config(config: SessionConfig) -> Result<Self> {
        SessionBuilder::new().config(config).build_blocking()
    }

    /// Session rendering through a custom browser launcher
    pub fn with_launcher(config: SessionConfig, launcher: Arc<dyn BrowserLauncher>) -> Result<Self> {
        SessionBuilder::new()
            .config(config)
            .launcher(launcher)
            .build_blocking()
    }

    #[must_use]
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    pub(crate) fn from_core(core: SessionCore) -> Result<Self> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        Ok(Self {
            shared: Arc::new(BlockingShared {
                core,
                runtime: Some(runtime),
            }),
        })
    }

    pub fn get(&self, url: &str) -> Result<HtmlResponse> {
        self.request(Method::GET, url, RequestParams::default())
    }

    pub fn post(&self, url: &str, params: RequestParams) -> Result<HtmlResponse> {
        self.request(Method::POST, url, params)
    }

    pub fn put(&self, url: &str, params: RequestParams) -> Result<HtmlResponse> {
        self.request(Method::PUT, url, params)
    }

    pub fn patch(&self, url: &str, params: RequestParams) -> Result<HtmlResponse> {
        self.request(Method::PATCH, url, params)
    }

    pub fn delete(&self, url: &str) -> Result<HtmlResponse> {
        self.request(Method::DELETE, url, RequestParams::default())
    }

    pub fn head(&self, url: &str) -> Result<HtmlResponse> {
        self.request(Method::HEAD, url, RequestParams::default())
    }

    pub fn request(&self, method: Method, url: &str, params: RequestParams) -> Result<HtmlResponse> {
        self.shared.core.ensure_open()?;
        self.shared.request(method, url, params)
    }

    /// The session's browser, launching it if needed
    pub fn browser(&self) -> Result<Arc<dyn HeadlessBrowser>> {
        self.shared.core.ensure_open()?;
        self.shared
            .block_on("acquire a browser", self.shared.core.browser().acquire())?
    }

    /// Close the browser and the HTTP client
    pub fn close(&self) -> Result<()> {
        self.shared
            .block_on("close the session", self.shared.core.close())?
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.shared.core.state()
    }

    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        self.shared.core.config()
    }

    #[must_use]
    pub fn cookies(&self) -> &SessionCookieJar {
        self.shared.core.cookies()
    }

    /// Page over in-memory markup, renderable through this session
    #[must_use]
    pub fn page_from_html(&self, html: &str, url: Option<&str>) -> Page {
        Page::from_html(html, url).with_session(SessionLink::Blocking(Arc::downgrade(&self.shared)))
    }
}
