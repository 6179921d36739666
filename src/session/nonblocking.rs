//! Async session with a bounded request pool

use std::future::Future;
use std::sync::Arc;

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use reqwest::Method;
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::blocking::close_detached;
use super::{HtmlResponse, RequestParams, SessionBuilder, SessionConfig, SessionCookieJar, SessionCore, SessionState};
use crate::browser::{BrowserLauncher, HeadlessBrowser};
use crate::error::{HtmlSessionError, Result};
use crate::page::{Page, SessionLink};

/// Session for use inside a tokio runtime
///
/// Requests run as spawned tasks, at most `workers` at a time, so slow
/// transfers never stall the caller's task.
#[derive(Debug)]
pub struct AsyncHtmlSession {
    shared: Arc<AsyncShared>,
}

#[derive(Debug)]
pub(crate) struct AsyncShared {
    pub(crate) core: Arc<SessionCore>,
    pool: Arc<Semaphore>,
    workers: usize,
}

impl AsyncShared {
    /// Run one request on the worker pool
    pub(crate) async fn dispatch(
        self: &Arc<Self>,
        method: Method,
        url: &str,
        params: RequestParams,
    ) -> Result<HtmlResponse> {
        self.core.ensure_open()?;

        let permit = Arc::clone(&self.pool)
            .acquire_owned()
            .await
            .map_err(|e| HtmlSessionError::Other(format!("Worker pool closed: {e}")))?;

        let core = Arc::clone(&self.core);
        let link = SessionLink::Async(Arc::downgrade(self));
        let url = url.to_string();

        let mut task = AbortOnDrop(tokio::spawn(async move {
            let _permit = permit; // Hold until the request completes
            core.execute(method, &url, params, link).await
        }));

        (&mut task.0)
            .await
            .map_err(|e| HtmlSessionError::Other(format!("Request task failed: {e}")))?
    }
}

/// Aborts the spawned request, freeing its worker slot, when the caller
/// stops waiting for it
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

impl Drop for AsyncShared {
    fn drop(&mut self) {
        let Some(browser) = self.core.detach_browser() else {
            return;
        };
        match Handle::try_current() {
            Ok(handle) => {
                handle.spawn(close_detached(browser));
            }
            Err(_) => {
                warn!("Async session dropped outside a runtime; browser closed without awaiting");
                drop(browser);
            }
        }
    }
}

impl AsyncHtmlSession {
    /// Session with default settings and the Chromium launcher
    pub fn new() -> Result<Self> {
        SessionBuilder::new().build_async()
    }

    pub fn with_config(config: SessionConfig) -> Result<Self> {
        SessionBuilder::new().config(config).build_async()
    }

    /// Session rendering through a custom browser launcher
    pub fn with_launcher(config: SessionConfig, launcher: Arc<dyn BrowserLauncher>) -> Result<Self> {
        SessionBuilder::new()
            .config(config)
            .launcher(launcher)
            .build_async()
    }

    #[must_use]
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    pub(crate) fn from_core(core: SessionCore) -> Self {
        let workers = core.config().workers();
        debug!(workers, "Creating async session");
        Self {
            shared: Arc::new(AsyncShared {
                core: Arc::new(core),
                pool: Arc::new(Semaphore::new(workers)),
                workers,
            }),
        }
    }

    pub async fn get(&self, url: &str) -> Result<HtmlResponse> {
        self.request(Method::GET, url, RequestParams::default()).await
    }

    pub async fn post(&self, url: &str, params: RequestParams) -> Result<HtmlResponse> {
        self.request(Method::POST, url, params).await
    }

    pub async fn put(&self, url: &str, params: RequestParams) -> Result<HtmlResponse> {
        self.request(Method::PUT, url, params).await
    }

    pub async fn patch(&self, url: &str, params: RequestParams) -> Result<HtmlResponse> {
        self.request(Method::PATCH, url, params).await
    }

    pub async fn delete(&self, url: &str) -> Result<HtmlResponse> {
        self.request(Method::DELETE, url, RequestParams::default()).await
    }

    pub async fn head(&self, url: &str) -> Result<HtmlResponse> {
        self.request(Method::HEAD, url, RequestParams::default()).await
    }

    pub async fn request(&self, method: Method, url: &str, params: RequestParams) -> Result<HtmlResponse> {
        self.shared.dispatch(method, url, params).await
    }

    /// Drive every future concurrently, returning results as they complete
    ///
    /// Output order is completion order, not input order.
    pub async fn run<I, F, T>(&self, tasks: I) -> Vec<T>
    where
        I: IntoIterator<Item = F>,
        F: Future<Output = T>,
    {
        let mut pending: FuturesUnordered<F> = tasks.into_iter().collect();
        let mut results = Vec::with_capacity(pending.len());
        while let Some(result) = pending.next().await {
            results.push(result);
        }
        results
    }

    /// The session's browser, launching it if needed
    pub async fn browser(&self) -> Result<Arc<dyn HeadlessBrowser>> {
        self.shared.core.ensure_open()?;
        self.shared.core.browser().acquire().await
    }

    /// Close the browser and the HTTP client
    pub async fn close(&self) -> Result<()> {
        self.shared.core.close().await
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

    /// Size of the request pool
    #[must_use]
    pub fn workers(&self) -> usize {
        self.shared.workers
    }

    /// Page over in-memory markup, renderable through this session
    #[must_use]
    pub fn page_from_html(&self, html: &str, url: Option<&str>) -> Page {
        Page::from_html(html, url).with_session(SessionLink::Async(Arc::downgrade(&self.shared)))
    }
}
