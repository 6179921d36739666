//! Test utilities shared by the integration tests
//!
//! `FakeLauncher` hands out in-process browsers whose tabs record every call
//! in a shared `FakeState`, so render and lifecycle behavior can be checked
//! without a real Chromium.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use kodegen_tools_htmlsession::{
    BrowserLauncher, BrowserTab, CookieRecord, HeadlessBrowser, HtmlSessionError, LaunchOptions,
    Result,
};

/// Counters and knobs shared by a launcher, its browsers and their tabs
#[derive(Debug, Default)]
pub struct FakeState {
    pub launches: AtomicU32,
    pub browser_closes: AtomicU32,
    pub tabs_opened: AtomicU32,
    pub tabs_closed: AtomicU32,
    pub gotos: AtomicU32,
    pub set_contents: AtomicU32,
    pub key_downs: AtomicU32,
    pub key_ups: AtomicU32,

    /// Next `n` navigations fail with a transient error
    pub fail_navigations: AtomicU32,
    /// Next `n` content reads return an empty document
    pub empty_contents: AtomicU32,
    /// Navigations never finish
    pub hang_navigation: AtomicBool,
    pub fail_launch: AtomicBool,

    pub last_launch: Mutex<Option<LaunchOptions>>,
    pub installed_cookies: Mutex<Vec<CookieRecord>>,
    pub scripts: Mutex<Vec<String>>,
    /// Markup served by `goto`; `{url}` is replaced with the target
    pub served_html: Mutex<Option<String>>,
}

impl FakeState {
    pub fn count(counter: &AtomicU32) -> u32 {
        counter.load(Ordering::SeqCst)
    }

    /// Consume one unit of a "next n calls" knob
    fn take(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakeLauncher {
    pub state: Arc<FakeState>,
}

impl FakeLauncher {
    pub fn new() -> (Arc<Self>, Arc<FakeState>) {
        let launcher = Arc::new(Self::default());
        let state = Arc::clone(&launcher.state);
        (launcher, state)
    }
}

#[async_trait]
impl BrowserLauncher for FakeLauncher {
    async fn launch(&self, options: &LaunchOptions) -> Result<Arc<dyn HeadlessBrowser>> {
        self.state.launches.fetch_add(1, Ordering::SeqCst);
        *self.state.last_launch.lock() = Some(options.clone());

        if self.state.fail_launch.load(Ordering::SeqCst) {
            return Err(HtmlSessionError::BrowserLaunch(
                "no chromium in test sandbox".to_string(),
            ));
        }
        Ok(Arc::new(FakeBrowser {
            state: Arc::clone(&self.state),
        }))
    }
}

#[derive(Debug)]
pub struct FakeBrowser {
    state: Arc<FakeState>,
}

#[async_trait]
impl HeadlessBrowser for FakeBrowser {
    async fn new_tab(&self) -> Result<Arc<dyn BrowserTab>> {
        self.state.tabs_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(FakeTab {
            state: Arc::clone(&self.state),
            content: Mutex::new(String::new()),
        }))
    }

    async fn close(&self) -> Result<()> {
        self.state.browser_closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Debug)]
pub struct FakeTab {
    state: Arc<FakeState>,
    content: Mutex<String>,
}

impl FakeTab {
    async fn navigate(&self) -> Result<()> {
        if self.state.hang_navigation.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if FakeState::take(&self.state.fail_navigations) {
            return Err(HtmlSessionError::TransientRender(
                "net::ERR_CONNECTION_RESET".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl BrowserTab for FakeTab {
    async fn set_cookies(&self, cookies: &[CookieRecord], _url: &str) -> Result<()> {
        self.state
            .installed_cookies
            .lock()
            .extend(cookies.iter().cloned());
        Ok(())
    }

    async fn goto(&self, url: &str) -> Result<()> {
        self.state.gotos.fetch_add(1, Ordering::SeqCst);
        self.navigate().await?;
        let html = self
            .state
            .served_html
            .lock()
            .clone()
            .unwrap_or_else(|| rendered_page(url));
        *self.content.lock() = html.replace("{url}", url);
        Ok(())
    }

    async fn set_content(&self, html: &str) -> Result<()> {
        self.state.set_contents.fetch_add(1, Ordering::SeqCst);
        self.navigate().await?;
        *self.content.lock() = html.to_string();
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> Result<Option<serde_json::Value>> {
        self.state.scripts.lock().push(script.to_string());
        Ok(Some(serde_json::json!({ "width": 1920, "height": 1080 })))
    }

    async fn key_down(&self, _key: &str) -> Result<()> {
        self.state.key_downs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn key_up(&self, _key: &str) -> Result<()> {
        self.state.key_ups.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn content(&self) -> Result<String> {
        if FakeState::take(&self.state.empty_contents) {
            return Ok(String::new());
        }
        Ok(self.content.lock().clone())
    }

    async fn close(&self) -> Result<()> {
        self.state.tabs_closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// What a JavaScript-heavy page looks like once its scripts ran
pub fn rendered_page(url: &str) -> String {
    format!(
        r#"<html><head><title>Rendered</title></head><body>
        <div id="app"><p class="loaded">Loaded by script</p>
        <a href="/docs/">Docs</a><a href="{url}#top">Top</a></div>
        </body></html>"#
    )
}

/// Installs a subscriber so `RUST_LOG=debug cargo test` shows library logs
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
