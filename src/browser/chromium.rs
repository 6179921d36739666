//! Chromium implementation of the browser traits on top of chromiumoxide.
//!
//! Finds a local Chrome/Chromium (or downloads a managed one), launches it
//! with a throwaway profile directory, and drives tabs over CDP.

use std::path::PathBuf;
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfigBuilder, HeadlessMode};
use chromiumoxide::cdp::browser_protocol::input::{DispatchKeyEventParams, DispatchKeyEventType};
use chromiumoxide::cdp::browser_protocol::network::{CookieParam, CookieSameSite, TimeSinceEpoch};
use chromiumoxide::fetcher::{BrowserFetcher, BrowserFetcherOptions};
use chromiumoxide::page::Page as CdpPage;
use futures::StreamExt;
use parking_lot::Mutex as SyncMutex;
use tokio::sync::Mutex;
use tokio::task::{self, JoinHandle};
use tracing::{debug, error, info, trace, warn};

use super::{BrowserLauncher, BrowserTab, CookieRecord, HeadlessBrowser, LaunchOptions};
use crate::error::{HtmlSessionError, Result};

/// CDP request budget for individual protocol commands
const CDP_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Launches Chrome/Chromium through chromiumoxide
#[derive(Debug, Clone, Default)]
pub struct ChromiumLauncher {
    executable: Option<PathBuf>,
}

impl ChromiumLauncher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific executable instead of searching for one
    #[must_use]
    pub fn with_executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.executable = Some(path.into());
        self
    }
}

#[async_trait]
impl BrowserLauncher for ChromiumLauncher {
    async fn launch(&self, options: &LaunchOptions) -> Result<Arc<dyn HeadlessBrowser>> {
        let browser = launch_chromium(self.executable.clone(), options)
            .await
            .map_err(|e| HtmlSessionError::BrowserLaunch(format!("{e:#}")))?;
        Ok(Arc::new(browser))
    }
}

/// Find Chrome/Chromium executable on the system with platform-specific search paths.
pub fn find_browser_executable() -> anyhow::Result<PathBuf> {
    // Environment variable overrides every other method
    if let Ok(path) = std::env::var("CHROMIUM_PATH") {
        let path = PathBuf::from(path);
        if path.exists() {
            info!(
                "Using browser from CHROMIUM_PATH environment variable: {}",
                path.display()
            );
            return Ok(path);
        }
        warn!(
            "CHROMIUM_PATH environment variable points to non-existent file: {}",
            path.display()
        );
    }

    let candidates: &[&str] = if cfg!(target_os = "windows") {
        &[
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files\Chromium\Application\chrome.exe",
        ]
    } else if cfg!(target_os = "macos") {
        &[
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
            "~/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "~/Applications/Chromium.app/Contents/MacOS/Chromium",
            "/opt/homebrew/bin/chromium",
        ]
    } else {
        &[
            "/usr/bin/google-chrome",
            "/usr/bin/google-chrome-stable",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/snap/bin/chromium",
            "/usr/local/bin/chromium",
            "/opt/google/chrome/chrome",
        ]
    };

    for candidate in candidates {
        let path = match candidate.strip_prefix("~/") {
            Some(rest) => match dirs::home_dir() {
                Some(home) => home.join(rest),
                None => continue,
            },
            None => PathBuf::from(candidate),
        };

        if path.exists() {
            info!("Found browser at: {}", path.display());
            return Ok(path);
        }
    }

    if !cfg!(target_os = "windows") {
        for cmd in ["chromium", "chromium-browser", "google-chrome", "chrome"] {
            if let Ok(output) = Command::new("which").arg(cmd).output()
                && output.status.success()
            {
                let found = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if !found.is_empty() {
                    info!("Found browser using 'which' command: {found}");
                    return Ok(PathBuf::from(found));
                }
            }
        }
    }

    warn!("No Chrome/Chromium executable found. Will download and use fetcher.");
    Err(anyhow!("Chrome/Chromium executable not found"))
}

/// Download a managed Chromium into the user cache directory
pub async fn download_managed_browser() -> anyhow::Result<PathBuf> {
    info!("Downloading managed Chromium browser...");

    let cache_dir = dirs::cache_dir()
        .unwrap_or_else(|| {
            let fallback = std::env::temp_dir();
            warn!(
                "Could not determine cache directory, using temp directory fallback: {}",
                fallback.display()
            );
            fallback
        })
        .join("kodegen_htmlsession")
        .join("chromium");

    std::fs::create_dir_all(&cache_dir).context("Failed to create cache directory")?;

    let fetcher = BrowserFetcher::new(
        BrowserFetcherOptions::builder()
            .with_path(&cache_dir)
            .build()
            .context("Failed to build fetcher options")?,
    );
    let revision_info = fetcher.fetch().await.context("Failed to fetch browser")?;

    info!(
        "Downloaded Chromium to: {}",
        revision_info.folder_path.display()
    );
    Ok(revision_info.executable_path)
}

async fn launch_chromium(
    executable: Option<PathBuf>,
    options: &LaunchOptions,
) -> anyhow::Result<ChromiumBrowser> {
    let chrome_path = match executable {
        Some(path) => path,
        None => match find_browser_executable() {
            Ok(path) => path,
            Err(_) => download_managed_browser().await?,
        },
    };

    // Unique per launch so concurrent sessions never share a profile lock
    let user_data_dir = std::env::temp_dir().join(format!(
        "kodegen_htmlsession_{}_{}",
        std::process::id(),
        uuid::Uuid::new_v4().simple()
    ));
    std::fs::create_dir_all(&user_data_dir).context("Failed to create user data directory")?;

    let mut config_builder = BrowserConfigBuilder::default()
        .request_timeout(CDP_REQUEST_TIMEOUT)
        .window_size(1920, 1080)
        .user_data_dir(user_data_dir.clone())
        .chrome_executable(chrome_path);

    config_builder = if options.headless {
        config_builder.headless_mode(HeadlessMode::default())
    } else {
        config_builder.with_head()
    };

    if options.ignore_https_errors {
        config_builder = config_builder.arg("--ignore-certificate-errors");
    } else {
        config_builder = config_builder.respect_https_errors();
    }

    config_builder = config_builder
        .arg("--no-first-run")
        .arg("--no-default-browser-check")
        .arg("--disable-extensions")
        .arg("--disable-popup-blocking")
        .arg("--hide-scrollbars")
        .arg("--mute-audio");
    for arg in &options.args {
        config_builder = config_builder.arg(arg.as_str());
    }

    let browser_config = config_builder
        .build()
        .map_err(|e| anyhow!("Failed to build browser config: {e}"))?;

    debug!("Launching browser with config: {:?}", browser_config);
    let (browser, mut handler) = Browser::launch(browser_config)
        .await
        .context("Failed to launch browser")?;

    let handler_task = task::spawn(async move {
        while let Some(event) = handler.next().await {
            if let Err(e) = event {
                let message = e.to_string();
                // chromiumoxide cannot decode every CDP event Chrome emits
                let benign = message.contains("data did not match any variant of untagged enum Message")
                    || message.contains("Failed to deserialize WS response");
                if benign {
                    trace!("Suppressed benign CDP serialization error: {message}");
                } else {
                    error!("Browser handler error: {:?}", e);
                }
            }
        }
        info!("Browser handler task completed");
    });

    Ok(ChromiumBrowser {
        browser: Mutex::new(browser),
        handler: handler_task,
        user_data_dir: SyncMutex::new(Some(user_data_dir)),
    })
}

/// Running Chromium process plus its CDP event loop
///
/// The handler task is aborted and the profile directory removed on
/// `close()`, or in `Drop` when `close()` was never called.
pub struct ChromiumBrowser {
    browser: Mutex<Browser>,
    handler: JoinHandle<()>,
    user_data_dir: SyncMutex<Option<PathBuf>>,
}

impl std::fmt::Debug for ChromiumBrowser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChromiumBrowser")
            .field("user_data_dir", &*self.user_data_dir.lock())
            .finish_non_exhaustive()
    }
}

impl ChromiumBrowser {
    /// Remove the profile directory
    ///
    /// Must run after the process exited; Windows refuses to delete files
    /// Chrome still holds open.
    fn cleanup_temp_dir(&self) {
        if let Some(path) = self.user_data_dir.lock().take() {
            debug!("Cleaning up temp directory: {}", path.display());
            if let Err(e) = std::fs::remove_dir_all(&path) {
                warn!(
                    "Failed to clean up temp directory {}: {e}. Manual cleanup may be required.",
                    path.display()
                );
            }
        }
    }
}

#[async_trait]
impl HeadlessBrowser for ChromiumBrowser {
    async fn new_tab(&self) -> Result<Arc<dyn BrowserTab>> {
        let page = self
            .browser
            .lock()
            .await
            .new_page("about:blank")
            .await
            .map_err(cdp_error("open tab"))?;
        Ok(Arc::new(ChromiumTab { page }))
    }

    async fn close(&self) -> Result<()> {
        let mut browser = self.browser.lock().await;

        if let Err(e) = browser.close().await {
            warn!("Failed to close browser cleanly: {e}");
        }
        if let Err(e) = browser.wait().await {
            warn!("Failed to wait for browser exit: {e}");
        }
        drop(browser);

        self.handler.abort();
        self.cleanup_temp_dir();
        Ok(())
    }
}

impl Drop for ChromiumBrowser {
    fn drop(&mut self) {
        self.handler.abort();
        // chromiumoxide kills the child process when `Browser` drops
        if self.user_data_dir.lock().is_some() {
            warn!("ChromiumBrowser dropped without close() - removing temp dir in Drop");
            self.cleanup_temp_dir();
        }
    }
}

/// One CDP page
#[derive(Debug)]
pub struct ChromiumTab {
    page: CdpPage,
}

#[async_trait]
impl BrowserTab for ChromiumTab {
    async fn set_cookies(&self, cookies: &[CookieRecord], url: &str) -> Result<()> {
        let params = cookies
            .iter()
            .map(|cookie| cookie_param(cookie, url))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| HtmlSessionError::TransientRender(format!("Invalid cookie: {e}")))?;

        self.page
            .set_cookies(params)
            .await
            .map_err(cdp_error("set cookies"))?;
        Ok(())
    }

    async fn goto(&self, url: &str) -> Result<()> {
        self.page.goto(url).await.map_err(cdp_error("navigate"))?;
        Ok(())
    }

    async fn set_content(&self, html: &str) -> Result<()> {
        self.page
            .set_content(html)
            .await
            .map_err(cdp_error("set content"))?;
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> Result<Option<serde_json::Value>> {
        let result = if is_function_source(script) {
            self.page.evaluate_function(script).await
        } else {
            self.page.evaluate_expression(script).await
        }
        .map_err(cdp_error("evaluate script"))?;

        Ok(result.value().cloned())
    }

    async fn key_down(&self, key: &str) -> Result<()> {
        self.dispatch_key(DispatchKeyEventType::KeyDown, key).await
    }

    async fn key_up(&self, key: &str) -> Result<()> {
        self.dispatch_key(DispatchKeyEventType::KeyUp, key).await
    }

    async fn content(&self) -> Result<String> {
        self.page.content().await.map_err(cdp_error("read content"))
    }

    async fn close(&self) -> Result<()> {
        self.page
            .clone()
            .close()
            .await
            .map_err(cdp_error("close tab"))
    }
}

impl ChromiumTab {
    async fn dispatch_key(&self, kind: DispatchKeyEventType, key: &str) -> Result<()> {
        let mut builder = DispatchKeyEventParams::builder()
            .r#type(kind)
            .key(key)
            .code(key);
        if let Some(code) = virtual_key_code(key) {
            builder = builder
                .windows_virtual_key_code(code)
                .native_virtual_key_code(code);
        }
        let params = builder
            .build()
            .map_err(|e| HtmlSessionError::TransientRender(format!("Invalid key event: {e}")))?;

        self.page
            .execute(params)
            .await
            .map_err(cdp_error("dispatch key event"))?;
        Ok(())
    }
}

fn virtual_key_code(key: &str) -> Option<i64> {
    match key {
        "PageUp" => Some(33),
        "PageDown" => Some(34),
        "End" => Some(35),
        "Home" => Some(36),
        "ArrowUp" => Some(38),
        "ArrowDown" => Some(40),
        _ => None,
    }
}

/// Function sources are called, anything else is evaluated as an expression
fn is_function_source(script: &str) -> bool {
    let script = script.trim_start();
    script.starts_with("function")
        || script.starts_with("async ")
        || (script.starts_with('(') && script.contains("=>"))
}

fn cookie_param(cookie: &CookieRecord, url: &str) -> std::result::Result<CookieParam, String> {
    let mut builder = CookieParam::builder()
        .name(cookie.name.clone())
        .value(cookie.value.clone())
        .url(url)
        .path(cookie.path.clone())
        .secure(cookie.secure)
        .http_only(cookie.http_only);

    if !cookie.domain.is_empty() {
        builder = builder.domain(cookie.domain.clone());
    }
    if let Some(expires) = cookie.expires {
        builder = builder.expires(TimeSinceEpoch::new(expires));
    }
    if let Some(same_site) = cookie.same_site.as_deref() {
        let same_site = match same_site.to_ascii_lowercase().as_str() {
            "strict" => Some(CookieSameSite::Strict),
            "lax" => Some(CookieSameSite::Lax),
            "none" => Some(CookieSameSite::None),
            _ => None,
        };
        if let Some(same_site) = same_site {
            builder = builder.same_site(same_site);
        }
    }

    builder.build()
}

/// CDP failures are always worth another attempt
fn cdp_error(action: &'static str) -> impl Fn(chromiumoxide::error::CdpError) -> HtmlSessionError {
    move |e| HtmlSessionError::TransientRender(format!("Failed to {action}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_function_sources() {
        assert!(is_function_source("() => document.title"));
        assert!(is_function_source("  function() { return 1; }"));
        assert!(is_function_source("async () => 1"));
        assert!(!is_function_source("document.title"));
    }

    #[test]
    fn page_down_has_key_code() {
        assert_eq!(virtual_key_code("PageDown"), Some(34));
        assert_eq!(virtual_key_code("Enter"), None);
    }

    #[test]
    fn cookie_param_carries_fields() {
        let mut record = CookieRecord::new("session", "abc").with_domain("example.com");
        record.secure = true;
        record.same_site = Some("Lax".to_string());
        record.expires = Some(1_900_000_000.0);

        let param = cookie_param(&record, "https://example.com/").unwrap();
        assert_eq!(param.name, "session");
        assert_eq!(param.value, "abc");
        assert_eq!(param.domain.as_deref(), Some("example.com"));
        assert_eq!(param.secure, Some(true));
        assert_eq!(param.same_site, Some(CookieSameSite::Lax));
    }

    #[tokio::test]
    #[ignore] // Requires a local Chrome/Chromium
    async fn launches_and_renders_inline_content() {
        let launcher = ChromiumLauncher::new();
        let browser = launcher
            .launch(&LaunchOptions {
                ignore_https_errors: false,
                headless: true,
                args: vec!["--no-sandbox".to_string()],
            })
            .await
            .unwrap();

        let tab = browser.new_tab().await.unwrap();
        tab.set_content("<p id='x'>hi</p><script>document.getElementById('x').textContent = 'rendered'</script>")
            .await
            .unwrap();
        let html = tab.content().await.unwrap();
        assert!(html.contains("rendered"));

        tab.close().await.unwrap();
        browser.close().await.unwrap();
    }
}
