//! A single render attempt

use std::sync::Arc;

use tokio::time::{sleep, timeout};
use tracing::{debug, trace, warn};

use super::{RenderJob, RenderOutput};
use crate::browser::{BrowserTab, HeadlessBrowser};
use crate::error::{HtmlSessionError, Result};

const SCROLL_KEY: &str = "PageDown";

/// Open a tab, load the job's page into it and read back the markup
///
/// The tab is closed on every failure path. Navigation that exceeds the
/// job's timeout fails with [`HtmlSessionError::RenderTimeout`]; any other
/// failure is reported as [`HtmlSessionError::TransientRender`].
pub async fn run_attempt(browser: &dyn HeadlessBrowser, job: &RenderJob) -> Result<RenderOutput> {
    let tab = browser.new_tab().await.map_err(into_transient)?;

    match drive(tab.as_ref(), job).await {
        Ok((html, script_result)) => {
            let tab = if job.keep_page {
                Some(tab)
            } else {
                close_quietly(&tab).await;
                None
            };
            Ok(RenderOutput {
                html,
                script_result,
                tab,
            })
        }
        Err(e) => {
            close_quietly(&tab).await;
            Err(into_transient(e))
        }
    }
}

async fn drive(
    tab: &dyn BrowserTab,
    job: &RenderJob,
) -> Result<(String, Option<serde_json::Value>)> {
    if !job.wait.is_zero() {
        sleep(job.wait).await;
    }

    if !job.cookies.is_empty() {
        debug!(count = job.cookies.len(), url = %job.url, "Installing cookies");
        tab.set_cookies(&job.cookies, &job.url).await?;
    }

    let navigation = async {
        if job.reload {
            tab.goto(&job.url).await
        } else {
            tab.set_content(&job.html).await
        }
    };
    match timeout(job.timeout, navigation).await {
        Ok(result) => result?,
        Err(_) => {
            warn!(url = %job.url, timeout = ?job.timeout, "Render navigation timed out");
            return Err(HtmlSessionError::RenderTimeout {
                timeout: job.timeout,
            });
        }
    }

    let script_result = match job.script.as_deref() {
        Some(script) => tab.evaluate(script).await?,
        None => None,
    };

    if job.scrolldown > 0 {
        for _ in 0..job.scrolldown {
            tab.key_down(SCROLL_KEY).await?;
            sleep(job.sleep).await;
        }
        tab.key_up(SCROLL_KEY).await?;
    } else if !job.sleep.is_zero() {
        sleep(job.sleep).await;
    }

    let html = tab.content().await?;
    trace!(url = %job.url, bytes = html.len(), "Extracted rendered markup");
    Ok((html, script_result))
}

/// Timeouts pass through; everything else becomes retryable
fn into_transient(error: HtmlSessionError) -> HtmlSessionError {
    match error {
        e @ (HtmlSessionError::RenderTimeout { .. } | HtmlSessionError::TransientRender(_)) => e,
        other => HtmlSessionError::TransientRender(other.to_string()),
    }
}

pub(crate) async fn close_quietly(tab: &Arc<dyn BrowserTab>) {
    if let Err(e) = tab.close().await {
        debug!("Failed to close tab: {e}");
    }
}
