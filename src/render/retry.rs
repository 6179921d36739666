//! Sequential retry loop around [`run_attempt`](super::run_attempt)

use tracing::{error, info, warn};

use super::orchestrator::{close_quietly, run_attempt};
use super::{RenderJob, RenderOutput};
use crate::browser::BrowserManager;
use crate::error::{HtmlSessionError, Result};

/// Render `job` with up to `retries` attempts
///
/// The browser is acquired once up front; a launch failure is returned
/// immediately. Attempts stop at the first one that yields non-empty
/// markup. A navigation timeout ends the loop at once. Transient failures
/// and empty results are logged and counted.
pub async fn render_with_retries(
    manager: &BrowserManager,
    job: &RenderJob,
    retries: u32,
) -> Result<RenderOutput> {
    let browser = manager.acquire().await?;

    for attempt in 1..=retries {
        match run_attempt(browser.as_ref(), job).await {
            Ok(output) if !output.html.is_empty() => {
                info!(url = %job.url, attempt, "Rendered page");
                return Ok(output);
            }
            Ok(output) => {
                warn!(url = %job.url, attempt, "Render produced no content");
                if let Some(tab) = output.tab.as_ref() {
                    close_quietly(tab).await;
                }
            }
            Err(e @ HtmlSessionError::RenderTimeout { .. }) => return Err(e),
            Err(e) => {
                error!(url = %job.url, attempt, retries, "Render attempt failed: {e}");
            }
        }
    }

    Err(HtmlSessionError::MaxRetriesExceeded { attempts: retries })
}
