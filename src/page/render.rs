//! Rendering a page through its session's headless browser

use std::sync::Arc;

use encoding_rs::UTF_8;
use tracing::debug;

use super::Page;
use crate::browser::BrowserTab;
use crate::document::{Document, HtmlQuery};
use crate::error::Result;
use crate::render::orchestrator::close_quietly;
use crate::render::{RenderJob, RenderOptions, RenderOutput, render_with_retries};
use crate::session::SessionCore;
use crate::utils::constants::DEFAULT_URL;

impl Page {
    /// Render the page in the session's browser and replace its content
    ///
    /// Returns the script result, if a script was given. Only works for
    /// pages of a blocking [`HtmlSession`](crate::HtmlSession), and not
    /// from inside an async context.
    pub fn render(&mut self, options: RenderOptions) -> Result<Option<serde_json::Value>> {
        let shared = self.session().blocking("render")?;
        let job = self.render_job(&shared.core, &options)?;
        let previous = self.kept_tab.clone();

        let output = shared.block_on(
            "acquire a browser",
            render_in(&shared.core, job, options.retries, previous),
        )??;
        Ok(self.apply(output))
    }

    /// Async counterpart of [`render`](Self::render) for pages of an
    /// [`AsyncHtmlSession`](crate::AsyncHtmlSession)
    pub async fn arender(&mut self, options: RenderOptions) -> Result<Option<serde_json::Value>> {
        let shared = self.session().nonblocking("arender")?;
        let job = self.render_job(&shared.core, &options)?;
        let previous = self.kept_tab.clone();

        let output = render_in(&shared.core, job, options.retries, previous).await?;
        Ok(self.apply(output))
    }

    fn render_job(&self, core: &SessionCore, options: &RenderOptions) -> Result<RenderJob> {
        core.ensure_open()?;

        let mut job = RenderJob::new(self.url(), self.html(), options);
        // Nothing to navigate to for in-memory markup
        if self.url() == DEFAULT_URL {
            job.reload = false;
        }
        job.cookies = if options.send_cookies_session {
            core.cookies_for(self.url())
        } else {
            options.cookies.clone()
        };
        Ok(job)
    }

    fn apply(&mut self, output: RenderOutput) -> Option<serde_json::Value> {
        let document = Document::from_bytes(output.html.into_bytes(), self.url(), Some(UTF_8))
            .with_skip_anchors(self.skip_anchors());
        self.replace_content(document);
        self.kept_tab = output.tab;
        debug!(url = %self.url(), kept_tab = self.kept_tab.is_some(), "Replaced page content with rendered markup");
        output.script_result
    }
}

async fn render_in(
    core: &SessionCore,
    job: RenderJob,
    retries: u32,
    previous: Option<Arc<dyn BrowserTab>>,
) -> Result<RenderOutput> {
    let output = render_with_retries(core.browser(), &job, retries).await?;
    if let Some(tab) = previous {
        close_quietly(&tab).await;
    }
    Ok(output)
}
