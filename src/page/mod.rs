//! Pages: documents bound to the session that produced them.
//!
//! A page holds only a weak reference to its session. It can render itself
//! through the session's browser and follow "next page" links through the
//! session's transport, but never keeps a closed session alive.

pub mod next;
pub mod render;

use std::sync::{Arc, Weak};

use encoding_rs::Encoding;
use reqwest::Method;

use crate::browser::BrowserTab;
use crate::document::{Document, HtmlQuery};
use crate::error::{HtmlSessionError, Result};
use crate::session::RequestParams;
use crate::session::blocking::BlockingShared;
use crate::session::nonblocking::AsyncShared;
use crate::utils::constants::{DEFAULT_NEXT_MARKERS, DEFAULT_URL};

pub use next::{NextPage, Pages};

/// Non-owning link from a page back to its session
#[derive(Debug, Clone, Default)]
pub(crate) enum SessionLink {
    /// Not produced by a session
    #[default]
    Detached,
    Blocking(Weak<BlockingShared>),
    Async(Weak<AsyncShared>),
}

impl SessionLink {
    pub(crate) fn blocking(&self, operation: &str) -> Result<Arc<BlockingShared>> {
        match self {
            SessionLink::Blocking(weak) => weak.upgrade().ok_or(HtmlSessionError::SessionClosed),
            SessionLink::Async(_) => Err(HtmlSessionError::usage(format!(
                "page belongs to an AsyncHtmlSession; use the async variant of {operation}"
            ))),
            SessionLink::Detached => Err(detached(operation)),
        }
    }

    pub(crate) fn nonblocking(&self, operation: &str) -> Result<Arc<AsyncShared>> {
        match self {
            SessionLink::Async(weak) => weak.upgrade().ok_or(HtmlSessionError::SessionClosed),
            SessionLink::Blocking(_) => Err(HtmlSessionError::usage(format!(
                "page belongs to a blocking HtmlSession; use the blocking variant of {operation}"
            ))),
            SessionLink::Detached => Err(detached(operation)),
        }
    }

    /// GET `url` through the blocking session
    pub(crate) fn fetch_blocking(&self, url: &str) -> Result<Page> {
        let shared = self.blocking("next")?;
        shared.core.ensure_open()?;
        Ok(shared
            .request(Method::GET, url, RequestParams::default())?
            .into_page())
    }

    /// GET `url` through the async session
    pub(crate) async fn fetch_async(&self, url: &str) -> Result<Page> {
        let shared = self.nonblocking("next")?;
        Ok(shared
            .dispatch(Method::GET, url, RequestParams::default())
            .await?
            .into_page())
    }
}

fn detached(operation: &str) -> HtmlSessionError {
    HtmlSessionError::usage(format!(
        "{operation} needs a session; create the page through a session's page_from_html"
    ))
}

/// One fetched or rendered document
#[derive(Debug, Clone)]
pub struct Page {
    document: Document,
    session: SessionLink,
    markers: Vec<String>,
    kept_tab: Option<Arc<dyn BrowserTab>>,
}

impl Page {
    pub(crate) fn new(document: Document, session: SessionLink) -> Self {
        Self {
            document,
            session,
            markers: DEFAULT_NEXT_MARKERS.iter().map(|m| (*m).to_string()).collect(),
            kept_tab: None,
        }
    }

    /// Page over in-memory markup, not bound to any session
    ///
    /// Without a URL the page gets the placeholder URL, and rendering it
    /// loads the markup in place instead of navigating.
    #[must_use]
    pub fn from_html(html: &str, url: Option<&str>) -> Self {
        Self::new(
            Document::from_html(html, url.unwrap_or(DEFAULT_URL)),
            SessionLink::Detached,
        )
    }

    #[must_use]
    pub(crate) fn with_session(mut self, session: SessionLink) -> Self {
        self.session = session;
        self
    }

    pub(crate) fn session(&self) -> &SessionLink {
        &self.session
    }

    #[must_use]
    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    /// Swap in a new document, e.g. after rendering
    pub fn replace_content(&mut self, document: Document) {
        self.document = document;
    }

    #[must_use]
    pub fn raw_html(&self) -> &[u8] {
        self.document.raw_html()
    }

    pub fn set_encoding(&mut self, label: &str) -> Result<()> {
        self.document.set_encoding(label)
    }

    pub fn set_html(&mut self, html: &str) {
        self.document.set_html(html);
    }

    pub fn set_skip_anchors(&mut self, skip_anchors: bool) {
        self.document.set_skip_anchors(skip_anchors);
    }

    /// Anchor text fragments that mark a "next page" link
    #[must_use]
    pub fn markers(&self) -> &[String] {
        &self.markers
    }

    pub fn add_marker(&mut self, marker: impl Into<String>) {
        self.markers.push(marker.into());
    }

    pub fn set_markers<I, S>(&mut self, markers: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.markers = markers.into_iter().map(Into::into).collect();
    }

    /// Tab left open by the last render with `keep_page`
    #[must_use]
    pub fn kept_tab(&self) -> Option<&Arc<dyn BrowserTab>> {
        self.kept_tab.as_ref()
    }

    pub fn take_kept_tab(&mut self) -> Option<Arc<dyn BrowserTab>> {
        self.kept_tab.take()
    }
}

impl HtmlQuery for Page {
    fn html(&self) -> &str {
        self.document.html()
    }

    fn url(&self) -> &str {
        self.document.url()
    }

    fn encoding(&self) -> &'static Encoding {
        self.document.encoding()
    }

    fn skip_anchors(&self) -> bool {
        self.document.skip_anchors()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detached_page_uses_placeholder_url() {
        let page = Page::from_html("<p>hi</p>", None);
        assert_eq!(page.url(), DEFAULT_URL);
        assert_eq!(page.markers(), ["next", "more", "older"]);
    }

    #[test]
    fn replace_content_swaps_document() {
        let mut page = Page::from_html("<a href='/a'>a</a>", Some("https://example.com/"));
        page.replace_content(Document::from_html("<a href='/b'>b</a>", "https://example.com/"));
        assert!(page.links().contains("/b"));
        assert!(!page.links().contains("/a"));
    }

    #[test]
    fn detached_page_cannot_fetch() {
        let link = SessionLink::Detached;
        let err = link.blocking("render").unwrap_err();
        assert!(matches!(err, HtmlSessionError::Usage(_)));
    }

    #[test]
    fn dropped_session_reports_closed() {
        let link = SessionLink::Blocking(Weak::new());
        assert!(matches!(
            link.blocking("render").unwrap_err(),
            HtmlSessionError::SessionClosed
        ));
    }
}
