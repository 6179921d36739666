//! "Next page" resolution and pagination.
//!
//! Candidates are the anchors whose text contains one of the page's
//! markers. Among all candidates the first one with `rel="next"` wins,
//! then the first with a class token containing `next`, then the first
//! whose href mentions `page`, and finally the last candidate.

use futures::stream::{self, Stream};

use super::{Page, SessionLink};
use crate::document::{Element, FindOptions, HtmlQuery};
use crate::error::Result;

/// Result of [`Page::next`]
#[derive(Debug, Clone)]
pub enum NextPage {
    Url(String),
    Page(Page),
}

impl NextPage {
    #[must_use]
    pub fn as_url(&self) -> Option<&str> {
        match self {
            NextPage::Url(url) => Some(url),
            NextPage::Page(_) => None,
        }
    }

    #[must_use]
    pub fn into_page(self) -> Option<Page> {
        match self {
            NextPage::Page(page) => Some(page),
            NextPage::Url(_) => None,
        }
    }
}

/// Non-blank href of an anchor
fn href_of(anchor: &Element) -> Option<&str> {
    anchor.attr("href").map(str::trim).filter(|h| !h.is_empty())
}

fn choose_candidate(candidates: &[Element]) -> Option<&Element> {
    let with_href = || candidates.iter().filter(|a| href_of(a).is_some());

    with_href()
        .find(|a| a.rel().contains(&"next"))
        .or_else(|| with_href().find(|a| a.classes().iter().any(|c| c.contains("next"))))
        .or_else(|| with_href().find(|a| href_of(a).is_some_and(|h| h.contains("page"))))
        .or_else(|| candidates.last())
}

impl Page {
    /// Absolute URL of the next page, if the page links to one
    ///
    /// `markers` overrides the page's own marker list.
    pub fn next_url(&self, markers: Option<&[&str]>) -> Result<Option<String>> {
        let options = match markers {
            Some(markers) => FindOptions::containing(markers.iter().copied()),
            None => FindOptions::containing(self.markers.iter().cloned()),
        };
        let candidates = self.find("a", &options)?;

        // A blank href would resolve to this page and loop forever
        let Some(href) = choose_candidate(&candidates).and_then(href_of) else {
            log::trace!("No next-page link on {}", self.url());
            return Ok(None);
        };
        Ok(Some(self.resolve(href)?))
    }

    /// Next page as a URL, or fetched through the blocking session when
    /// `fetch` is set
    pub fn next(&self, fetch: bool, markers: Option<&[&str]>) -> Result<Option<NextPage>> {
        let Some(url) = self.next_url(markers)? else {
            return Ok(None);
        };
        if !fetch {
            return Ok(Some(NextPage::Url(url)));
        }

        let mut page = self.session.fetch_blocking(&url)?;
        page.markers = self.markers.clone();
        Ok(Some(NextPage::Page(page)))
    }

    /// Async counterpart of [`next`](Self::next)
    pub async fn next_async(&self, fetch: bool, markers: Option<&[&str]>) -> Result<Option<NextPage>> {
        let Some(url) = self.next_url(markers)? else {
            return Ok(None);
        };
        if !fetch {
            return Ok(Some(NextPage::Url(url)));
        }

        let mut page = self.session.fetch_async(&url).await?;
        page.markers = self.markers.clone();
        Ok(Some(NextPage::Page(page)))
    }

    /// Fetch the following page through the blocking session
    pub fn next_page(&self) -> Result<Option<Page>> {
        Ok(self.next(true, None)?.and_then(NextPage::into_page))
    }

    /// This page followed by every next page, fetched lazily
    #[must_use]
    pub fn into_pages(self) -> Pages {
        Pages {
            cursor: Cursor::Start(Box::new(self)),
        }
    }

    /// Async counterpart of [`into_pages`](Self::into_pages)
    pub fn into_stream(self) -> impl Stream<Item = Result<Page>> + Send {
        stream::unfold(Cursor::Start(Box::new(self)), |cursor| async move {
            match cursor {
                Cursor::Start(page) => Some(yield_page(*page)),
                Cursor::Next { url, link, markers } => {
                    let fetched = link.fetch_async(&url).await;
                    Some(after_fetch(fetched, markers))
                }
                Cursor::Failed(e) => Some((Err(e), Cursor::Done)),
                Cursor::Done => None,
            }
        })
    }
}

/// Where pagination continues from
#[derive(Debug)]
enum Cursor {
    Start(Box<Page>),
    Next {
        url: String,
        link: SessionLink,
        markers: Vec<String>,
    },
    /// Resolving the next link failed after yielding a page
    Failed(crate::error::HtmlSessionError),
    Done,
}

/// Hand out `page` and work out where to go next
fn yield_page(page: Page) -> (Result<Page>, Cursor) {
    let cursor = match page.next_url(None) {
        Ok(Some(url)) => Cursor::Next {
            url,
            link: page.session.clone(),
            markers: page.markers.clone(),
        },
        Ok(None) => Cursor::Done,
        Err(e) => Cursor::Failed(e),
    };
    (Ok(page), cursor)
}

fn after_fetch(fetched: Result<Page>, markers: Vec<String>) -> (Result<Page>, Cursor) {
    match fetched {
        Ok(mut page) => {
            page.markers = markers;
            yield_page(page)
        }
        Err(e) => (Err(e), Cursor::Done),
    }
}

/// Blocking iterator returned by [`Page::into_pages`]
#[derive(Debug)]
pub struct Pages {
    cursor: Cursor,
}

impl Iterator for Pages {
    type Item = Result<Page>;

    fn next(&mut self) -> Option<Self::Item> {
        let (item, cursor) = match std::mem::replace(&mut self.cursor, Cursor::Done) {
            Cursor::Start(page) => yield_page(*page),
            Cursor::Next { url, link, markers } => after_fetch(link.fetch_blocking(&url), markers),
            Cursor::Failed(e) => (Err(e), Cursor::Done),
            Cursor::Done => return None,
        };
        self.cursor = cursor;
        Some(item)
    }
}
