//! Next-page resolution and pagination through sessions

mod common;

use futures::StreamExt;
use kodegen_tools_htmlsession::{AsyncHtmlSession, HtmlQuery, HtmlSession, NextPage, Page};
use mockito::{Mock, Server, ServerGuard};

fn listing(page: u32, last: u32) -> String {
    let next = if page < last {
        format!(r#"<a href="/archive?page={}" rel="next">Older posts</a>"#, page + 1)
    } else {
        String::new()
    };
    format!(
        r#"<html><body><h1>Archive page {page}</h1>
        <a href="/about">About us</a>
        {next}
        </body></html>"#
    )
}

fn mock_archive(server: &mut ServerGuard, last: u32) -> Vec<Mock> {
    (2..=last)
        .map(|page| {
            server
                .mock("GET", "/archive")
                .match_query(mockito::Matcher::UrlEncoded("page".into(), page.to_string()))
                .with_header("content-type", "text/html")
                .with_body(listing(page, last))
                .create()
        })
        .collect()
}

fn archive_url(server: &ServerGuard) -> String {
    format!("{}/archive", server.url())
}

fn heading(page: &Page) -> String {
    page.xpath_first("string(//h1)", false)
        .unwrap()
        .and_then(|item| item.as_text().map(str::to_string))
        .unwrap_or_default()
}

#[test]
fn test_rel_next_wins_regardless_of_order() {
    let page = Page::from_html(
        r#"<a href="/more-info">More info</a>
           <a href="/older-stuff">Older stuff</a>
           <a href="/p/2" rel="next">Next</a>"#,
        Some("https://blog.example.com/"),
    );
    assert_eq!(
        page.next_url(None).unwrap().as_deref(),
        Some("https://blog.example.com/p/2")
    );

    let reordered = Page::from_html(
        r#"<a href="/older-stuff">Older stuff</a>
           <a href="/p/2" rel="next">Next</a>
           <a href="/more-info">More info</a>"#,
        Some("https://blog.example.com/"),
    );
    assert_eq!(
        reordered.next_url(None).unwrap().as_deref(),
        Some("https://blog.example.com/p/2")
    );
}

#[test]
fn test_added_marker_is_used() {
    let mut page = Page::from_html(
        r#"<a href="/seite/2">Weiter</a>"#,
        Some("https://example.de/seite/1"),
    );
    assert!(page.next_url(None).unwrap().is_none());

    page.add_marker("weiter");
    assert_eq!(
        page.next_url(None).unwrap().as_deref(),
        Some("https://example.de/seite/2")
    );
}

#[test]
fn test_blocking_next_fetches_page() {
    common::init_tracing();
    let mut server = Server::new();
    let _mocks = mock_archive(&mut server, 2);

    let session = HtmlSession::new().unwrap();
    let first = session.page_from_html(&listing(1, 2), Some(archive_url(&server).as_str()));

    let Some(NextPage::Page(second)) = first.next(true, None).unwrap() else {
        panic!("expected a fetched page");
    };
    assert_eq!(heading(&second), "Archive page 2");
    assert!(second.next_page().unwrap().is_none());
}

#[test]
fn test_into_pages_walks_the_archive() {
    let mut server = Server::new();
    let _mocks = mock_archive(&mut server, 4);

    let session = HtmlSession::new().unwrap();
    let first = session.page_from_html(&listing(1, 4), Some(archive_url(&server).as_str()));

    let headings: Vec<String> = first
        .into_pages()
        .map(|page| heading(&page.unwrap()))
        .collect();
    assert_eq!(
        headings,
        ["Archive page 1", "Archive page 2", "Archive page 3", "Archive page 4"]
    );
}

#[test]
fn test_error_status_ends_the_walk() {
    let mut server = Server::new();
    let _mock = server
        .mock("GET", "/archive")
        .match_query(mockito::Matcher::Any)
        .with_status(500)
        .with_body("")
        .create();

    let session = HtmlSession::new().unwrap();
    let first = session.page_from_html(&listing(1, 3), Some(archive_url(&server).as_str()));

    // Error responses are still pages; the walk ends when they have no next link
    let pages: Vec<_> = first.into_pages().collect();
    assert_eq!(pages.len(), 2);
    assert!(pages.iter().all(Result::is_ok));
}

#[tokio::test]
async fn test_async_stream_walks_the_archive() {
    let mut server = Server::new_async().await;
    let mut mocks = Vec::new();
    for page in 2..=3 {
        let mock = server
            .mock("GET", "/archive")
            .match_query(mockito::Matcher::UrlEncoded("page".into(), page.to_string()))
            .with_body(listing(page, 3))
            .create_async()
            .await;
        mocks.push(mock);
    }

    let session = AsyncHtmlSession::new().unwrap();
    let first = session.page_from_html(&listing(1, 3), Some(archive_url(&server).as_str()));

    let headings: Vec<String> = first
        .into_stream()
        .map(|page| heading(&page.unwrap()))
        .collect()
        .await;
    assert_eq!(headings, ["Archive page 1", "Archive page 2", "Archive page 3"]);
}

#[tokio::test]
async fn test_next_async_without_fetch() {
    let session = AsyncHtmlSession::new().unwrap();
    let page = session.page_from_html(&listing(1, 2), Some("https://blog.example.com/archive"));

    let next = page.next_async(false, None).await.unwrap().unwrap();
    assert_eq!(next.as_url(), Some("https://blog.example.com/archive?page=2"));
}

#[test]
fn test_blank_next_link_ends_the_walk() {
    let session = HtmlSession::new().unwrap();
    let first = session.page_from_html(
        r#"<h1>Only page</h1><a href="" rel="next">Next</a>"#,
        Some("https://blog.example.com/archive/"),
    );

    let pages: Vec<_> = first.into_pages().collect();
    assert_eq!(pages.len(), 1);
    assert_eq!(heading(pages[0].as_ref().unwrap()), "Only page");
}
