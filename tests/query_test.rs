//! CSS, XPath, template search and text extraction over a realistic page

use kodegen_tools_htmlsession::{Document, FindOptions, HtmlQuery, HtmlSessionError, Page, XPathItem};

const RELEASES: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>Release notes</title>
  <style>.hidden { display: none }</style>
</head>
<body>
  <nav class="menu main">
    <a href="/">Home</a>
    <a href="/downloads/" class="active">Downloads</a>
    <a href="#changelog">Changelog</a>
  </nav>
  <article id="release" data-version="3.12.1">
    <h2>Release 3.12.1</h2>
    <p onclick="track()">Released on <time>2024-06-06</time> by the release team.</p>
    <script>window.analytics = true;</script>
    <!-- internal note -->
    <table id="files">
      <tr><th>File</th><th>Size</th></tr>
      <tr><td><a href="files/src.tgz">Source tarball</a></td><td>25 MB</td></tr>
      <tr><td><a href="files/win.exe">Windows installer</a></td><td>30 MB</td></tr>
    </table>
  </article>
</body>
</html>"##;

fn page() -> Page {
    Page::from_html(RELEASES, Some("https://www.example.org/releases/3.12.1.html"))
}

#[test]
fn test_find_and_attributes() {
    let page = page();
    let nav = page.find_first("nav", &FindOptions::default()).unwrap().unwrap();
    assert_eq!(nav.classes(), vec!["menu", "main"]);

    let active = page.find_first("a.active", &FindOptions::default()).unwrap().unwrap();
    assert_eq!(active.attr("href"), Some("/downloads/"));
    assert_eq!(active.to_string(), "<Element 'a' class=('active') href='/downloads/'>");
}

#[test]
fn test_containing_is_case_insensitive() {
    let page = page();
    let found = page
        .find("a", &FindOptions::containing(["INSTALLER", "tarball"]))
        .unwrap();
    let hrefs: Vec<_> = found.iter().filter_map(|a| a.attr("href")).collect();
    assert_eq!(hrefs, vec!["files/src.tgz", "files/win.exe"]);
}

#[test]
fn test_clean_strips_scripts_and_handlers() {
    let page = page();
    let article = page
        .find_first("#release", &FindOptions::default().with_clean(true))
        .unwrap()
        .unwrap();

    assert!(!article.html().contains("<script"));
    assert!(!article.html().contains("onclick"));
    assert!(!article.html().contains("internal note"));
    assert!(article.html().contains("Release 3.12.1"));
}

#[test]
fn test_element_scoped_queries() {
    let page = page();
    let table = page.find_first("#files", &FindOptions::default()).unwrap().unwrap();

    let rows = table.find("tr", &FindOptions::default()).unwrap();
    assert_eq!(rows.len(), 3);

    let cells = rows[1].find("td", &FindOptions::default()).unwrap();
    assert_eq!(cells.len(), 2);
    assert_eq!(cells[1].text(), "25 MB");

    assert!(
        table
            .absolute_links()
            .contains("https://www.example.org/releases/files/win.exe")
    );
}

#[test]
fn test_xpath_elements_and_values() {
    let page = page();
    let sizes: Vec<String> = page
        .xpath("//table[@id='files']//tr[position() > 1]/td[2]/text()", false)
        .unwrap()
        .into_iter()
        .filter_map(|item| item.as_text().map(str::to_string))
        .collect();
    assert_eq!(sizes, vec!["25 MB", "30 MB"]);

    let version = page.xpath_first("//article/@data-version", false).unwrap();
    assert_eq!(version.as_ref().and_then(XPathItem::as_text), Some("3.12.1"));

    let cleaned = page.xpath_first("//article", true).unwrap().unwrap();
    let article = cleaned.as_element().unwrap();
    assert!(!article.html().contains("analytics"));
}

#[test]
fn test_xpath_errors() {
    let err = page().xpath("//tr[", false).unwrap_err();
    assert!(matches!(err, HtmlSessionError::XPath { .. }));
}

#[test]
fn test_search_templates() {
    let page = page();
    let released = page.search("Released on <time>{date}</time>").unwrap().unwrap();
    assert_eq!(released.get("date"), Some("2024-06-06"));

    let sizes: Vec<String> = page
        .search_all("<td>{:d} MB</td>")
        .unwrap()
        .into_iter()
        .map(|m| m[0].to_string())
        .collect();
    assert_eq!(sizes, vec!["25", "30"]);

    assert!(page.search("no such {thing} here").unwrap().is_none());
}

#[test]
fn test_text_skips_scripts_and_styles() {
    let page = page();
    let text = page.text();
    assert!(text.contains("Release 3.12.1"));
    assert!(text.contains("Released on 2024-06-06 by the release team."));
    assert!(!text.contains("analytics"));
    assert!(!text.contains("display: none"));

    // Raw text keeps script bodies
    assert!(page.full_text().contains("window.analytics"));
}

#[test]
fn test_anchor_links_toggle() {
    let mut page = page();
    assert!(!page.links().contains("#changelog"));

    page.set_skip_anchors(false);
    assert!(page.links().contains("#changelog"));
}

#[test]
fn test_raw_html_follows_encoding() {
    let mut doc = Document::from_html("<p>café</p>", "https://example.org/");
    doc.set_encoding("windows-1252").unwrap();
    doc.set_html("<p>crème</p>");
    assert_eq!(doc.raw_html(), b"<p>cr\xe8me</p>");
    assert_eq!(doc.text(), "crème");
}
