//! Document model: parsed HTML with link extraction, base-URL resolution,
//! CSS/XPath queries and template search.
//!
//! The parse tree from `scraper` is not `Send`, so documents keep their raw
//! bytes plus a small cache of derived state and re-parse on demand. Every
//! query surface (whole documents and the elements selected from them)
//! shares the [`HtmlQuery`] trait.

pub mod clean;
pub mod element;
pub mod encoding;
pub mod search;
pub mod text;

use std::collections::BTreeSet;
use std::sync::OnceLock;

use ego_tree::NodeRef;
use encoding_rs::{Encoding, UTF_8};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Node, Selector};

pub use element::Element;
pub use search::{SearchMatch, Template};

use crate::error::{HtmlSessionError, Result};
use crate::utils::url_utils::{self, is_non_navigational};
use crate::xpath::{XPath, XPathHit};

static ANCHOR_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[href]").expect("Invalid anchor selector"));

static BASE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("base[href]").expect("Invalid base selector"));

/// Options for [`HtmlQuery::find`]
#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    /// Keep only elements whose text contains one of these (case-insensitive)
    pub containing: Vec<String>,
    /// Strip scripts, styles, comments and event handlers from results
    pub clean: bool,
}

impl FindOptions {
    #[must_use]
    pub fn containing<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            containing: words.into_iter().map(Into::into).collect(),
            clean: false,
        }
    }

    #[must_use]
    pub fn with_clean(mut self, clean: bool) -> Self {
        self.clean = clean;
        self
    }
}

/// One XPath result
#[derive(Debug, Clone)]
pub enum XPathItem {
    Element(Element),
    /// Attribute values, text nodes and comments
    Text(String),
}

impl XPathItem {
    #[must_use]
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            XPathItem::Element(el) => Some(el),
            XPathItem::Text(_) => None,
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            XPathItem::Text(text) => Some(text),
            XPathItem::Element(_) => None,
        }
    }
}

/// Query surface shared by documents and elements
pub trait HtmlQuery {
    /// Decoded markup
    fn html(&self) -> &str;

    /// URL the markup was retrieved from
    fn url(&self) -> &str;

    fn encoding(&self) -> &'static Encoding;

    /// Whether fragment-only links (`#top`) are left out of [`links`](Self::links)
    fn skip_anchors(&self) -> bool;

    /// Parse the markup into a fresh tree
    fn parse(&self) -> Html {
        Html::parse_document(self.html())
    }

    /// Node queries are evaluated against
    fn context<'a>(&self, tree: &'a Html) -> NodeRef<'a, Node> {
        tree.tree.root()
    }

    /// Elements matching a CSS selector, in document order
    fn find(&self, css: &str, options: &FindOptions) -> Result<Vec<Element>> {
        let selector = parse_selector(css)?;
        let tree = self.parse();
        let context = self.context(&tree);

        let needles: Vec<String> = options
            .containing
            .iter()
            .map(|word| word.to_lowercase())
            .collect();

        let mut found = Vec::new();
        for el in select(&tree, context, &selector) {
            if !needles.is_empty() {
                let haystack = text::full_text(*el).to_lowercase();
                if !needles.iter().any(|needle| haystack.contains(needle)) {
                    continue;
                }
            }

            let element = Element::from_ref(el, self.url(), self.encoding(), self.skip_anchors());
            found.push(if options.clean {
                element.cleaned()?
            } else {
                element
            });
        }

        log::trace!("find('{css}') matched {} elements", found.len());
        Ok(found)
    }

    /// First element matching a CSS selector
    fn find_first(&self, selector: &str, options: &FindOptions) -> Result<Option<Element>> {
        Ok(self.find(selector, options)?.into_iter().next())
    }

    /// Evaluate an XPath expression
    fn xpath(&self, expression: &str, clean: bool) -> Result<Vec<XPathItem>> {
        let xpath = XPath::parse(expression)?;
        let tree = self.parse();

        let mut items = Vec::new();
        for hit in xpath.select(self.context(&tree))? {
            match hit {
                XPathHit::Node(node) => {
                    let Some(el) = ElementRef::wrap(node) else {
                        continue;
                    };
                    let element =
                        Element::from_ref(el, self.url(), self.encoding(), self.skip_anchors());
                    items.push(XPathItem::Element(if clean {
                        element.cleaned()?
                    } else {
                        element
                    }));
                }
                XPathHit::Text(text) => items.push(XPathItem::Text(text)),
            }
        }

        Ok(items)
    }

    fn xpath_first(&self, expression: &str, clean: bool) -> Result<Option<XPathItem>> {
        Ok(self.xpath(expression, clean)?.into_iter().next())
    }

    /// Text as a reader sees it: whitespace collapsed, one line per block
    fn text(&self) -> String {
        let tree = self.parse();
        text::visible_text(self.context(&tree))
    }

    /// Every text node concatenated, whitespace untouched
    fn full_text(&self) -> String {
        let tree = self.parse();
        text::full_text(self.context(&tree))
    }

    /// Link targets as written in the markup
    ///
    /// `javascript:` and `mailto:` links are never included; fragment-only
    /// links are dropped while [`skip_anchors`](Self::skip_anchors) is set.
    fn links(&self) -> BTreeSet<String> {
        let tree = self.parse();
        let context = self.context(&tree);

        select(&tree, context, &ANCHOR_SELECTOR)
            .filter_map(|a| a.value().attr("href"))
            .map(str::trim)
            .filter(|href| !href.is_empty())
            .filter(|href| !(self.skip_anchors() && href.starts_with('#')))
            .filter(|href| !is_non_navigational(href))
            .map(str::to_string)
            .collect()
    }

    /// Base URL links are resolved against
    fn base_url(&self) -> Result<String> {
        let tree = self.parse();
        let context = self.context(&tree);
        let base_href = select(&tree, context, &BASE_SELECTOR)
            .next()
            .and_then(|base| base.value().attr("href"))
            .map(str::to_string);

        url_utils::base_url(self.url(), base_href.as_deref())
    }

    /// Resolve `link` the way a browser would from this page
    fn resolve(&self, link: &str) -> Result<String> {
        url_utils::make_absolute(&self.base_url()?, link)
    }

    /// All links, resolved to absolute URLs
    fn absolute_links(&self) -> BTreeSet<String> {
        let base = match self.base_url() {
            Ok(base) => base,
            Err(e) => {
                log::debug!("No usable base URL for {}: {e}", self.url());
                return BTreeSet::new();
            }
        };

        self.links()
            .into_iter()
            .filter_map(|link| match url_utils::make_absolute(&base, &link) {
                Ok(absolute) => Some(absolute),
                Err(e) => {
                    log::debug!("Skipping unresolvable link '{link}': {e}");
                    None
                }
            })
            .collect()
    }

    /// First match of a search template in the markup
    fn search(&self, template: &str) -> Result<Option<SearchMatch>> {
        Ok(Template::compile(template)?.search(self.html()))
    }

    /// Every match of a search template in the markup
    fn search_all(&self, template: &str) -> Result<Vec<SearchMatch>> {
        Ok(Template::compile(template)?.search_all(self.html()))
    }
}

fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| HtmlSessionError::Selector {
        selector: selector.to_string(),
        message: e.to_string(),
    })
}

/// Elements below `context` matching `selector`; the whole tree when the
/// context is the document node
fn select<'a>(
    tree: &'a Html,
    context: NodeRef<'a, Node>,
    selector: &'a Selector,
) -> Box<dyn Iterator<Item = ElementRef<'a>> + 'a> {
    match ElementRef::wrap(context) {
        Some(scope) => Box::new(scope.select(selector)),
        None => Box::new(tree.select(selector)),
    }
}

/// Derived document state, computed once and dropped on mutation
#[derive(Debug, Clone, Default)]
pub struct DocumentCache {
    encoding: OnceLock<&'static Encoding>,
    text: OnceLock<String>,
}

impl DocumentCache {
    pub fn invalidate(&mut self) {
        self.encoding.take();
        self.text.take();
    }
}

/// A parsed HTML document
#[derive(Debug, Clone)]
pub struct Document {
    raw: Vec<u8>,
    url: String,
    default_encoding: &'static Encoding,
    declared_encoding: Option<&'static Encoding>,
    encoding_override: Option<&'static Encoding>,
    skip_anchors: bool,
    cache: DocumentCache,
}

impl Document {
    /// Document from bytes as received from the network
    ///
    /// `declared` is the charset named by the transport, if any.
    pub fn from_bytes(
        raw: impl Into<Vec<u8>>,
        url: impl Into<String>,
        declared: Option<&'static Encoding>,
    ) -> Self {
        Self {
            raw: raw.into(),
            url: url.into(),
            default_encoding: UTF_8,
            declared_encoding: declared,
            encoding_override: None,
            skip_anchors: true,
            cache: DocumentCache::default(),
        }
    }

    /// Document from in-memory markup
    pub fn from_html(html: &str, url: impl Into<String>) -> Self {
        Self::from_bytes(html.as_bytes(), url, Some(UTF_8))
    }

    /// Encoding used when neither bytes nor transport name one
    #[must_use]
    pub fn with_default_encoding(mut self, encoding: &'static Encoding) -> Self {
        self.default_encoding = encoding;
        self.cache.invalidate();
        self
    }

    #[must_use]
    pub fn with_skip_anchors(mut self, skip_anchors: bool) -> Self {
        self.skip_anchors = skip_anchors;
        self
    }

    pub fn set_skip_anchors(&mut self, skip_anchors: bool) {
        self.skip_anchors = skip_anchors;
    }

    #[must_use]
    pub fn raw_html(&self) -> &[u8] {
        &self.raw
    }

    /// Force a specific encoding, by label
    pub fn set_encoding(&mut self, label: &str) -> Result<()> {
        let encoding = encoding::lookup(label)
            .ok_or_else(|| HtmlSessionError::Other(format!("Unknown encoding '{label}'")))?;
        self.encoding_override = Some(encoding);
        self.cache.invalidate();
        Ok(())
    }

    /// Replace the markup, keeping the current encoding
    pub fn set_html(&mut self, html: &str) {
        let encoding = self.encoding().output_encoding();
        self.raw = encoding.encode(html).0.into_owned();
        self.encoding_override = Some(encoding);
        self.cache.invalidate();
    }

    /// Drop cached derived state
    pub fn invalidate(&mut self) {
        self.cache.invalidate();
    }
}

impl HtmlQuery for Document {
    fn html(&self) -> &str {
        self.cache.text.get_or_init(|| {
            let (text, used, had_errors) = self.encoding().decode(&self.raw);
            if had_errors {
                log::debug!(
                    "Malformed {} sequences in {}, replaced",
                    used.name(),
                    self.url
                );
            }
            text.into_owned()
        })
    }

    fn url(&self) -> &str {
        &self.url
    }

    fn encoding(&self) -> &'static Encoding {
        if let Some(encoding) = self.encoding_override {
            return encoding;
        }
        *self.cache.encoding.get_or_init(|| {
            encoding::sniff(&self.raw, self.declared_encoding, self.default_encoding)
        })
    }

    fn skip_anchors(&self) -> bool {
        self.skip_anchors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r##"<html><head><title>Demo</title></head><body>
        <ul id="menu">
          <li><a href="/about/">About</a></li>
          <li><a href="downloads.html">Downloads</a></li>
          <li><a href="#top">Top</a></li>
          <li><a href="javascript:void(0)">Nothing</a></li>
          <li><a href="mailto:me@example.com">Mail</a></li>
          <li><a href="//cdn.example.com/lib.js">CDN</a></li>
        </ul>
        <p class="intro">Python is a programming language that lets you work quickly.</p>
        <script>var ignored = "Python";</script>
        </body></html>"##;

    fn doc() -> Document {
        Document::from_html(PAGE, "https://python.org/community/events.html")
    }

    #[test]
    fn links_skip_anchors_and_pseudo_schemes() {
        let links = doc().links();
        assert!(links.contains("/about/"));
        assert!(links.contains("downloads.html"));
        assert!(!links.contains("#top"));
        assert!(!links.iter().any(|l| l.starts_with("javascript:")));
        assert!(!links.iter().any(|l| l.starts_with("mailto:")));
    }

    #[test]
    fn anchors_kept_when_not_skipped() {
        let links = doc().with_skip_anchors(false).links();
        assert!(links.contains("#top"));
    }

    #[test]
    fn absolute_links_resolve_against_directory() {
        let links = doc().absolute_links();
        assert!(links.contains("https://python.org/about/"));
        assert!(links.contains("https://python.org/community/downloads.html"));
        assert!(links.contains("https://cdn.example.com/lib.js"));
    }

    #[test]
    fn find_with_containing_filters_case_insensitively() {
        let found = doc()
            .find("a", &FindOptions::containing(["DOWNLOAD"]))
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].attr("href"), Some("downloads.html"));
    }

    #[test]
    fn element_queries_are_scoped() {
        let menu = doc().find_first("#menu", &FindOptions::default()).unwrap().unwrap();
        assert_eq!(menu.find("a", &FindOptions::default()).unwrap().len(), 6);
        assert!(menu.text().contains("About\nDownloads"));
    }

    #[test]
    fn bad_selector_is_an_error() {
        let err = doc().find("a[", &FindOptions::default()).unwrap_err();
        assert!(matches!(err, HtmlSessionError::Selector { .. }));
    }

    #[test]
    fn search_finds_template_value() {
        let m = doc().search("Python is a {} language").unwrap().unwrap();
        assert_eq!(&m[0], "programming");
    }

    #[test]
    fn text_hides_scripts() {
        let text = doc().text();
        assert!(text.contains("Python is a programming language"));
        assert!(!text.contains("ignored"));
    }

    #[test]
    fn set_encoding_invalidates_text() {
        let mut doc = Document::from_bytes(b"<p>caf\xe9</p>".to_vec(), "http://example.com/", None);
        assert!(doc.html().contains('\u{FFFD}'));
        doc.set_encoding("latin1").unwrap();
        assert!(doc.html().contains("café"));
        assert_eq!(doc.encoding().name(), "windows-1252");
    }

    #[test]
    fn set_html_replaces_content() {
        let mut doc = doc();
        doc.set_html("<p>fresh</p>");
        assert_eq!(doc.text(), "fresh");
        assert!(doc.links().is_empty());
    }

    #[test]
    fn xpath_returns_elements_and_strings() {
        let doc = doc();
        let hrefs: Vec<String> = doc
            .xpath("//li/a/@href", false)
            .unwrap()
            .into_iter()
            .filter_map(|item| item.as_text().map(str::to_string))
            .collect();
        assert_eq!(hrefs.first().map(String::as_str), Some("/about/"));

        let intro = doc.xpath_first("//p[@class='intro']", false).unwrap().unwrap();
        assert_eq!(intro.as_element().map(Element::tag), Some("p"));
    }
}
