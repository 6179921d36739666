//! A single element selected out of a document.

use std::collections::BTreeMap;
use std::fmt;

use ego_tree::NodeRef;
use encoding_rs::Encoding;
use scraper::{ElementRef, Html, Node};

use super::HtmlQuery;
use super::clean::clean_html;
use crate::error::Result;

/// Element returned by CSS and XPath queries
///
/// Owns its serialized markup, so it outlives the tree it was selected
/// from and can be queried again like a document.
#[derive(Debug, Clone)]
pub struct Element {
    tag: String,
    attrs: BTreeMap<String, String>,
    html: String,
    url: String,
    encoding: &'static Encoding,
    skip_anchors: bool,
}

impl Element {
    pub(crate) fn from_ref(
        el: ElementRef<'_>,
        url: &str,
        encoding: &'static Encoding,
        skip_anchors: bool,
    ) -> Self {
        let value = el.value();
        Self {
            tag: value.name().to_string(),
            attrs: value
                .attrs()
                .map(|(name, val)| (name.to_string(), val.to_string()))
                .collect(),
            html: el.html(),
            url: url.to_string(),
            encoding,
            skip_anchors,
        }
    }

    /// Copy of this element with scripts, styles, comments and event
    /// handlers stripped
    pub fn cleaned(&self) -> Result<Self> {
        let html = clean_html(&self.html)?;
        let attrs = self
            .attrs
            .iter()
            .filter(|(name, _)| !name.starts_with("on"))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        Ok(Self {
            attrs,
            html,
            ..self.clone()
        })
    }

    /// Lowercase tag name
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    #[must_use]
    pub fn attrs(&self) -> &BTreeMap<String, String> {
        &self.attrs
    }

    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    /// Whitespace-separated tokens of the `class` attribute
    #[must_use]
    pub fn classes(&self) -> Vec<&str> {
        self.tokens("class")
    }

    /// Whitespace-separated tokens of the `rel` attribute
    #[must_use]
    pub fn rel(&self) -> Vec<&str> {
        self.tokens("rel")
    }

    fn tokens(&self, name: &str) -> Vec<&str> {
        self.attr(name)
            .map(|value| value.split_whitespace().collect())
            .unwrap_or_default()
    }

    /// Markup encoded in the encoding of the source document
    #[must_use]
    pub fn raw_html(&self) -> Vec<u8> {
        self.encoding.encode(&self.html).0.into_owned()
    }
}

impl HtmlQuery for Element {
    fn html(&self) -> &str {
        &self.html
    }

    fn url(&self) -> &str {
        &self.url
    }

    fn encoding(&self) -> &'static Encoding {
        self.encoding
    }

    fn skip_anchors(&self) -> bool {
        self.skip_anchors
    }

    /// Table parts and document-level tags do not survive a fragment parse
    /// in body context, so they get the wrapper they need
    fn parse(&self) -> Html {
        match self.tag.as_str() {
            "html" | "head" | "body" => Html::parse_document(&self.html),
            "td" | "th" => Html::parse_fragment(&format!("<table><tr>{}</tr></table>", self.html)),
            "tr" | "thead" | "tbody" | "tfoot" | "caption" | "colgroup" => {
                Html::parse_fragment(&format!("<table>{}</table>", self.html))
            }
            _ => Html::parse_fragment(&self.html),
        }
    }

    fn context<'a>(&self, tree: &'a Html) -> NodeRef<'a, Node> {
        let root = tree.root_element();
        root.descendants()
            .find(|node| {
                node.value()
                    .as_element()
                    .is_some_and(|el| el.name() == self.tag)
            })
            .unwrap_or(*root)
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Element '{}'", self.tag)?;
        for (name, value) in &self.attrs {
            match name.as_str() {
                "class" | "rel" => {
                    let tokens: Vec<String> = value
                        .split_whitespace()
                        .map(|t| format!("'{t}'"))
                        .collect();
                    write!(f, " {name}=({})", tokens.join(", "))?;
                }
                _ => write!(f, " {name}='{value}'")?,
            }
        }
        write!(f, ">")
    }
}
