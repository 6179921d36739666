//! XPath 1.0 over `scraper` trees.
//!
//! The scraper tree is mirrored into an `sxd-document` package and the
//! expression is evaluated there by `sxd-xpath`. Element hits are mapped
//! back to the scraper nodes they were copied from by their element-child
//! position, so callers keep working with the tree they parsed.

use std::fmt;

use ego_tree::NodeRef;
use scraper::Node;
use sxd_document::Package;
use sxd_document::dom::{self, ChildOfElement, ChildOfRoot, ParentOfChild};
use sxd_xpath::nodeset::Node as XNode;
use sxd_xpath::{Context, Factory, Value};

use crate::error::{HtmlSessionError, Result};

/// A compiled XPath expression
pub struct XPath {
    source: String,
    compiled: sxd_xpath::XPath,
}

impl fmt::Debug for XPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("XPath").field(&self.source).finish()
    }
}

/// One result of evaluating an expression
#[derive(Debug, Clone)]
pub enum XPathHit<'a> {
    /// Element or document node
    Node(NodeRef<'a, Node>),
    /// Attribute value, text node, comment or scalar result
    Text(String),
}

impl XPath {
    pub fn parse(expression: &str) -> Result<Self> {
        let compiled = Factory::new()
            .build(expression)
            .map_err(|e| xpath_error(expression, e))?
            .ok_or_else(|| xpath_error(expression, "empty expression"))?;
        Ok(Self {
            source: expression.to_string(),
            compiled,
        })
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluate with `context` as the context node
    ///
    /// Scalar results (`count(//a)`, `string(//title)`) come back as a single
    /// [`XPathHit::Text`]. Node sets come back in document order.
    pub fn select<'a>(&self, context: NodeRef<'a, Node>) -> Result<Vec<XPathHit<'a>>> {
        let root = context.ancestors().last().unwrap_or(context);

        let package = Package::new();
        let document = package.as_document();
        let start: XNode<'_> = match mirror(&document, root, context) {
            Some(element) => element.into(),
            None => document.root().into(),
        };

        let value = self
            .compiled
            .evaluate(&Context::new(), start)
            .map_err(|e| xpath_error(&self.source, e))?;

        let hits = match value {
            Value::Nodeset(nodes) => nodes
                .document_order()
                .into_iter()
                .filter_map(|node| match node {
                    XNode::Element(element) => {
                        element_path(element).and_then(|path| follow(root, &path)).map(XPathHit::Node)
                    }
                    XNode::Root(_) => Some(XPathHit::Node(root)),
                    other => Some(XPathHit::Text(other.string_value())),
                })
                .collect(),
            scalar => vec![XPathHit::Text(scalar.string())],
        };
        log::trace!("xpath('{}') produced {} hits", self.source, hits.len());
        Ok(hits)
    }
}

fn xpath_error(expression: &str, error: impl fmt::Display) -> HtmlSessionError {
    HtmlSessionError::XPath {
        expression: expression.to_string(),
        message: error.to_string(),
    }
}

#[derive(Clone, Copy)]
enum Parent<'d> {
    Root(dom::Root<'d>),
    Element(dom::Element<'d>),
}

/// Copy elements, text and comments under `root` into `document`
///
/// Returns the copy of `context` when it is an element.
fn mirror<'d>(
    document: &dom::Document<'d>,
    root: NodeRef<'_, Node>,
    context: NodeRef<'_, Node>,
) -> Option<dom::Element<'d>> {
    let mut context_copy = None;
    let mut stack: Vec<_> = root
        .children()
        .rev()
        .map(|child| (child, Parent::Root(document.root())))
        .collect();

    while let Some((node, parent)) = stack.pop() {
        match node.value() {
            Node::Element(el) => {
                let element = document.create_element(el.name());
                for (name, value) in el.attrs() {
                    element.set_attribute_value(name, value);
                }
                match parent {
                    Parent::Root(root) => root.append_child(element),
                    Parent::Element(parent) => parent.append_child(element),
                }
                if node.id() == context.id() {
                    context_copy = Some(element);
                }
                stack.extend(node.children().rev().map(|child| (child, Parent::Element(element))));
            }
            Node::Text(text) => {
                if let Parent::Element(parent) = parent {
                    parent.append_child(document.create_text(text));
                }
            }
            Node::Comment(comment) => {
                let comment = document.create_comment(comment);
                match parent {
                    Parent::Root(root) => root.append_child(comment),
                    Parent::Element(parent) => parent.append_child(comment),
                }
            }
            _ => {}
        }
    }

    context_copy
}

/// Element-child indices leading from the document root to `element`
fn element_path(element: dom::Element<'_>) -> Option<Vec<usize>> {
    let mut path = Vec::new();
    let mut current = element;
    loop {
        match current.parent()? {
            ParentOfChild::Element(parent) => {
                let index = parent
                    .children()
                    .into_iter()
                    .filter_map(|child| match child {
                        ChildOfElement::Element(el) => Some(el),
                        _ => None,
                    })
                    .position(|el| el == current)?;
                path.push(index);
                current = parent;
            }
            ParentOfChild::Root(root) => {
                let index = root
                    .children()
                    .into_iter()
                    .filter_map(|child| match child {
                        ChildOfRoot::Element(el) => Some(el),
                        _ => None,
                    })
                    .position(|el| el == current)?;
                path.push(index);
                break;
            }
        }
    }
    path.reverse();
    Some(path)
}

fn follow<'a>(root: NodeRef<'a, Node>, path: &[usize]) -> Option<NodeRef<'a, Node>> {
    path.iter().try_fold(root, |node, &index| {
        node.children().filter(|child| child.value().is_element()).nth(index)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    const PAGE: &str = r#"<html><head><title>Shop</title></head><body>
        <ul id="items">
          <li class="item" data-price="3">Apple</li>
          <li class="item sale" data-price="5">Banana</li>
          <li class="item" data-price="8">Cherry <!-- ripe --></li>
        </ul>
        <p id="after">Total</p>
        </body></html>"#;

    fn eval(expr: &str) -> Vec<String> {
        let doc = Html::parse_document(PAGE);
        XPath::parse(expr)
            .unwrap()
            .select(doc.tree.root())
            .unwrap()
            .into_iter()
            .map(|hit| match hit {
                XPathHit::Node(node) => node
                    .value()
                    .as_element()
                    .map(|el| format!("<{}>", el.name()))
                    .unwrap_or_else(|| "#document".to_string()),
                XPathHit::Text(text) => text,
            })
            .collect()
    }

    #[test]
    fn descendant_paths_and_positions() {
        assert_eq!(eval("//li"), vec!["<li>", "<li>", "<li>"]);
        assert_eq!(eval("//li[2]/text()"), vec!["Banana"]);
        assert_eq!(eval("//li[last()]/@data-price"), vec!["8"]);
        assert_eq!(eval("(//li)[position() < 3]/@data-price"), vec!["3", "5"]);
    }

    #[test]
    fn attribute_predicates() {
        assert_eq!(eval("//li[@data-price > 4]/text()"), vec!["Banana", "Cherry "]);
        assert_eq!(eval("//li[contains(@class, 'sale')]/text()"), vec!["Banana"]);
        assert_eq!(eval("//*[@id='after']/text()"), vec!["Total"]);
    }

    #[test]
    fn axes() {
        assert_eq!(eval("//li[1]/following-sibling::li/@data-price"), vec!["5", "8"]);
        assert_eq!(eval("//li[3]/preceding-sibling::li[1]/text()"), vec!["Banana"]);
        assert_eq!(eval("//li[1]/ancestor::ul/@id"), vec!["items"]);
        assert_eq!(eval("//li[1]/../@id"), vec!["items"]);
        assert_eq!(eval("//ul/following::p/@id"), vec!["after"]);
        assert_eq!(eval("//li[3]/comment()"), vec![" ripe "]);
    }

    #[test]
    fn unions_are_in_document_order() {
        assert_eq!(eval("//p | //title"), vec!["<title>", "<p>"]);
    }

    #[test]
    fn scalar_results() {
        assert_eq!(eval("count(//li)"), vec!["3"]);
        assert_eq!(eval("string(//title)"), vec!["Shop"]);
        assert_eq!(eval("sum(//li/@data-price)"), vec!["16"]);
        assert_eq!(eval("normalize-space(//li[3])"), vec!["Cherry"]);
        assert_eq!(eval("substring('abcdef', 2, 3)"), vec!["bcd"]);
        assert_eq!(eval("not(//table)"), vec!["true"]);
    }

    #[test]
    fn root_path_selects_document() {
        assert_eq!(eval("/"), vec!["#document"]);
        assert_eq!(eval("/html/head/title/text()"), vec!["Shop"]);
    }

    #[test]
    fn element_context_scopes_relative_paths() {
        let doc = Html::parse_document(PAGE);
        let list = doc
            .tree
            .root()
            .descendants()
            .find(|n| n.value().as_element().is_some_and(|el| el.id() == Some("items")))
            .unwrap();

        let hits = XPath::parse("li[@data-price < 6]/text()").unwrap().select(list).unwrap();
        let texts: Vec<String> = hits
            .into_iter()
            .filter_map(|hit| match hit {
                XPathHit::Text(text) => Some(text),
                XPathHit::Node(_) => None,
            })
            .collect();
        assert_eq!(texts, vec!["Apple", "Banana"]);
    }

    #[test]
    fn element_hits_map_back_to_the_source_tree() {
        let doc = Html::parse_document(PAGE);
        let hits = XPath::parse("//li[@data-price='5']").unwrap().select(doc.tree.root()).unwrap();
        let [XPathHit::Node(node)] = hits.as_slice() else {
            panic!("expected one element");
        };
        let el = scraper::ElementRef::wrap(*node).unwrap();
        assert_eq!(el.text().collect::<String>(), "Banana");
    }

    #[test]
    fn unknown_functions_fail_at_evaluation() {
        let doc = Html::parse_document(PAGE);
        let xpath = XPath::parse("frobnicate(//li)").unwrap();
        assert!(matches!(
            xpath.select(doc.tree.root()),
            Err(HtmlSessionError::XPath { .. })
        ));
    }

    #[test]
    fn parse_errors_name_the_expression() {
        let err = XPath::parse("//li[").unwrap_err();
        assert!(err.to_string().contains("//li["));
    }
}
