//! Text extraction over parsed trees.

use ego_tree::NodeRef;
use ego_tree::iter::Edge;
use scraper::Node;

/// Elements that start a new line in rendered text
const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "caption", "dd", "div", "dl", "dt",
    "fieldset", "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6",
    "header", "hr", "li", "main", "nav", "ol", "p", "pre", "section", "table", "tbody", "td",
    "tfoot", "th", "thead", "title", "tr", "ul",
];

/// Elements whose text never shows up on screen
const HIDDEN_TAGS: &[&str] = &["script", "style", "noscript", "template"];

/// Concatenation of every text node below `node`, untouched
pub fn full_text(node: NodeRef<'_, Node>) -> String {
    node.descendants()
        .filter_map(|n| n.value().as_text().map(|t| &**t))
        .collect()
}

/// Text as a reader would see it
///
/// Whitespace runs collapse to one space, block-level elements break lines,
/// blank lines are dropped and script/style content is skipped.
pub fn visible_text(node: NodeRef<'_, Node>) -> String {
    let mut raw = String::new();
    let mut hidden_depth = 0usize;

    for edge in node.traverse() {
        match edge {
            Edge::Open(n) => match n.value() {
                Node::Element(el) if HIDDEN_TAGS.contains(&el.name()) => hidden_depth += 1,
                Node::Element(el) if BLOCK_TAGS.contains(&el.name()) => raw.push('\n'),
                Node::Text(text) if hidden_depth == 0 => {
                    raw.extend(text.chars().map(|c| if c.is_whitespace() { ' ' } else { c }));
                }
                _ => {}
            },
            Edge::Close(n) => match n.value() {
                Node::Element(el) if HIDDEN_TAGS.contains(&el.name()) => {
                    hidden_depth = hidden_depth.saturating_sub(1);
                }
                Node::Element(el) if BLOCK_TAGS.contains(&el.name()) => raw.push('\n'),
                _ => {}
            },
        }
    }

    squash_lines(&raw)
}

fn squash_lines(raw: &str) -> String {
    raw.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
