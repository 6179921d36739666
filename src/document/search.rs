//! Template search over document text.
//!
//! Templates are literal text with `{}` placeholders, e.g.
//! `"Python is a {} language"`. Placeholders may be named (`{lang}`) and
//! may carry a format spec (`{:d}`, `{count:d}`, `{word:w}`). `{{` and `}}`
//! match literal braces. Matching ignores case and lets `.` span newlines.

use std::collections::HashMap;
use std::ops::Index;

use regex::Regex;

use crate::error::{HtmlSessionError, Result};

/// A single template match
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchMatch {
    fixed: Vec<String>,
    named: HashMap<String, String>,
    span: (usize, usize),
}

impl SearchMatch {
    /// Values of the unnamed placeholders, in template order
    #[must_use]
    pub fn fixed(&self) -> &[String] {
        &self.fixed
    }

    /// Values of the named placeholders
    #[must_use]
    pub fn named(&self) -> &HashMap<String, String> {
        &self.named
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.named.get(name).map(String::as_str)
    }

    /// Byte range of the whole match within the searched text
    #[must_use]
    pub fn span(&self) -> (usize, usize) {
        self.span
    }
}

impl Index<usize> for SearchMatch {
    type Output = str;

    fn index(&self, index: usize) -> &str {
        &self.fixed[index]
    }
}

/// Compiled template
#[derive(Debug, Clone)]
pub struct Template {
    source: String,
    regex: Regex,
    /// Per capture group (in order): `Some(name)` for named placeholders
    groups: Vec<Option<String>>,
}

impl Template {
    pub fn compile(template: &str) -> Result<Self> {
        let err = |message: String| HtmlSessionError::Template {
            template: template.to_string(),
            message,
        };

        let mut pattern = String::from("(?is)");
        let mut groups = Vec::new();
        let mut literal = String::new();
        let mut chars = template.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let mut field = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some(ch) => field.push(ch),
                            None => return Err(err("unterminated '{'".to_string())),
                        }
                    }

                    pattern.push_str(&regex::escape(&literal));
                    literal.clear();

                    let (name, spec) = field.split_once(':').unwrap_or((field.as_str(), ""));
                    let name = name.trim();
                    let body = spec_pattern(spec.trim());

                    if name.is_empty() {
                        pattern.push_str(&format!("({body})"));
                        groups.push(None);
                    } else {
                        if !is_identifier(name) {
                            return Err(err(format!("invalid field name '{name}'")));
                        }
                        if groups.iter().any(|g| g.as_deref() == Some(name)) {
                            return Err(err(format!("field '{name}' used twice")));
                        }
                        pattern.push_str(&format!("(?P<{name}>{body})"));
                        groups.push(Some(name.to_string()));
                    }
                }
                '}' => return Err(err("single '}' must be escaped as '}}'".to_string())),
                other => literal.push(other),
            }
        }
        pattern.push_str(&regex::escape(&literal));

        let regex = Regex::new(&pattern).map_err(|e| err(e.to_string()))?;
        log::trace!("Compiled search template '{template}' to /{pattern}/");

        Ok(Self {
            source: template.to_string(),
            regex,
            groups,
        })
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// First match in `text`
    #[must_use]
    pub fn search(&self, text: &str) -> Option<SearchMatch> {
        self.regex.captures(text).map(|caps| self.to_match(&caps))
    }

    /// Every non-overlapping match in `text`
    #[must_use]
    pub fn search_all(&self, text: &str) -> Vec<SearchMatch> {
        self.regex
            .captures_iter(text)
            .map(|caps| self.to_match(&caps))
            .collect()
    }

    fn to_match(&self, caps: &regex::Captures<'_>) -> SearchMatch {
        let mut fixed = Vec::new();
        let mut named = HashMap::new();

        for (idx, group) in self.groups.iter().enumerate() {
            let value = caps
                .get(idx + 1)
                .map(|m| m.as_str().to_string())
                .unwrap_or_default();
            match group {
                Some(name) => {
                    named.insert(name.clone(), value);
                }
                None => fixed.push(value),
            }
        }

        let span = caps.get(0).map(|m| (m.start(), m.end())).unwrap_or((0, 0));
        SearchMatch { fixed, named, span }
    }
}

fn spec_pattern(spec: &str) -> &'static str {
    match spec {
        "d" => r"[-+]?\d+",
        "n" => r"[-+]?\d[\d,]*",
        "f" | "e" | "g" => r"[-+]?(?:\d+\.\d*|\.\d+|\d+)(?:[eE][-+]?\d+)?",
        "w" => r"\w+",
        "W" => r"\W+",
        "s" => r"\s+",
        "S" => r"\S+",
        "l" => r"[a-zA-Z]+",
        _ => r".+?",
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unnamed_placeholder_matches_lazily() {
        let tpl = Template::compile("Python is a {} language").unwrap();
        let m = tpl
            .search("Python is a programming language that lets you work quickly")
            .unwrap();
        assert_eq!(&m[0], "programming");
    }

    #[test]
    fn search_is_case_insensitive() {
        let tpl = Template::compile("python IS a {} language").unwrap();
        assert!(tpl.search("Python is a programming language").is_some());
    }

    #[test]
    fn named_and_typed_fields() {
        let tpl = Template::compile("{name:w} has {count:d} items").unwrap();
        let m = tpl.search("cart has 42 items").unwrap();
        assert_eq!(m.get("name"), Some("cart"));
        assert_eq!(m.get("count"), Some("42"));
        assert!(m.fixed().is_empty());
    }

    #[test]
    fn search_all_finds_every_occurrence() {
        let tpl = Template::compile("<b>{}</b>").unwrap();
        let found: Vec<String> = tpl
            .search_all("<b>one</b> and <b>two</b>")
            .into_iter()
            .map(|m| m[0].to_string())
            .collect();
        assert_eq!(found, vec!["one", "two"]);
    }

    #[test]
    fn escaped_braces_are_literal() {
        let tpl = Template::compile("{{{}}}").unwrap();
        assert_eq!(&tpl.search("x {inner} y").unwrap()[0], "inner");
    }

    #[test]
    fn malformed_templates_are_rejected() {
        assert!(Template::compile("open {").is_err());
        assert!(Template::compile("close }").is_err());
        assert!(Template::compile("{a} {a}").is_err());
        assert!(Template::compile("{1bad}").is_err());
    }
}
