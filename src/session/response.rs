//! HTTP responses wrapped with their parsed page

use std::time::Duration;

use encoding_rs::Encoding;
use reqwest::StatusCode;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde::de::DeserializeOwned;

use crate::document::{Document, HtmlQuery, encoding};
use crate::error::{HtmlSessionError, Result};
use crate::page::{Page, SessionLink};

/// Optional parts of an outgoing request
#[derive(Debug, Clone, Default)]
pub struct RequestParams {
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    /// Sent as `application/x-www-form-urlencoded`
    pub form: Option<Vec<(String, String)>>,
    pub json: Option<serde_json::Value>,
    pub body: Option<Vec<u8>>,
    /// Overrides the session-wide request timeout
    pub timeout: Option<Duration>,
}

impl RequestParams {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    #[must_use]
    pub fn with_form<I, K, V>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.form = Some(
            fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    #[must_use]
    pub fn with_json(mut self, json: serde_json::Value) -> Self {
        self.json = Some(json);
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Response to a session request
#[derive(Debug, Clone)]
pub struct HtmlResponse {
    status: StatusCode,
    headers: HeaderMap,
    url: String,
    content: Vec<u8>,
    declared: Option<&'static Encoding>,
    page: Page,
}

impl HtmlResponse {
    pub(crate) fn new(
        status: StatusCode,
        headers: HeaderMap,
        url: String,
        content: Vec<u8>,
        link: SessionLink,
    ) -> Self {
        let declared = declared_charset(&headers);
        let page = Page::new(
            Document::from_bytes(content.clone(), url.clone(), declared),
            link,
        );
        Self {
            status,
            headers,
            url,
            content,
            declared,
            page,
        }
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Final URL after redirects
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Body bytes as received
    #[must_use]
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// Charset named by `Content-Type`, if any
    #[must_use]
    pub fn declared_encoding(&self) -> Option<&'static Encoding> {
        self.declared
    }

    /// Encoding the body is decoded with
    #[must_use]
    pub fn encoding(&self) -> &'static Encoding {
        self.page.encoding()
    }

    /// Decoded body
    #[must_use]
    pub fn text(&self) -> &str {
        self.page.html()
    }

    #[must_use]
    pub fn html(&self) -> &Page {
        &self.page
    }

    pub fn html_mut(&mut self) -> &mut Page {
        &mut self.page
    }

    #[must_use]
    pub fn into_page(self) -> Page {
        self.page
    }

    /// Deserialize the body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.content)
            .map_err(|e| HtmlSessionError::Other(format!("Invalid JSON body from {}: {e}", self.url)))
    }
}

/// Encoding named by the `charset` parameter of `Content-Type`
fn declared_charset(headers: &HeaderMap) -> Option<&'static Encoding> {
    let content_type = headers.get(CONTENT_TYPE)?.to_str().ok()?;
    content_type
        .split(';')
        .skip(1)
        .find_map(|param| {
            let (key, value) = param.split_once('=')?;
            key.trim()
                .eq_ignore_ascii_case("charset")
                .then(|| value.trim().trim_matches('"'))
        })
        .and_then(encoding::lookup)
}
