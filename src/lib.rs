//! HTML sessions: fetch pages, query them with CSS, XPath and search
//! templates, follow pagination and render JavaScript with headless Chromium.

pub mod browser;
pub mod document;
pub mod error;
pub mod page;
pub mod render;
pub mod session;
pub mod utils;
pub mod xpath;

pub use browser::{
    BrowserLauncher, BrowserManager, BrowserTab, ChromiumLauncher, CookieRecord, HeadlessBrowser,
    LaunchOptions,
};
pub use document::{Document, Element, FindOptions, HtmlQuery, SearchMatch, Template, XPathItem};
pub use error::{HtmlSessionError, Result};
pub use page::{NextPage, Page, Pages};
pub use render::RenderOptions;
pub use session::{
    AsyncHtmlSession, HtmlResponse, HtmlSession, RequestParams, RotatingUserAgent, SessionBuilder,
    SessionConfig, SessionCookieJar, SessionState, StaticUserAgent, UserAgentProvider,
};
pub use utils::constants::{DEFAULT_ENCODING, DEFAULT_NEXT_MARKERS, DEFAULT_URL, DEFAULT_USER_AGENT};

// Re-exported so callers can name request methods and headers
pub use reqwest::Method;
pub use reqwest::header;
