//! Error types for session, document and render operations
//!
//! Every public operation returns [`HtmlSessionError`]. Render failures are
//! split into the fatal timeout case and the transient case that the retry
//! loop absorbs.

use std::time::Duration;
use thiserror::Error;

/// Result type alias for html session operations
pub type Result<T> = std::result::Result<T, HtmlSessionError>;

/// Error types for html session operations
#[derive(Debug, Error)]
pub enum HtmlSessionError {
    /// API used in a context it cannot work in (e.g. blocking inside a runtime)
    #[error("Usage error: {0}")]
    Usage(String),

    /// Session was closed or dropped before the call
    #[error("Session is closed")]
    SessionClosed,

    /// Headless browser could not be started
    #[error("Failed to launch headless browser: {0}")]
    BrowserLaunch(String),

    /// Navigation of a single render attempt exceeded its budget
    #[error("Rendering the page took longer than {timeout:?}. Consider increasing the timeout.")]
    RenderTimeout { timeout: Duration },

    /// One render attempt failed for a reason worth retrying
    #[error("Render attempt failed: {0}")]
    TransientRender(String),

    /// Every render attempt finished without producing content
    #[error("Unable to render the page after {attempts} attempts. Try increasing the timeout.")]
    MaxRetriesExceeded { attempts: u32 },

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Malformed URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// CSS selector failed to parse
    #[error("Invalid CSS selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// XPath expression failed to parse
    #[error("Invalid XPath expression '{expression}': {message}")]
    XPath { expression: String, message: String },

    /// Search template failed to compile
    #[error("Invalid search template '{template}': {message}")]
    Template { template: String, message: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for HtmlSessionError {
    fn from(error: anyhow::Error) -> Self {
        // {:#} keeps the context chain
        HtmlSessionError::Other(format!("{error:#}"))
    }
}

impl HtmlSessionError {
    /// Check if the error is absorbed by the render retry loop
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, HtmlSessionError::TransientRender(_))
    }

    /// Check if the error is a render navigation timeout
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, HtmlSessionError::RenderTimeout { .. })
    }

    pub(crate) fn usage(message: impl Into<String>) -> Self {
        HtmlSessionError::Usage(message.into())
    }
}
