//! Shared configuration constants for html sessions
//!
//! Default values used by documents, sessions and the render loop, kept
//! in one place to avoid magic numbers.

use std::time::Duration;

/// Fallback encoding when neither the transport nor the markup declares one
pub const DEFAULT_ENCODING: &str = "utf-8";

/// Placeholder URL for documents built from an in-memory string
///
/// Rendering a page with this URL never navigates; the in-memory HTML is
/// injected instead.
pub const DEFAULT_URL: &str = "https://example.org/";

/// User agent sent when the session spoofs a browser
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_12_6) AppleWebKit/603.3.8 (KHTML, like Gecko) Version/10.1.2 Safari/603.3.8";

/// Anchor text fragments that mark a pagination link
pub const DEFAULT_NEXT_MARKERS: [&str; 3] = ["next", "more", "older"];

/// Chromium arguments passed when the caller supplies none
pub const DEFAULT_BROWSER_ARGS: [&str; 1] = ["--no-sandbox"];

/// Render attempts before giving up
pub const DEFAULT_RENDER_RETRIES: u32 = 8;

/// Pause after opening a tab, before navigation
pub const DEFAULT_RENDER_WAIT: Duration = Duration::from_millis(200);

/// Navigation budget for a single render attempt
pub const DEFAULT_RENDER_TIMEOUT: Duration = Duration::from_secs(8);

/// Worker pool size per available core for async sessions
pub const WORKERS_PER_CORE: usize = 5;

/// Bytes inspected when sniffing `<meta charset>`
pub const ENCODING_SNIFF_LIMIT: usize = 1024;
