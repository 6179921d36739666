//! Session cookie store.
//!
//! Wraps an RFC 6265 [`cookie_store::CookieStore`] and installs it as
//! reqwest's cookie provider, so every response updates it and every request
//! reads from it. Renders take their browser cookies from the same store
//! through [`SessionCookieJar::records_for`].

use std::cmp::Reverse;

use cookie::{Cookie as RawCookie, SameSite};
use cookie_store::{Cookie, CookieDomain, CookieExpiration, CookieStore};
use parking_lot::RwLock;
use reqwest::header::HeaderValue;
use tracing::{debug, trace};
use url::Url;

use crate::browser::CookieRecord;
use crate::error::{HtmlSessionError, Result};

/// Cookies shared by a session's HTTP client and its renders
#[derive(Debug, Default)]
pub struct SessionCookieJar {
    store: RwLock<CookieStore>,
}

impl SessionCookieJar {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a cookie
    ///
    /// The record needs a domain; it is stored as if `https://{domain}{path}`
    /// had set it, so it also reaches subdomains.
    pub fn set(&self, record: CookieRecord) -> Result<()> {
        let domain = record.domain.trim_start_matches('.');
        if domain.is_empty() {
            return Err(HtmlSessionError::usage(format!(
                "cookie '{}' needs a domain to be stored",
                record.name
            )));
        }
        let url = Url::parse(&format!("https://{domain}{}", record.path))?;

        let mut raw = record_to_raw(&record, domain);
        if !admit_domain(&mut raw, &url) {
            return Err(HtmlSessionError::Other(format!(
                "cookie '{}' targets the public suffix '{domain}'",
                record.name
            )));
        }
        self.store
            .write()
            .insert_raw(&raw, &url)
            .map(|_| ())
            .map_err(|e| HtmlSessionError::Other(format!("cookie '{}' rejected: {e}", record.name)))
    }

    /// Every live cookie
    #[must_use]
    pub fn records(&self) -> Vec<CookieRecord> {
        self.store.read().iter_unexpired().map(to_record).collect()
    }

    /// Live cookies a request to `url` would carry
    #[must_use]
    pub fn records_for(&self, url: &Url) -> Vec<CookieRecord> {
        self.store.read().matches(url).into_iter().map(to_record).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.store.read().iter_unexpired().count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.store.write().clear();
    }
}

impl reqwest::cookie::CookieStore for SessionCookieJar {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        let mut store = self.store.write();
        for header in cookie_headers {
            let Ok(header) = header.to_str() else {
                continue;
            };
            let mut raw = match RawCookie::parse(header.to_owned()) {
                Ok(raw) => raw,
                Err(e) => {
                    debug!("Ignoring malformed Set-Cookie header: {e}");
                    continue;
                }
            };
            if !admit_domain(&mut raw, url) {
                continue;
            }
            match store.insert_raw(&raw, url) {
                Ok(action) => trace!(name = %raw.name(), %url, ?action, "Stored cookie"),
                Err(e) => debug!(name = %raw.name(), %url, "Rejected cookie: {e}"),
            }
        }
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        let store = self.store.read();
        let mut matching = store.matches(url);
        if matching.is_empty() {
            return None;
        }
        // Longer paths first
        matching.sort_by_key(|c| Reverse(cookie_path(c).len()));

        let header = matching
            .iter()
            .map(|c| format!("{}={}", c.name(), c.value()))
            .collect::<Vec<_>>()
            .join("; ");
        HeaderValue::from_str(&header).ok()
    }
}

/// Apply the public suffix rule of RFC 6265 5.3 step 5
///
/// A Domain attribute naming a public suffix is dropped when it equals the
/// request host and rejects the cookie otherwise.
fn admit_domain(raw: &mut RawCookie<'static>, url: &Url) -> bool {
    let Some(domain) = raw.domain().map(|d| d.trim_start_matches('.').to_ascii_lowercase()) else {
        return true;
    };
    if domain.is_empty() || !is_public_suffix(&domain) {
        return true;
    }

    if url.host_str().is_some_and(|host| host.eq_ignore_ascii_case(&domain)) {
        raw.unset_domain();
        true
    } else {
        debug!(%domain, %url, "Rejecting cookie for public suffix");
        false
    }
}

fn is_public_suffix(domain: &str) -> bool {
    psl::suffix(domain.as_bytes()).is_some_and(|suffix| suffix.is_known() && suffix == domain.as_bytes())
}

fn cookie_path<'a>(cookie: &'a Cookie<'static>) -> &'a str {
    &cookie.path
}

fn to_record(cookie: &Cookie<'static>) -> CookieRecord {
    let domain = match &cookie.domain {
        CookieDomain::Suffix(domain) => domain.clone(),
        _ => String::new(),
    };
    let expires = match &cookie.expires {
        CookieExpiration::AtUtc(at) => Some(at.unix_timestamp() as f64),
        CookieExpiration::SessionEnd => None,
    };

    CookieRecord {
        name: cookie.name().to_string(),
        value: cookie.value().to_string(),
        domain,
        path: cookie_path(cookie).to_string(),
        secure: cookie.secure().unwrap_or(false),
        http_only: cookie.http_only().unwrap_or(false),
        same_site: cookie.same_site().map(|s| s.to_string()),
        expires,
    }
}

fn record_to_raw(record: &CookieRecord, domain: &str) -> RawCookie<'static> {
    let mut builder = RawCookie::build((record.name.clone(), record.value.clone()))
        .domain(domain.to_string())
        .path(record.path.clone())
        .secure(record.secure)
        .http_only(record.http_only);

    let same_site = match record.same_site.as_deref().map(str::to_ascii_lowercase).as_deref() {
        Some("strict") => Some(SameSite::Strict),
        Some("lax") => Some(SameSite::Lax),
        Some("none") => Some(SameSite::None),
        _ => None,
    };
    if let Some(same_site) = same_site {
        builder = builder.same_site(same_site);
    }
    if let Some(at) = record
        .expires
        .and_then(|secs| cookie::time::OffsetDateTime::from_unix_timestamp(secs as i64).ok())
    {
        builder = builder.expires(at);
    }

    builder.build()
}
