//! URL resolution utilities.
//!
//! Implements the base-URL rules used by documents (`<base href>` first,
//! otherwise the page URL truncated to its directory) and browser-style
//! absolute link resolution on top of the `url` crate's RFC 3986 joining.

use url::Url;

use crate::error::Result;

/// Compute the base URL of a page
///
/// A non-empty `<base href>` wins (resolved against the page URL when it is
/// itself relative). Otherwise the page URL with its final path segment
/// dropped is used; query and fragment are kept.
pub fn base_url(page_url: &str, base_href: Option<&str>) -> Result<String> {
    if let Some(href) = base_href.map(str::trim)
        && !href.is_empty()
    {
        return match Url::parse(href) {
            Ok(_) => Ok(href.to_string()),
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                Ok(Url::parse(page_url)?.join(href)?.to_string())
            }
            Err(e) => Err(e.into()),
        };
    }

    directory_base(page_url)
}

/// Truncate the path of `page_url` to its directory
pub fn directory_base(page_url: &str) -> Result<String> {
    let mut url = Url::parse(page_url)?;
    if url.cannot_be_a_base() {
        return Ok(page_url.to_string());
    }

    let path = url.path().to_string();
    let dir = match path.rfind('/') {
        Some(idx) => &path[..=idx],
        None => "/",
    };
    url.set_path(dir);

    Ok(url.to_string())
}

/// Resolve `link` against `base`
///
/// - no authority component → RFC 3986 join against the base
/// - authority but no scheme (`//host/path`) → the base's scheme is adopted
/// - otherwise the link is already absolute and returned as-is
pub fn make_absolute(base: &str, link: &str) -> Result<String> {
    let link = link.trim();

    match split_scheme(link) {
        Some((_, rest)) if rest.starts_with("//") => Ok(link.to_string()),
        None if link.starts_with("//") => {
            let base = Url::parse(base)?;
            Ok(format!("{}:{}", base.scheme(), link))
        }
        _ => Ok(Url::parse(base)?.join(link)?.to_string()),
    }
}

/// Split `scheme:rest` when `link` starts with a syntactically valid scheme
fn split_scheme(link: &str) -> Option<(&str, &str)> {
    let colon = link.find(':')?;
    let scheme = &link[..colon];
    let mut chars = scheme.chars();
    let first = chars.next()?;
    if !first.is_ascii_alphabetic()
        || !chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
    {
        return None;
    }
    Some((scheme, &link[colon + 1..]))
}

/// Links that never point at another document
#[must_use]
pub fn is_non_navigational(href: &str) -> bool {
    href.starts_with("javascript:") || href.starts_with("mailto:")
}
