//! Character encoding resolution for raw HTML bytes.
//!
//! Priority: byte order mark, then the charset declared by the transport,
//! then `<meta charset>` / `http-equiv` in the head of the document, then
//! the caller's default.

use encoding_rs::{Encoding, UTF_8};
use once_cell::sync::Lazy;
use regex::bytes::Regex;

use crate::utils::constants::ENCODING_SNIFF_LIMIT;

static META_CHARSET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<meta[^>]+charset\s*=\s*["']?\s*([a-z0-9_:.\-]+)"#)
        .expect("Invalid meta charset regex")
});

/// Look up an encoding by WHATWG label, e.g. `"utf-8"` or `"latin1"`
#[must_use]
pub fn lookup(label: &str) -> Option<&'static Encoding> {
    Encoding::for_label(label.trim().as_bytes())
}

/// Same as [`lookup`], falling back to UTF-8 for unknown labels
#[must_use]
pub fn lookup_or_utf8(label: &str) -> &'static Encoding {
    lookup(label).unwrap_or_else(|| {
        log::debug!("Unknown encoding label '{label}', using utf-8");
        UTF_8
    })
}

/// Resolve the encoding of `raw`
#[must_use]
pub fn sniff(
    raw: &[u8],
    declared: Option<&'static Encoding>,
    default: &'static Encoding,
) -> &'static Encoding {
    if let Some((encoding, _bom_len)) = Encoding::for_bom(raw) {
        log::trace!("Encoding from BOM: {}", encoding.name());
        return encoding;
    }

    if let Some(encoding) = declared {
        return encoding;
    }

    if let Some(encoding) = meta_charset(raw) {
        log::trace!("Encoding from <meta>: {}", encoding.name());
        return encoding;
    }

    default
}

fn meta_charset(raw: &[u8]) -> Option<&'static Encoding> {
    let head = &raw[..raw.len().min(ENCODING_SNIFF_LIMIT)];
    let caps = META_CHARSET.captures(head)?;
    let label = caps.get(1)?.as_bytes();
    Encoding::for_label(label)
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::{UTF_16LE, WINDOWS_1252};

    #[test]
    fn bom_beats_everything() {
        let raw = b"\xFF\xFEh\0i\0";
        assert_eq!(sniff(raw, Some(WINDOWS_1252), UTF_8), UTF_16LE);
    }

    #[test]
    fn declared_beats_meta() {
        let raw = br#"<html><head><meta charset="iso-8859-1"></head></html>"#;
        assert_eq!(sniff(raw, Some(UTF_8), UTF_8), UTF_8);
    }

    #[test]
    fn meta_charset_is_detected() {
        let raw = br#"<html><head><meta charset="iso-8859-1"></head></html>"#;
        assert_eq!(sniff(raw, None, UTF_8), WINDOWS_1252);
    }

    #[test]
    fn http_equiv_is_detected() {
        let raw = br#"<meta http-equiv="Content-Type" content="text/html; charset=windows-1252">"#;
        assert_eq!(sniff(raw, None, UTF_8), WINDOWS_1252);
    }

    #[test]
    fn falls_back_to_default() {
        assert_eq!(sniff(b"<p>plain</p>", None, UTF_8), UTF_8);
    }

    #[test]
    fn unknown_label_is_utf8() {
        assert_eq!(lookup_or_utf8("not-a-charset"), UTF_8);
        assert_eq!(lookup_or_utf8(" Latin1 "), WINDOWS_1252);
    }
}
