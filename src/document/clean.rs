//! Strip active content from markup with a streaming lol_html pass.
//!
//! Removes `<script>`, `<style>`, comments and inline `on*` event handler
//! attributes; everything else is passed through untouched.

use lol_html::{HtmlRewriter, Settings, comments, element};

use crate::error::{HtmlSessionError, Result};

/// Return `html` with scripts, styles, comments and event handlers removed
pub fn clean_html(html: &str) -> Result<String> {
    let mut output = Vec::with_capacity(html.len());

    let mut rewriter = HtmlRewriter::new(
        Settings {
            element_content_handlers: vec![
                element!("script, style", |el| {
                    el.remove();
                    Ok(())
                }),
                element!("*", |el| {
                    let handlers: Vec<String> = el
                        .attributes()
                        .iter()
                        .map(|attr| attr.name())
                        .filter(|name| name.starts_with("on"))
                        .collect();
                    for name in handlers {
                        el.remove_attribute(&name);
                    }
                    Ok(())
                }),
                comments!("*", |comment| {
                    comment.remove();
                    Ok(())
                }),
            ],
            ..Settings::default()
        },
        |chunk: &[u8]| output.extend_from_slice(chunk),
    );

    rewriter
        .write(html.as_bytes())
        .map_err(|e| HtmlSessionError::Other(format!("Failed to clean HTML: {e}")))?;
    rewriter
        .end()
        .map_err(|e| HtmlSessionError::Other(format!("Failed to finalize cleaned HTML: {e}")))?;

    log::trace!("Cleaned {} bytes of HTML into {}", html.len(), output.len());

    String::from_utf8(output)
        .map_err(|e| HtmlSessionError::Other(format!("Cleaned HTML is not UTF-8: {e}")))
}
