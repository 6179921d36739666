//! Fetch a page, render it in headless Chromium and list what changed
//!
//! Usage: cargo run --example render_page -- <URL>
//! Example: cargo run --example render_page -- https://quotes.toscrape.com/js/

use kodegen_tools_htmlsession::{AsyncHtmlSession, FindOptions, HtmlQuery, RenderOptions};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,chromiumoxide::conn=off,chromiumoxide::handler=off")),
        )
        .init();

    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "https://quotes.toscrape.com/js/".to_string());

    let session = AsyncHtmlSession::new()?;
    let mut page = session.get(&url).await?.into_page();
    let before = page.absolute_links();
    tracing::info!("Fetched {url}: {} links before rendering", before.len());

    let dimensions = page
        .arender(
            RenderOptions::default()
                .with_script("() => ({ width: innerWidth, height: innerHeight })")
                .with_scrolldown(2),
        )
        .await?;
    tracing::info!("Viewport reported by script: {dimensions:?}");

    let after = page.absolute_links();
    tracing::info!("{} links after rendering", after.len());
    for link in after.difference(&before) {
        tracing::info!("  + {link}");
    }

    if let Some(next) = page.next_async(false, None).await? {
        tracing::info!("Next page: {:?}", next.as_url());
    }

    for quote in page.find(".quote .text", &FindOptions::default())?.iter().take(3) {
        tracing::info!("{}", quote.text());
    }

    session.close().await?;
    Ok(())
}
