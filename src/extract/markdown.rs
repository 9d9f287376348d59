//! Markdown rendering for cleaned documents
//!
//! Conversion runs over the already-cleaned tree, so scripts and chrome
//! never leak into the output. ATX headings and hyphen bullets match the
//! dataset contract.

use htmd::options::{BulletListMarker, HeadingStyle, Options};
use htmd::HtmlToMarkdown;
use scraper::{Html, Selector};
use tracing::debug;

use crate::config::HtmlTransformer;

/// Converts the cleaned document to markdown per the configured mode.
///
/// `Readable` narrows the source to the first `<main>`, else the first
/// `<article>`, else the whole body. Returns `None` for the `None` mode
/// and whenever the converted output is empty.
pub(crate) fn render_markdown(document: &Html, transformer: HtmlTransformer) -> Option<String> {
    if transformer == HtmlTransformer::None {
        return None;
    }

    let mut source = region_inner_html(document, "body").unwrap_or_default();
    if transformer == HtmlTransformer::Readable {
        if let Some(region) =
            region_inner_html(document, "main").or_else(|| region_inner_html(document, "article"))
        {
            source = region;
        }
    }
    if source.trim().is_empty() {
        return None;
    }

    let converter = HtmlToMarkdown::builder()
        .options(Options {
            heading_style: HeadingStyle::Atx,
            bullet_list_marker: BulletListMarker::Dash,
            ..Default::default()
        })
        .build();

    match converter.convert(&source) {
        Ok(markdown) => {
            let trimmed = markdown.trim().to_string();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed)
            }
        }
        Err(error) => {
            debug!(%error, "Markdown conversion failed");
            None
        }
    }
}

/// Inner markup of the first match, skipping empty regions.
fn region_inner_html(document: &Html, selector: &str) -> Option<String> {
    let parsed = Selector::parse(selector).ok()?;
    document
        .select(&parsed)
        .next()
        .map(|element| element.inner_html())
        .filter(|html| !html.trim().is_empty())
}
