//! Content extraction pipeline
//!
//! This module turns fetched HTML into the structured bundle a dataset
//! record carries:
//! - Title, meta description, and declared language (captured before any
//!   destructive edit)
//! - Cookie/consent banner and navigation chrome removal
//! - Custom remove/keep selector application with a per-selector log
//! - Outbound link capture and media link collection
//! - Cleaned HTML, flattened text, and optional markdown

mod markdown;
mod media;

pub use media::MediaLinks;

use scraper::{Html, Selector};
use serde_json::{json, Value};
use tracing::debug;
use url::Url;

use crate::config::{HtmlTransformer, RunConfig};

/// Tag recorded in every output record's metadata
pub const EXTRACTOR_TAG: &str = "leafcutter";

/// Attribute-substring heuristics for cookie/consent banners
const COOKIE_SELECTORS: &str = "[id*='cookie'],[class*='cookie'],[data-testid*='cookie'],[aria-label*='cookie' i],[id*='consent'],[class*='consent']";

/// Navigation chrome removed when the toggle is on
const NAVIGATION_SELECTORS: &str = "header,footer,nav,aside";

/// Elements that never contribute to text or markdown
const STRIP_SELECTORS: &str = "script,style,noscript,iframe,svg,canvas";

/// Cap on captured outbound links per page
const MAX_LINKS: usize = 1000;

/// Options bundle driving the extraction pipeline
#[derive(Debug, Clone)]
pub struct ExtractionOptions {
    pub remove_cookie_warnings: bool,
    pub remove_navigation_elements: bool,
    pub remove_css_selectors: Vec<String>,
    pub keep_css_selectors: Vec<String>,
    pub html_transformer: HtmlTransformer,
    pub include_image_links: bool,
    pub include_audio_links: bool,
    pub include_video_links: bool,
}

impl ExtractionOptions {
    pub fn from_config(config: &RunConfig) -> Self {
        Self {
            remove_cookie_warnings: config.remove_cookie_warnings,
            remove_navigation_elements: config.remove_navigation_elements,
            remove_css_selectors: config.remove_css_selectors.clone(),
            keep_css_selectors: config.keep_css_selectors.clone(),
            html_transformer: config.html_transformer,
            include_image_links: config.include_image_links,
            include_audio_links: config.include_audio_links,
            include_video_links: config.include_video_links,
        }
    }
}

/// Whether a logged selector removed matches or kept them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorAction {
    Remove,
    Keep,
}

/// Outcome of applying one configured remove/keep selector
#[derive(Debug, Clone)]
pub struct SelectorApplication {
    pub selector: String,
    pub action: SelectorAction,
    pub matched: usize,
    pub valid: bool,
}

/// Structured content pulled from one fetched page
#[derive(Debug, Clone)]
pub struct ExtractedContent {
    pub title: Option<String>,
    pub description: Option<String>,
    pub content_text: Option<String>,
    pub content_markdown: Option<String>,
    pub links: Vec<String>,
    pub language: Option<String>,
    pub cleaned_html: String,
    pub media_links: MediaLinks,
    pub metadata: Value,
    pub selector_log: Vec<SelectorApplication>,
}

/// Runs the extraction pipeline over one fetched page.
///
/// `source_url` is the leased URL, `final_url` the post-redirect URL the
/// content was served from; relative media references resolve against the
/// latter. The scope predicate decides which resolved media URLs are
/// kept. Selector failures are swallowed and logged, never fatal.
pub fn extract_content(
    html: &str,
    source_url: &str,
    final_url: &Url,
    options: &ExtractionOptions,
    in_scope: impl Fn(&Url) -> bool,
) -> ExtractedContent {
    let mut document = Html::parse_document(html);

    // Page metadata first, the cleanup below is destructive.
    let title = select_first_text(&document, "title")
        .map(|text| compact_text(&text))
        .filter(|text| !text.is_empty());
    let description = select_first_attr(&document, "meta[name='description']", "content")
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty());
    let language = select_first_attr(&document, "html", "lang")
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty());

    if options.remove_cookie_warnings {
        if let Ok(selector) = Selector::parse(COOKIE_SELECTORS) {
            detach_matches(&mut document, &selector);
        }
    }
    if options.remove_navigation_elements {
        if let Ok(selector) = Selector::parse(NAVIGATION_SELECTORS) {
            detach_matches(&mut document, &selector);
        }
    }

    let mut selector_log = Vec::new();
    for raw in &options.remove_css_selectors {
        match Selector::parse(raw) {
            Ok(selector) => {
                let matched = detach_matches(&mut document, &selector);
                debug!(selector = raw.as_str(), matched, "Applied removal selector");
                selector_log.push(SelectorApplication {
                    selector: raw.clone(),
                    action: SelectorAction::Remove,
                    matched,
                    valid: true,
                });
            }
            Err(_) => {
                debug!(selector = raw.as_str(), "Skipped invalid removal selector");
                selector_log.push(SelectorApplication {
                    selector: raw.clone(),
                    action: SelectorAction::Remove,
                    matched: 0,
                    valid: false,
                });
            }
        }
    }

    apply_keep_selectors(&mut document, &options.keep_css_selectors, &mut selector_log);

    // Raw outbound hrefs and media links come before the script strip so
    // that nothing the strip removes hides an anchor.
    let links = collect_raw_links(&document);
    let media_links = media::collect_media_links(&document, final_url, options, &in_scope);

    if let Ok(selector) = Selector::parse(STRIP_SELECTORS) {
        detach_matches(&mut document, &selector);
    }

    let cleaned_html = body_inner_html(&document).unwrap_or_default();
    let content_text = body_text(&document)
        .map(|text| compact_text(&text))
        .filter(|text| !text.is_empty());
    let content_markdown = markdown::render_markdown(&document, options.html_transformer);

    let metadata = json!({
        "source_url": source_url,
        "final_url": final_url.as_str(),
        "extractor": EXTRACTOR_TAG,
        "extracted_links": links.len(),
        "html_transformer": options.html_transformer.as_str(),
        "media_links": media_links.to_value(),
    });

    ExtractedContent {
        title,
        description,
        content_text,
        content_markdown,
        links,
        language,
        cleaned_html,
        media_links,
        metadata,
        selector_log,
    }
}

/// Reduces the body to only the elements the keep selectors match.
///
/// Fragments are collected per selector in document order, joined with
/// newlines, and re-parsed as the new body (the head survives for the
/// media collectors). No-op when no selector is given or none matches.
fn apply_keep_selectors(
    document: &mut Html,
    keep_selectors: &[String],
    log: &mut Vec<SelectorApplication>,
) {
    if keep_selectors.is_empty() {
        return;
    }

    let mut fragments = Vec::new();
    for raw in keep_selectors {
        match Selector::parse(raw) {
            Ok(selector) => {
                let mut matched = 0;
                for element in document.select(&selector) {
                    matched += 1;
                    fragments.push(element.html());
                }
                debug!(selector = raw.as_str(), matched, "Applied keep selector");
                log.push(SelectorApplication {
                    selector: raw.clone(),
                    action: SelectorAction::Keep,
                    matched,
                    valid: true,
                });
            }
            Err(_) => {
                debug!(selector = raw.as_str(), "Skipped invalid keep selector");
                log.push(SelectorApplication {
                    selector: raw.clone(),
                    action: SelectorAction::Keep,
                    matched: 0,
                    valid: false,
                });
            }
        }
    }

    let joined = fragments.join("\n");
    if joined.trim().is_empty() {
        return;
    }
    let head = select_first_html(document, "head").unwrap_or_default();
    *document = Html::parse_document(&format!("<html>{head}<body>{joined}</body></html>"));
}

/// Detaches every node matching `selector`, returning the match count.
fn detach_matches(document: &mut Html, selector: &Selector) -> usize {
    let ids: Vec<_> = document.select(selector).map(|element| element.id()).collect();
    let count = ids.len();
    for id in ids {
        if let Some(mut node) = document.tree.get_mut(id) {
            node.detach();
        }
    }
    count
}

/// Outbound anchor hrefs, trimmed and unresolved, in document order.
fn collect_raw_links(document: &Html) -> Vec<String> {
    let mut links = Vec::new();
    if let Ok(selector) = Selector::parse("a[href]") {
        for element in document.select(&selector) {
            if links.len() == MAX_LINKS {
                break;
            }
            if let Some(href) = element.value().attr("href") {
                let href = href.trim();
                if !href.is_empty() {
                    links.push(href.to_string());
                }
            }
        }
    }
    links
}

fn select_first_text(document: &Html, selector: &str) -> Option<String> {
    let parsed = Selector::parse(selector).ok()?;
    document
        .select(&parsed)
        .next()
        .map(|element| element.text().collect::<String>())
}

fn select_first_attr(document: &Html, selector: &str, attr: &str) -> Option<String> {
    let parsed = Selector::parse(selector).ok()?;
    document
        .select(&parsed)
        .next()
        .and_then(|element| element.value().attr(attr))
        .map(str::to_string)
}

fn select_first_html(document: &Html, selector: &str) -> Option<String> {
    let parsed = Selector::parse(selector).ok()?;
    document.select(&parsed).next().map(|element| element.html())
}

fn body_inner_html(document: &Html) -> Option<String> {
    let selector = Selector::parse("body").ok()?;
    document
        .select(&selector)
        .next()
        .map(|element| element.inner_html())
}

fn body_text(document: &Html) -> Option<String> {
    let selector = Selector::parse("body").ok()?;
    document
        .select(&selector)
        .next()
        .map(|element| element.text().collect::<String>())
}

/// Collapses whitespace runs to single spaces and trims.
fn compact_text(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}
