//! Pagination-aware link discovery
//!
//! This module walks a page's anchors and decides which belong on the
//! crawl frontier:
//! - Candidate normalization (resolve, fragment strip, http(s) only)
//! - Scope acceptance plus include/exclude glob filters
//! - Pagination scoring: `rel="next"` anchors first, then anchors whose
//!   text or href looks like pagination, then everything else
//! - First occurrence wins, output capped at 1000

use std::collections::HashSet;

use regex::Regex;
use scraper::{Html, Selector};
use url::Url;

use crate::link::{matches_any, normalize_link, UrlGlob};

/// Priority for anchors explicitly marked `rel="next"`
const PRIORITY_REL_NEXT: u8 = 95;
/// Priority for anchors that look like pagination
const PRIORITY_PAGINATION: u8 = 80;
/// Priority for everything else
const PRIORITY_DEFAULT: u8 = 50;

/// Cap on frontier candidates per page
const MAX_DISCOVERED: usize = 1000;

/// Query-parameter shape that marks a pagination href
const PAGE_PARAM_PATTERN: &str = r"(?i)[?&]page=\d+";

/// A frontier candidate with its pagination priority
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredLink {
    pub url: String,
    pub priority: u8,
}

/// Collects frontier candidates from a page's anchors.
///
/// Candidates resolve against `base_url` and must pass the scope
/// predicate, no exclude glob, and (when any are configured) at least
/// one include glob. The first occurrence of a URL wins; later
/// occurrences never change its priority.
pub fn discover_links(
    html: &str,
    base_url: &Url,
    include_globs: &[UrlGlob],
    exclude_globs: &[UrlGlob],
    in_scope: impl Fn(&Url) -> bool,
) -> Vec<DiscoveredLink> {
    let document = Html::parse_document(html);
    let mut frontier = Frontier {
        base_url,
        include_globs,
        exclude_globs,
        in_scope: &in_scope,
        seen: HashSet::new(),
        links: Vec::new(),
    };

    // rel="next" anchors first so their high priority wins the dedupe.
    if let Ok(selector) = Selector::parse("a[rel='next']") {
        for element in document.select(&selector) {
            if let Some(href) = element.value().attr("href") {
                frontier.push(href, PRIORITY_REL_NEXT);
            }
        }
    }

    let page_param = Regex::new(PAGE_PARAM_PATTERN).ok();
    if let Ok(selector) = Selector::parse("a[href]") {
        for element in document.select(&selector) {
            let href = element.value().attr("href").unwrap_or_default().trim();
            let text = element.text().collect::<String>().to_lowercase();
            let paginated = text.contains("next")
                || text.contains("older")
                || page_param
                    .as_ref()
                    .map(|regex| regex.is_match(href))
                    .unwrap_or(false);
            let priority = if paginated {
                PRIORITY_PAGINATION
            } else {
                PRIORITY_DEFAULT
            };
            frontier.push(href, priority);
        }
    }

    frontier.links.truncate(MAX_DISCOVERED);
    frontier.links
}

struct Frontier<'a> {
    base_url: &'a Url,
    include_globs: &'a [UrlGlob],
    exclude_globs: &'a [UrlGlob],
    in_scope: &'a dyn Fn(&Url) -> bool,
    seen: HashSet<String>,
    links: Vec<DiscoveredLink>,
}

impl Frontier<'_> {
    fn push(&mut self, href: &str, priority: u8) {
        if let Some(resolved) = normalize_link(self.base_url, href) {
            let url = resolved.to_string();
            if self.seen.contains(&url) {
                return;
            }
            if !(self.in_scope)(&resolved) {
                return;
            }
            if matches_any(&url, self.exclude_globs) {
                return;
            }
            if !self.include_globs.is_empty() && !matches_any(&url, self.include_globs) {
                return;
            }
            self.seen.insert(url.clone());
            self.links.push(DiscoveredLink { url, priority });
        }
    }
}
