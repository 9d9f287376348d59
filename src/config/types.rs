//! Configuration types
//!
//! `RunConfig` is read-only to the rest of the crate once parsed; every field
//! is already validated and defaulted by [`super::parse_run_input`].

use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// Fetch engine variants, in the order the resolver prefers them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineKind {
    /// Stealth browser build, only usable when the deployment provides it
    #[serde(rename = "camoufox")]
    Camoufox,
    /// Standard automated browser
    #[serde(rename = "playwright")]
    Playwright,
    /// Plain HTTP GET, no rendering
    #[serde(rename = "http:fast")]
    HttpFast,
}

impl EngineKind {
    /// Wire name used in events, ack metadata, and dataset records
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineKind::Camoufox => "camoufox",
            EngineKind::Playwright => "playwright",
            EngineKind::HttpFast => "http:fast",
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Domain policy for discovered links
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScopeMode {
    /// No domain restriction
    #[serde(rename = "anyDomain")]
    AnyDomain,
    /// Exact hostname match against any start URL
    #[serde(rename = "sameHostname")]
    SameHostname,
    /// Start hostnames plus subdomains of their registrable domains
    #[serde(rename = "sameDomainSubdomains")]
    SameDomainSubdomains,
    /// Explicit hostname allowlist (subdomains included)
    #[serde(rename = "customAllowlist")]
    CustomAllowlist,
}

impl ScopeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScopeMode::AnyDomain => "anyDomain",
            ScopeMode::SameHostname => "sameHostname",
            ScopeMode::SameDomainSubdomains => "sameDomainSubdomains",
            ScopeMode::CustomAllowlist => "customAllowlist",
        }
    }
}

impl fmt::Display for ScopeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Markdown conversion mode for extracted content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HtmlTransformer {
    /// Skip markdown entirely
    #[serde(rename = "none")]
    None,
    /// Convert only the main/article region when one exists
    #[serde(rename = "readable")]
    Readable,
    /// Convert the whole cleaned body
    #[serde(rename = "markdown")]
    Markdown,
}

impl HtmlTransformer {
    pub fn as_str(&self) -> &'static str {
        match self {
            HtmlTransformer::None => "none",
            HtmlTransformer::Readable => "readable",
            HtmlTransformer::Markdown => "markdown",
        }
    }
}

impl fmt::Display for HtmlTransformer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated per-run configuration
///
/// Field defaults and accepted ranges are documented in the parser; budgets
/// (`max_*`) are enforced by the stop policy and the per-item checks, never
/// here.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Seed URLs; the queue is pre-seeded with these by the orchestrator
    pub start_urls: Vec<Url>,
    pub crawler_type: EngineKind,
    pub scope_mode: ScopeMode,
    /// Hostname allowlist, only consulted for `ScopeMode::CustomAllowlist`
    pub allowed_domains: Vec<String>,
    pub include_globs: Vec<String>,
    pub exclude_globs: Vec<String>,
    pub max_depth: u32,
    pub max_pages: u64,
    pub max_results: u64,
    pub max_runtime_seconds: u64,
    pub max_idle_cycles: u32,
    pub respect_robots: bool,
    pub wait_for_dynamic_content_seconds: f64,
    /// CSS selector to await after navigation; empty string disables the wait
    pub wait_for_selector: String,
    pub click_selectors: Vec<String>,
    pub remove_cookie_warnings: bool,
    pub remove_navigation_elements: bool,
    pub html_transformer: HtmlTransformer,
    pub remove_css_selectors: Vec<String>,
    pub keep_css_selectors: Vec<String>,
    pub include_image_links: bool,
    pub include_audio_links: bool,
    pub include_video_links: bool,
    pub save_html: bool,
    pub save_markdown: bool,
    pub save_text: bool,
}

#[cfg(test)]
impl RunConfig {
    /// All defaults plus a single start URL, for unit tests
    pub(crate) fn default_for_tests() -> Self {
        Self {
            start_urls: vec![Url::parse("https://example.com/").unwrap()],
            crawler_type: EngineKind::Camoufox,
            scope_mode: ScopeMode::SameDomainSubdomains,
            allowed_domains: Vec::new(),
            include_globs: Vec::new(),
            exclude_globs: Vec::new(),
            max_depth: 20,
            max_pages: 500,
            max_results: 50_000,
            max_runtime_seconds: 3600,
            max_idle_cycles: 3,
            respect_robots: true,
            wait_for_dynamic_content_seconds: 2.0,
            wait_for_selector: String::new(),
            click_selectors: Vec::new(),
            remove_cookie_warnings: true,
            remove_navigation_elements: true,
            html_transformer: HtmlTransformer::Markdown,
            remove_css_selectors: Vec::new(),
            keep_css_selectors: Vec::new(),
            include_image_links: false,
            include_audio_links: false,
            include_video_links: false,
            save_html: false,
            save_markdown: true,
            save_text: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_kind_wire_names() {
        assert_eq!(EngineKind::Camoufox.as_str(), "camoufox");
        assert_eq!(EngineKind::Playwright.as_str(), "playwright");
        assert_eq!(EngineKind::HttpFast.to_string(), "http:fast");
    }

    #[test]
    fn test_scope_mode_wire_names() {
        assert_eq!(ScopeMode::AnyDomain.as_str(), "anyDomain");
        assert_eq!(ScopeMode::SameHostname.as_str(), "sameHostname");
        assert_eq!(ScopeMode::CustomAllowlist.to_string(), "customAllowlist");
    }

    #[test]
    fn test_serde_names_match_wire_names() {
        let parsed: EngineKind = serde_json::from_str("\"http:fast\"").unwrap();
        assert_eq!(parsed, EngineKind::HttpFast);
        assert_eq!(
            serde_json::to_string(&HtmlTransformer::Readable).unwrap(),
            "\"readable\""
        );
        assert!(serde_json::from_str::<ScopeMode>("\"same-domain\"").is_err());
    }
}
