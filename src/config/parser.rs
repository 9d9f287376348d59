//! Run input parsing
//!
//! Turns the raw `input` JSON object from the bootstrap payload into a
//! [`RunConfig`]: unknown fields are rejected, absent fields take defaults,
//! present fields are type- and range-checked. Every violation is a
//! `ConfigError::Input` whose message names the offending field.

use serde_json::Value;
use url::Url;

use super::types::{EngineKind, HtmlTransformer, RunConfig, ScopeMode};
use crate::{ConfigError, ConfigResult};

const KNOWN_KEYS: &[&str] = &[
    "startUrls",
    "crawlerType",
    "scopeMode",
    "allowedDomains",
    "includeGlobs",
    "excludeGlobs",
    "maxDepth",
    "maxPages",
    "maxResults",
    "maxRuntimeSeconds",
    "maxIdleCycles",
    "respectRobots",
    "waitForDynamicContentSeconds",
    "waitForSelector",
    "clickSelectors",
    "removeCookieWarnings",
    "removeNavigationElements",
    "htmlTransformer",
    "removeCssSelectors",
    "keepCssSelectors",
    "includeImageLinks",
    "includeAudioLinks",
    "includeVideoLinks",
    "saveHtml",
    "saveMarkdown",
    "saveText",
];

/// Parses and validates the run input JSON
///
/// # Arguments
///
/// * `raw` - The `run.input` value from the bootstrap payload
///
/// # Returns
///
/// * `Ok(RunConfig)` - Fully defaulted, validated configuration
/// * `Err(ConfigError::Input)` - First violation encountered
pub fn parse_run_input(raw: &Value) -> ConfigResult<RunConfig> {
    let obj = match raw {
        Value::Object(map) => map,
        _ => {
            return Err(ConfigError::Input(
                "Input payload must be a JSON object".to_string(),
            ))
        }
    };

    for key in obj.keys() {
        if !KNOWN_KEYS.contains(&key.as_str()) {
            return Err(ConfigError::Input(format!("Unknown input field: {key}")));
        }
    }

    let start_urls = validate_start_urls(as_string_array(obj.get("startUrls"), "startUrls", true)?)?;

    let config = RunConfig {
        start_urls,
        crawler_type: as_enum(
            obj.get("crawlerType"),
            "crawlerType",
            &[
                ("camoufox", EngineKind::Camoufox),
                ("playwright", EngineKind::Playwright),
                ("http:fast", EngineKind::HttpFast),
            ],
            EngineKind::Camoufox,
        )?,
        scope_mode: as_enum(
            obj.get("scopeMode"),
            "scopeMode",
            &[
                ("anyDomain", ScopeMode::AnyDomain),
                ("sameHostname", ScopeMode::SameHostname),
                ("sameDomainSubdomains", ScopeMode::SameDomainSubdomains),
                ("customAllowlist", ScopeMode::CustomAllowlist),
            ],
            ScopeMode::SameDomainSubdomains,
        )?,
        allowed_domains: as_string_array(obj.get("allowedDomains"), "allowedDomains", false)?,
        include_globs: as_string_array(obj.get("includeGlobs"), "includeGlobs", false)?,
        exclude_globs: as_string_array(obj.get("excludeGlobs"), "excludeGlobs", false)?,
        max_depth: as_number(obj.get("maxDepth"), "maxDepth", 20.0, 0.0, 100.0, true)? as u32,
        max_pages: as_number(obj.get("maxPages"), "maxPages", 500.0, 1.0, 100_000.0, true)? as u64,
        max_results: as_number(
            obj.get("maxResults"),
            "maxResults",
            50_000.0,
            1.0,
            1_000_000.0,
            true,
        )? as u64,
        max_runtime_seconds: as_number(
            obj.get("maxRuntimeSeconds"),
            "maxRuntimeSeconds",
            3600.0,
            1.0,
            86_400.0,
            true,
        )? as u64,
        max_idle_cycles: as_number(obj.get("maxIdleCycles"), "maxIdleCycles", 3.0, 1.0, 100.0, true)?
            as u32,
        respect_robots: as_bool(obj.get("respectRobots"), "respectRobots", true)?,
        wait_for_dynamic_content_seconds: as_number(
            obj.get("waitForDynamicContentSeconds"),
            "waitForDynamicContentSeconds",
            2.0,
            0.0,
            60.0,
            false,
        )?,
        wait_for_selector: as_string(obj.get("waitForSelector"), "waitForSelector", "")?,
        click_selectors: as_string_array(obj.get("clickSelectors"), "clickSelectors", false)?,
        remove_cookie_warnings: as_bool(obj.get("removeCookieWarnings"), "removeCookieWarnings", true)?,
        remove_navigation_elements: as_bool(
            obj.get("removeNavigationElements"),
            "removeNavigationElements",
            true,
        )?,
        html_transformer: as_enum(
            obj.get("htmlTransformer"),
            "htmlTransformer",
            &[
                ("none", HtmlTransformer::None),
                ("readable", HtmlTransformer::Readable),
                ("markdown", HtmlTransformer::Markdown),
            ],
            HtmlTransformer::Markdown,
        )?,
        remove_css_selectors: as_string_array(
            obj.get("removeCssSelectors"),
            "removeCssSelectors",
            false,
        )?,
        keep_css_selectors: as_string_array(obj.get("keepCssSelectors"), "keepCssSelectors", false)?,
        include_image_links: as_bool(obj.get("includeImageLinks"), "includeImageLinks", false)?,
        include_audio_links: as_bool(obj.get("includeAudioLinks"), "includeAudioLinks", false)?,
        include_video_links: as_bool(obj.get("includeVideoLinks"), "includeVideoLinks", false)?,
        save_html: as_bool(obj.get("saveHtml"), "saveHtml", false)?,
        save_markdown: as_bool(obj.get("saveMarkdown"), "saveMarkdown", true)?,
        save_text: as_bool(obj.get("saveText"), "saveText", true)?,
    };

    if config.scope_mode == ScopeMode::CustomAllowlist && config.allowed_domains.is_empty() {
        return Err(ConfigError::Input(
            "allowedDomains must be provided when scopeMode is customAllowlist".to_string(),
        ));
    }

    Ok(config)
}

fn as_string_array(value: Option<&Value>, key: &str, required: bool) -> ConfigResult<Vec<String>> {
    let value = match value {
        None | Some(Value::Null) => {
            if required {
                return Err(ConfigError::Input(format!("{key} is required")));
            }
            return Ok(Vec::new());
        }
        Some(v) => v,
    };
    let items = value
        .as_array()
        .ok_or_else(|| ConfigError::Input(format!("{key} must be an array of strings")))?;
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        let text = item
            .as_str()
            .ok_or_else(|| ConfigError::Input(format!("{key} must contain only strings")))?;
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            out.push(trimmed.to_string());
        }
    }
    Ok(out)
}

fn as_bool(value: Option<&Value>, key: &str, fallback: bool) -> ConfigResult<bool> {
    match value {
        None | Some(Value::Null) => Ok(fallback),
        Some(Value::Bool(b)) => Ok(*b),
        Some(_) => Err(ConfigError::Input(format!("{key} must be a boolean"))),
    }
}

fn as_string(value: Option<&Value>, key: &str, fallback: &str) -> ConfigResult<String> {
    match value {
        None | Some(Value::Null) => Ok(fallback.to_string()),
        Some(Value::String(s)) => Ok(s.trim().to_string()),
        Some(_) => Err(ConfigError::Input(format!("{key} must be a string"))),
    }
}

fn as_number(
    value: Option<&Value>,
    key: &str,
    fallback: f64,
    min: f64,
    max: f64,
    integer: bool,
) -> ConfigResult<f64> {
    let number = match value {
        None | Some(Value::Null) => return Ok(fallback),
        Some(Value::String(s)) if s.is_empty() => return Ok(fallback),
        Some(Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| ConfigError::Input(format!("{key} must be a valid number")))?,
        Some(_) => {
            return Err(ConfigError::Input(format!("{key} must be a valid number")));
        }
    };
    if !number.is_finite() {
        return Err(ConfigError::Input(format!("{key} must be a valid number")));
    }
    if integer && number.fract() != 0.0 {
        return Err(ConfigError::Input(format!("{key} must be an integer")));
    }
    if number < min || number > max {
        return Err(ConfigError::Input(format!(
            "{key} must be between {min} and {max}"
        )));
    }
    Ok(number)
}

fn as_enum<T: Copy>(
    value: Option<&Value>,
    key: &str,
    pairs: &[(&str, T)],
    fallback: T,
) -> ConfigResult<T> {
    let raw = match value {
        None | Some(Value::Null) => return Ok(fallback),
        Some(Value::String(s)) if s.is_empty() => return Ok(fallback),
        Some(Value::String(s)) => s.as_str(),
        Some(_) => return Err(invalid_enum(key, pairs)),
    };
    pairs
        .iter()
        .find(|(name, _)| *name == raw)
        .map(|(_, variant)| *variant)
        .ok_or_else(|| invalid_enum(key, pairs))
}

fn invalid_enum<T>(key: &str, pairs: &[(&str, T)]) -> ConfigError {
    let allowed: Vec<&str> = pairs.iter().map(|(name, _)| *name).collect();
    ConfigError::Input(format!("{} must be one of: {}", key, allowed.join(", ")))
}

fn validate_start_urls(urls: Vec<String>) -> ConfigResult<Vec<Url>> {
    if urls.is_empty() {
        return Err(ConfigError::Input(
            "startUrls must contain at least one URL".to_string(),
        ));
    }
    urls.into_iter()
        .map(|raw| {
            Url::parse(&raw)
                .ok()
                .filter(|url| matches!(url.scheme(), "http" | "https"))
                .ok_or_else(|| ConfigError::Input(format!("Invalid URL in startUrls: {raw}")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_minimal_input_takes_defaults() {
        let config = parse_run_input(&json!({
            "startUrls": ["https://example.com/"]
        }))
        .unwrap();

        assert_eq!(config.start_urls.len(), 1);
        assert_eq!(config.crawler_type, EngineKind::Camoufox);
        assert_eq!(config.scope_mode, ScopeMode::SameDomainSubdomains);
        assert!(config.allowed_domains.is_empty());
        assert_eq!(config.max_depth, 20);
        assert_eq!(config.max_pages, 500);
        assert_eq!(config.max_results, 50_000);
        assert_eq!(config.max_runtime_seconds, 3600);
        assert_eq!(config.max_idle_cycles, 3);
        assert!(config.respect_robots);
        assert_eq!(config.wait_for_dynamic_content_seconds, 2.0);
        assert_eq!(config.wait_for_selector, "");
        assert_eq!(config.html_transformer, HtmlTransformer::Markdown);
        assert!(!config.save_html);
        assert!(config.save_markdown);
        assert!(config.save_text);
        assert!(!config.include_image_links);
        assert!(!config.include_audio_links);
        assert!(!config.include_video_links);
    }

    #[test]
    fn test_rejects_non_object_payload() {
        let err = parse_run_input(&json!(["https://example.com"])).unwrap_err();
        assert!(err.to_string().contains("must be a JSON object"));
    }

    #[test]
    fn test_rejects_unknown_field() {
        let err = parse_run_input(&json!({
            "startUrls": ["https://example.com"],
            "maxPagez": 10
        }))
        .unwrap_err();
        assert!(err.to_string().contains("Unknown input field: maxPagez"));
    }

    #[test]
    fn test_start_urls_required_and_validated() {
        let err = parse_run_input(&json!({})).unwrap_err();
        assert!(err.to_string().contains("startUrls is required"));

        let err = parse_run_input(&json!({ "startUrls": [] })).unwrap_err();
        assert!(err.to_string().contains("at least one URL"));

        let err = parse_run_input(&json!({ "startUrls": ["ftp://example.com"] })).unwrap_err();
        assert!(err
            .to_string()
            .contains("Invalid URL in startUrls: ftp://example.com"));

        let err = parse_run_input(&json!({ "startUrls": ["not a url"] })).unwrap_err();
        assert!(err.to_string().contains("Invalid URL in startUrls"));
    }

    #[test]
    fn test_number_range_and_integer_checks() {
        let err = parse_run_input(&json!({
            "startUrls": ["https://example.com"],
            "maxDepth": 101
        }))
        .unwrap_err();
        assert!(err.to_string().contains("maxDepth must be between 0 and 100"));

        let err = parse_run_input(&json!({
            "startUrls": ["https://example.com"],
            "maxPages": 0
        }))
        .unwrap_err();
        assert!(err.to_string().contains("maxPages must be between 1 and 100000"));

        let err = parse_run_input(&json!({
            "startUrls": ["https://example.com"],
            "maxPages": 2.5
        }))
        .unwrap_err();
        assert!(err.to_string().contains("maxPages must be an integer"));

        // Fractional seconds are fine for the dynamic-content wait.
        let config = parse_run_input(&json!({
            "startUrls": ["https://example.com"],
            "waitForDynamicContentSeconds": 1.5
        }))
        .unwrap();
        assert_eq!(config.wait_for_dynamic_content_seconds, 1.5);
    }

    #[test]
    fn test_type_errors() {
        let err = parse_run_input(&json!({
            "startUrls": ["https://example.com"],
            "respectRobots": "yes"
        }))
        .unwrap_err();
        assert!(err.to_string().contains("respectRobots must be a boolean"));

        let err = parse_run_input(&json!({
            "startUrls": ["https://example.com"],
            "clickSelectors": ".cta"
        }))
        .unwrap_err();
        assert!(err
            .to_string()
            .contains("clickSelectors must be an array of strings"));

        let err = parse_run_input(&json!({
            "startUrls": ["https://example.com"],
            "clickSelectors": [1, 2]
        }))
        .unwrap_err();
        assert!(err
            .to_string()
            .contains("clickSelectors must contain only strings"));
    }

    #[test]
    fn test_enum_parsing() {
        let err = parse_run_input(&json!({
            "startUrls": ["https://example.com"],
            "crawlerType": "chrome"
        }))
        .unwrap_err();
        assert!(err
            .to_string()
            .contains("crawlerType must be one of: camoufox, playwright, http:fast"));

        // Empty string falls back to the default.
        let config = parse_run_input(&json!({
            "startUrls": ["https://example.com"],
            "htmlTransformer": ""
        }))
        .unwrap();
        assert_eq!(config.html_transformer, HtmlTransformer::Markdown);
    }

    #[test]
    fn test_custom_allowlist_requires_domains() {
        let err = parse_run_input(&json!({
            "startUrls": ["https://example.com"],
            "scopeMode": "customAllowlist"
        }))
        .unwrap_err();
        assert!(err
            .to_string()
            .contains("allowedDomains must be provided"));

        parse_run_input(&json!({
            "startUrls": ["https://example.com"],
            "scopeMode": "customAllowlist",
            "allowedDomains": ["example.com"]
        }))
        .unwrap();
    }

    #[test]
    fn test_string_arrays_trim_and_drop_empties() {
        let config = parse_run_input(&json!({
            "startUrls": ["https://example.com"],
            "clickSelectors": ["  .accept  ", "", "   "]
        }))
        .unwrap();
        assert_eq!(config.click_selectors, vec![".accept".to_string()]);
    }

    #[test]
    fn test_full_custom_input() {
        let config = parse_run_input(&json!({
            "startUrls": ["https://docs.example.com/guide"],
            "crawlerType": "http:fast",
            "scopeMode": "customAllowlist",
            "allowedDomains": ["example.com", "cdn.example.net"],
            "includeGlobs": ["https://docs.example.com/*"],
            "excludeGlobs": ["*logout*"],
            "maxDepth": 3,
            "maxPages": 10,
            "maxResults": 10,
            "maxRuntimeSeconds": 120,
            "maxIdleCycles": 1,
            "respectRobots": false,
            "waitForDynamicContentSeconds": 0,
            "waitForSelector": "#content",
            "clickSelectors": [".load-more"],
            "removeCookieWarnings": false,
            "removeNavigationElements": false,
            "htmlTransformer": "readable",
            "removeCssSelectors": [".ads"],
            "keepCssSelectors": ["main"],
            "includeImageLinks": true,
            "includeAudioLinks": true,
            "includeVideoLinks": true,
            "saveHtml": true,
            "saveMarkdown": false,
            "saveText": false
        }))
        .unwrap();

        assert_eq!(config.crawler_type, EngineKind::HttpFast);
        assert_eq!(config.scope_mode, ScopeMode::CustomAllowlist);
        assert_eq!(config.allowed_domains.len(), 2);
        assert_eq!(config.max_depth, 3);
        assert_eq!(config.max_idle_cycles, 1);
        assert!(!config.respect_robots);
        assert_eq!(config.wait_for_selector, "#content");
        assert_eq!(config.html_transformer, HtmlTransformer::Readable);
        assert!(config.save_html);
        assert!(!config.save_markdown);
        assert!(config.include_video_links);
    }
}
