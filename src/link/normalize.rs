//! Candidate link normalization
//!
//! Every URL that enters the crawl frontier or a media list passes
//! through [`normalize_link`] first.

use url::Url;

/// Resolves a raw href against a base URL and validates it
///
/// # Normalization Steps
///
/// 1. Trim surrounding whitespace; reject empty values
/// 2. Reject fragment-only links and `javascript:`, `mailto:`, `tel:`,
///    and `data:` targets (case-insensitive)
/// 3. Resolve relative references against `base`
/// 4. Strip any fragment
/// 5. Require an `http` or `https` scheme after resolution
///
/// # Arguments
///
/// * `base` - The URL the page was fetched from
/// * `raw` - The candidate href as written in the document
///
/// # Returns
///
/// * `Some(Url)` - The absolute, fragment-free URL
/// * `None` - The candidate is not a crawlable link
///
/// # Examples
///
/// ```
/// use leafcutter::link::normalize_link;
/// use url::Url;
///
/// let base = Url::parse("https://example.com/docs/").unwrap();
/// let link = normalize_link(&base, "guide#intro").unwrap();
/// assert_eq!(link.as_str(), "https://example.com/docs/guide");
/// assert!(normalize_link(&base, "mailto:hi@example.com").is_none());
/// ```
pub fn normalize_link(base: &Url, raw: &str) -> Option<Url> {
    let href = raw.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if lower.starts_with("javascript:")
        || lower.starts_with("mailto:")
        || lower.starts_with("tel:")
        || lower.starts_with("data:")
    {
        return None;
    }

    let mut resolved = base.join(href).ok()?;
    resolved.set_fragment(None);

    if resolved.scheme() != "http" && resolved.scheme() != "https" {
        return None;
    }
    Some(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://example.com/blog/post").unwrap()
    }

    #[test]
    fn test_relative_resolution() {
        assert_eq!(
            normalize_link(&base(), "/about").unwrap().as_str(),
            "https://example.com/about"
        );
        assert_eq!(
            normalize_link(&base(), "next").unwrap().as_str(),
            "https://example.com/blog/next"
        );
    }

    #[test]
    fn test_absolute_passthrough() {
        assert_eq!(
            normalize_link(&base(), "https://other.com/page").unwrap().as_str(),
            "https://other.com/page"
        );
    }

    #[test]
    fn test_protocol_relative() {
        assert_eq!(
            normalize_link(&base(), "//cdn.example.com/a.js").unwrap().as_str(),
            "https://cdn.example.com/a.js"
        );
    }

    #[test]
    fn test_fragment_stripped() {
        assert_eq!(
            normalize_link(&base(), "/about#team").unwrap().as_str(),
            "https://example.com/about"
        );
    }

    #[test]
    fn test_fragment_only_rejected() {
        assert!(normalize_link(&base(), "#section").is_none());
        assert!(normalize_link(&base(), "  #section  ").is_none());
    }

    #[test]
    fn test_special_schemes_rejected() {
        assert!(normalize_link(&base(), "javascript:void(0)").is_none());
        assert!(normalize_link(&base(), "JavaScript:alert(1)").is_none());
        assert!(normalize_link(&base(), "mailto:team@example.com").is_none());
        assert!(normalize_link(&base(), "tel:+15551234").is_none());
        assert!(normalize_link(&base(), "data:text/plain,hello").is_none());
    }

    #[test]
    fn test_non_http_rejected() {
        assert!(normalize_link(&base(), "ftp://example.com/file").is_none());
        assert!(normalize_link(&base(), "ws://example.com/socket").is_none());
    }

    #[test]
    fn test_empty_and_whitespace_rejected() {
        assert!(normalize_link(&base(), "").is_none());
        assert!(normalize_link(&base(), "   ").is_none());
    }

    #[test]
    fn test_whitespace_trimmed() {
        assert_eq!(
            normalize_link(&base(), "  /about  ").unwrap().as_str(),
            "https://example.com/about"
        );
    }

    #[test]
    fn test_unparseable_rejected() {
        assert!(normalize_link(&base(), "https://[broken").is_none());
    }
}
