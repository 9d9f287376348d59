//! Crawl scope evaluation
//!
//! A [`ScopeMatcher`] is built once per run from the start URLs, the scope
//! mode and (for the allowlist mode) the configured domains, then consulted
//! for every discovered link and media URL:
//!
//! - `anyDomain` admits every http(s) URL
//! - `sameHostname` admits exact start-hostname matches only
//! - `sameDomainSubdomains` admits the registrable (public-suffix aware)
//!   domain of each start URL plus its subdomains
//! - `customAllowlist` admits the configured hostnames plus their subdomains
//!
//! Hostnames compare lowercased and subdomain checks are dot-bounded, so
//! `evilexample.com` never matches an `example.com` entry. Non-http(s) URLs
//! are always out of scope.

use std::collections::HashSet;

use url::Url;

use crate::config::ScopeMode;
use crate::{ConfigError, ConfigResult};

/// Per-run scope predicate for discovered URLs
#[derive(Debug, Clone)]
pub struct ScopeMatcher {
    mode: ScopeMode,
    start_hostnames: HashSet<String>,
    start_domains: HashSet<String>,
    allowlist: Vec<String>,
}

impl ScopeMatcher {
    /// Builds a matcher for the run
    ///
    /// # Arguments
    ///
    /// * `mode` - Scope mode from the run input
    /// * `start_urls` - Validated start URLs
    /// * `allowed_domains` - Allowlist entries, used by `customAllowlist` only
    ///
    /// # Returns
    ///
    /// * `Ok(ScopeMatcher)` - Ready to evaluate URLs
    /// * `Err(ConfigError::Validation)` - `customAllowlist` with no usable entries
    pub fn new(
        mode: ScopeMode,
        start_urls: &[Url],
        allowed_domains: &[String],
    ) -> ConfigResult<Self> {
        let start_hostnames: HashSet<String> =
            start_urls.iter().filter_map(http_hostname).collect();
        let start_domains: HashSet<String> = start_hostnames
            .iter()
            .map(|hostname| registrable_domain(hostname).unwrap_or_else(|| hostname.clone()))
            .collect();
        let allowlist: Vec<String> = allowed_domains
            .iter()
            .filter_map(|entry| normalize_host(entry))
            .collect();

        if mode == ScopeMode::CustomAllowlist && allowlist.is_empty() {
            return Err(ConfigError::Validation(
                "allowedDomains must contain at least one valid domain for customAllowlist"
                    .to_string(),
            ));
        }

        Ok(Self {
            mode,
            start_hostnames,
            start_domains,
            allowlist,
        })
    }

    /// Returns the scope mode this matcher was built with
    pub fn mode(&self) -> ScopeMode {
        self.mode
    }

    /// Evaluates whether a URL falls inside the crawl scope
    pub fn in_scope(&self, url: &Url) -> bool {
        let hostname = match http_hostname(url) {
            Some(hostname) => hostname,
            None => return false,
        };
        match self.mode {
            ScopeMode::AnyDomain => true,
            ScopeMode::SameHostname => self.start_hostnames.contains(&hostname),
            ScopeMode::SameDomainSubdomains => self
                .start_domains
                .iter()
                .any(|domain| is_hostname_or_subdomain(&hostname, domain)),
            ScopeMode::CustomAllowlist => self
                .allowlist
                .iter()
                .any(|base| is_hostname_or_subdomain(&hostname, base)),
        }
    }
}

/// Lowercased hostname of an http(s) URL, `None` for any other scheme
fn http_hostname(url: &Url) -> Option<String> {
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    url.host_str().map(|host| host.to_ascii_lowercase())
}

/// Registrable (eTLD+1) domain of a hostname, when one can be derived
fn registrable_domain(hostname: &str) -> Option<String> {
    psl::domain_str(hostname).map(|domain| domain.to_ascii_lowercase())
}

/// Normalizes an allowlist entry to a bare lowercase hostname
///
/// Entries may be hostnames or full URLs. Scheme-less values get `http://`
/// prepended so the URL parser can extract the host. Unusable entries map
/// to `None` and are dropped.
fn normalize_host(entry: &str) -> Option<String> {
    let trimmed = entry.trim().to_ascii_lowercase();
    if trimmed.is_empty() {
        return None;
    }
    let candidate = if trimmed.contains("://") {
        trimmed
    } else {
        format!("http://{trimmed}")
    };
    let url = Url::parse(&candidate).ok()?;
    url.host_str()
        .filter(|host| !host.is_empty())
        .map(|host| host.to_ascii_lowercase())
}

/// Dot-bounded subdomain test: true iff `candidate` equals `base` or ends
/// with `.base`
fn is_hostname_or_subdomain(candidate: &str, base: &str) -> bool {
    candidate == base || candidate.ends_with(&format!(".{base}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn starts(urls: &[&str]) -> Vec<Url> {
        urls.iter()
            .map(|raw| Url::parse(raw).unwrap())
            .collect()
    }

    fn url(raw: &str) -> Url {
        Url::parse(raw).unwrap()
    }

    #[test]
    fn test_any_domain_admits_all_http() {
        let matcher =
            ScopeMatcher::new(ScopeMode::AnyDomain, &starts(&["https://kitaabh.dev/"]), &[])
                .unwrap();
        assert!(matcher.in_scope(&url("https://completely-unrelated.example/")));
        assert!(matcher.in_scope(&url("http://10.0.0.1/page")));
    }

    #[test]
    fn test_non_http_schemes_always_out() {
        let matcher =
            ScopeMatcher::new(ScopeMode::AnyDomain, &starts(&["https://kitaabh.dev/"]), &[])
                .unwrap();
        assert!(!matcher.in_scope(&url("ftp://kitaabh.dev/file")));
        assert!(!matcher.in_scope(&url("mailto:team@kitaabh.dev")));
    }

    #[test]
    fn test_same_hostname_is_exact() {
        let matcher = ScopeMatcher::new(
            ScopeMode::SameHostname,
            &starts(&["https://app.kitaabh.dev/"]),
            &[],
        )
        .unwrap();
        assert!(matcher.in_scope(&url("https://app.kitaabh.dev/settings")));
        assert!(matcher.in_scope(&url("http://APP.kitaabh.dev/")));
        assert!(!matcher.in_scope(&url("https://api.kitaabh.dev/")));
        assert!(!matcher.in_scope(&url("https://kitaabh.dev/")));
    }

    #[test]
    fn test_same_domain_subdomains() {
        let matcher = ScopeMatcher::new(
            ScopeMode::SameDomainSubdomains,
            &starts(&["https://app.kitaabh.dev/"]),
            &[],
        )
        .unwrap();
        assert!(matcher.in_scope(&url("https://app.kitaabh.dev/")));
        assert!(matcher.in_scope(&url("https://api.kitaabh.dev/v1")));
        assert!(matcher.in_scope(&url("https://kitaabh.dev/")));
        assert!(!matcher.in_scope(&url("https://kitaabh.dev.evil.com/")));
        assert!(!matcher.in_scope(&url("https://notkitaabh.dev/")));
    }

    #[test]
    fn test_same_domain_falls_back_to_hostname_for_ips() {
        let matcher = ScopeMatcher::new(
            ScopeMode::SameDomainSubdomains,
            &starts(&["http://127.0.0.1:8080/"]),
            &[],
        )
        .unwrap();
        assert!(matcher.in_scope(&url("http://127.0.0.1/other")));
        assert!(!matcher.in_scope(&url("http://127.0.0.2/")));
    }

    #[test]
    fn test_custom_allowlist_matches_with_dot_boundary() {
        let matcher = ScopeMatcher::new(
            ScopeMode::CustomAllowlist,
            &starts(&["https://start.example/"]),
            &[
                "kitaabh.dev".to_string(),
                "https://cdn.assets.net/path".to_string(),
            ],
        )
        .unwrap();
        assert!(matcher.in_scope(&url("https://kitaabh.dev/")));
        assert!(matcher.in_scope(&url("https://docs.kitaabh.dev/intro")));
        assert!(matcher.in_scope(&url("https://cdn.assets.net/img.png")));
        assert!(!matcher.in_scope(&url("https://notkitaabh.dev/")));
        assert!(!matcher.in_scope(&url("https://assets.net/")));
        // The start URL itself is not implicitly allowlisted.
        assert!(!matcher.in_scope(&url("https://start.example/")));
    }

    #[test]
    fn test_custom_allowlist_requires_entries() {
        let err = ScopeMatcher::new(
            ScopeMode::CustomAllowlist,
            &starts(&["https://kitaabh.dev/"]),
            &[],
        )
        .unwrap_err();
        assert!(err.to_string().contains("allowedDomains"));

        // Entries that normalize to nothing count as absent.
        let err = ScopeMatcher::new(
            ScopeMode::CustomAllowlist,
            &starts(&["https://kitaabh.dev/"]),
            &["   ".to_string()],
        )
        .unwrap_err();
        assert!(err.to_string().contains("allowedDomains"));
    }

    #[test]
    fn test_allowlist_entries_normalize() {
        assert_eq!(normalize_host("Example.COM"), Some("example.com".to_string()));
        assert_eq!(
            normalize_host("https://Sub.Example.com/path?q=1"),
            Some("sub.example.com".to_string())
        );
        assert_eq!(normalize_host(""), None);
        assert_eq!(normalize_host("   "), None);
    }
}
