//! URL glob matching for include/exclude crawl filters

use regex::Regex;

/// A URL glob compiled to an anchored, case-insensitive pattern
///
/// Translation rules:
/// - `*` matches any run of characters, including `/`
/// - `?` matches exactly one character
/// - every other regex metacharacter is escaped and matches literally
///
/// A glob the regex engine rejects (for example one that blows the
/// compiled-size limit) matches nothing.
///
/// # Examples
///
/// ```
/// use leafcutter::link::UrlGlob;
///
/// let glob = UrlGlob::new("https://example.com/blog/*");
/// assert!(glob.matches("https://example.com/blog/page/2"));
/// assert!(glob.matches("HTTPS://EXAMPLE.COM/BLOG/x"));
/// assert!(!glob.matches("https://example.com/about"));
/// ```
#[derive(Debug, Clone)]
pub struct UrlGlob {
    regex: Option<Regex>,
}

impl UrlGlob {
    pub fn new(pattern: &str) -> Self {
        Self {
            regex: compile(pattern),
        }
    }

    /// Checks whether the candidate matches the whole glob.
    pub fn matches(&self, candidate: &str) -> bool {
        self.regex
            .as_ref()
            .map(|regex| regex.is_match(candidate))
            .unwrap_or(false)
    }
}

/// Checks whether any glob in the list matches the candidate.
///
/// An empty list matches nothing.
pub fn matches_any(candidate: &str, globs: &[UrlGlob]) -> bool {
    globs.iter().any(|glob| glob.matches(candidate))
}

/// Compiles configured glob patterns, preserving order.
pub fn compile_globs(patterns: &[String]) -> Vec<UrlGlob> {
    patterns.iter().map(|pattern| UrlGlob::new(pattern)).collect()
}

fn compile(pattern: &str) -> Option<Regex> {
    let mut translated = String::with_capacity(pattern.len() + 8);
    for ch in pattern.chars() {
        match ch {
            '*' => translated.push_str(".*"),
            '?' => translated.push('.'),
            '.' | '+' | '^' | '$' | '{' | '}' | '(' | ')' | '|' | '[' | ']' | '\\' => {
                translated.push('\\');
                translated.push(ch);
            }
            _ => translated.push(ch),
        }
    }
    Regex::new(&format!("(?i)^{translated}$")).ok()
}
