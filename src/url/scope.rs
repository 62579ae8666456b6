//! Domain allow-list for discovered links

use crate::url::CanonicalUrl;
use url::Url;

/// Restricts which hosts the crawl is allowed to follow links into
///
/// An empty allow-list means every host is in scope. Patterns are either an
/// exact host (`example.com`) or a wildcard (`*.example.com`) that matches the
/// bare domain and every subdomain below it.
#[derive(Debug, Clone, Default)]
pub struct DomainScope {
    patterns: Vec<String>,
}

impl DomainScope {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            patterns: patterns
                .into_iter()
                .map(|p| p.as_ref().trim().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    /// A scope that admits every host
    pub fn unrestricted() -> Self {
        Self::default()
    }

    pub fn is_unrestricted(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Returns true if the URL's host is allowed by the scope
    pub fn allows(&self, url: &CanonicalUrl) -> bool {
        if self.patterns.is_empty() {
            return true;
        }

        match extract_domain(url.as_url()) {
            Some(domain) => self
                .patterns
                .iter()
                .any(|pattern| matches_wildcard(pattern, &domain)),
            None => false,
        }
    }
}

/// Extracts the lowercase host of a URL
///
/// # Examples
///
/// ```
/// use url::Url;
/// use ripple_harvest::url::extract_domain;
///
/// let url = Url::parse("https://Sub.Example.COM:8080/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("sub.example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Checks if a domain matches an exact or `*.`-prefixed wildcard pattern
///
/// # Examples
///
/// ```
/// use ripple_harvest::url::matches_wildcard;
///
/// assert!(matches_wildcard("example.com", "example.com"));
/// assert!(matches_wildcard("*.example.com", "example.com"));
/// assert!(matches_wildcard("*.example.com", "api.v2.example.com"));
/// assert!(!matches_wildcard("*.example.com", "myexample.com"));
/// ```
pub fn matches_wildcard(pattern: &str, candidate: &str) -> bool {
    match pattern.strip_prefix("*.") {
        Some(base) => {
            candidate == base
                || candidate
                    .strip_suffix(base)
                    .is_some_and(|prefix| prefix.ends_with('.'))
        }
        None => candidate == pattern,
    }
}
