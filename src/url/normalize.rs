//! Seed parsing and href resolution into canonical URLs

use crate::{UrlError, UrlResult};
use std::fmt;
use url::Url;

/// An absolute http(s) URL in its canonical serialized form
///
/// Two links point at the same page iff their canonical serializations are
/// byte-equal. The serialization is the one produced by the `url` crate after
/// base-relative resolution; nothing else (fragments, trailing slashes, query
/// order) is rewritten.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalUrl(Url);

impl CanonicalUrl {
    /// Wraps an already-resolved URL, rejecting anything that is not http(s)
    /// or has no host
    pub fn new(url: Url) -> UrlResult<Self> {
        if !is_http_scheme(url.scheme()) {
            return Err(UrlError::InvalidScheme(format!(
                "Only HTTP and HTTPS schemes are supported, got: {}",
                url.scheme()
            )));
        }

        if url.host_str().map_or(true, str::is_empty) {
            return Err(UrlError::MissingDomain);
        }

        Ok(Self(url))
    }

    /// The canonical string form; this is the deduplication key
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn as_url(&self) -> &Url {
        &self.0
    }
}

impl fmt::Display for CanonicalUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

impl AsRef<str> for CanonicalUrl {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

/// Parses the seed URL given on the command line
///
/// The seed must be absolute and use the `http` or `https` scheme.
///
/// # Examples
///
/// ```
/// use ripple_harvest::url::parse_seed;
///
/// let seed = parse_seed("https://a.test/dir/page").unwrap();
/// assert_eq!(seed.as_str(), "https://a.test/dir/page");
///
/// assert!(parse_seed("/relative/path").is_err());
/// assert!(parse_seed("ftp://a.test/file").is_err());
/// ```
pub fn parse_seed(raw: &str) -> UrlResult<CanonicalUrl> {
    let url = Url::parse(raw.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;
    CanonicalUrl::new(url)
}

/// Resolves a raw `href` against the page it was found on
///
/// Resolution follows standard base-relative URL semantics. Returns `None`
/// when the href is empty, cannot be parsed, or resolves to anything other
/// than an http(s) URL (`mailto:`, `javascript:`, `tel:`, `data:` ...).
/// Malformed input never produces an error.
///
/// # Examples
///
/// ```
/// use ripple_harvest::url::resolve_link;
/// use url::Url;
///
/// let base = Url::parse("https://a.test/dir/page").unwrap();
/// let resolved = resolve_link("../other?x=1", &base).unwrap();
/// assert_eq!(resolved.as_str(), "https://a.test/other?x=1");
///
/// assert!(resolve_link("mailto:x@y.com", &base).is_none());
/// assert!(resolve_link("", &base).is_none());
/// ```
pub fn resolve_link(href: &str, base: &Url) -> Option<CanonicalUrl> {
    let href = href.trim();

    if href.is_empty() {
        return None;
    }

    match base.join(href) {
        Ok(absolute) => CanonicalUrl::new(absolute).ok(),
        Err(e) => {
            tracing::trace!("Dropping unparsable href {:?}: {}", href, e);
            None
        }
    }
}

fn is_http_scheme(scheme: &str) -> bool {
    scheme == "http" || scheme == "https"
}
