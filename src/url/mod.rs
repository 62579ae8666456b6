//! URL handling module for Ripple-Harvest
//!
//! This module resolves raw hrefs into canonical absolute URLs and decides
//! which hosts a crawl may follow links into.

mod normalize;
mod scope;

pub use normalize::{parse_seed, resolve_link, CanonicalUrl};
pub use scope::{extract_domain, matches_wildcard, DomainScope};
