//! Deduplication gate for scheduled URLs

use crate::url::CanonicalUrl;
use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

/// Records every canonical URL the crawl has scheduled
///
/// The set only grows. The single operation that touches membership,
/// [`VisitedSet::try_mark`], checks and inserts under one lock acquisition, so
/// two concurrent discoveries of the same URL can never both win.
#[derive(Debug, Default)]
pub struct VisitedSet {
    seen: Mutex<HashSet<String>>,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `url` as seen
    ///
    /// Returns `true` iff this call performed the insertion, i.e. this is the
    /// first time the URL has been offered to the set.
    pub fn try_mark(&self, url: &CanonicalUrl) -> bool {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(url.as_str().to_owned())
    }

    /// Number of distinct URLs marked so far
    pub fn len(&self) -> usize {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
