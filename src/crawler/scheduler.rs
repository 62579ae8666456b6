//! Scheduler for managing the crawl frontier and in-flight work
//!
//! This module handles:
//! - The FIFO frontier of URLs waiting to be fetched
//! - The count of fetches dispatched but not yet completed
//! - Deduplication of discovered links through the [`VisitedSet`]
//! - The global crawl phase (running, draining, terminated)
//!
//! The scheduler is a plain synchronous state machine owned by the
//! coordinator loop. Because that loop is the only code that touches it, the
//! frontier, the in-flight counter and the visited set always change together
//! and completion is judged on one consistent view.

use crate::crawler::visited::VisitedSet;
use crate::url::CanonicalUrl;
use std::collections::VecDeque;

/// A URL queued for fetching
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedUrl {
    pub url: CanonicalUrl,

    /// Link distance from the seed (the seed is depth 0)
    pub depth: u32,
}

/// Global crawl phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlPhase {
    /// Dispatching work and accepting new links
    Running,
    /// No new dispatch; waiting for in-flight fetches to finish
    Draining,
    /// Nothing in flight, nothing queued, output flushed
    Terminated,
}

/// What happened to a link offered through [`Scheduler::discover`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discovery {
    /// First sighting; added to the frontier
    Enqueued,
    /// Already scheduled earlier in the crawl
    Duplicate,
    /// Beyond the configured maximum depth
    TooDeep,
    /// The crawl is no longer accepting work
    Ignored,
}

/// Scheduler manages the frontier queue and the concurrency ceiling
pub struct Scheduler {
    /// URLs waiting for a fetch slot
    frontier: VecDeque<QueuedUrl>,

    /// Every URL ever scheduled
    visited: VisitedSet,

    /// Fetches dispatched but not yet completed
    in_flight: usize,

    /// Maximum simultaneous fetches
    max_concurrent: usize,

    /// Links deeper than this are not scheduled
    max_depth: Option<u32>,

    phase: CrawlPhase,
}

impl Scheduler {
    /// Creates a new scheduler
    ///
    /// # Arguments
    ///
    /// * `max_concurrent` - Ceiling on in-flight fetches (clamped to at least 1)
    /// * `max_depth` - Optional link-distance limit from the seed
    pub fn new(max_concurrent: usize, max_depth: Option<u32>) -> Self {
        Self {
            frontier: VecDeque::new(),
            visited: VisitedSet::new(),
            in_flight: 0,
            max_concurrent: max_concurrent.max(1),
            max_depth,
            phase: CrawlPhase::Running,
        }
    }

    /// Schedules the seed URL at depth 0
    ///
    /// Returns false if the URL was already scheduled or the crawl has
    /// stopped accepting work.
    pub fn submit(&mut self, seed: CanonicalUrl) -> bool {
        self.offer(seed, 0) == Discovery::Enqueued
    }

    /// Offers a link found on a page at `parent_depth`
    pub fn discover(&mut self, parent_depth: u32, url: CanonicalUrl) -> Discovery {
        self.offer(url, parent_depth.saturating_add(1))
    }

    fn offer(&mut self, url: CanonicalUrl, depth: u32) -> Discovery {
        if self.phase != CrawlPhase::Running {
            return Discovery::Ignored;
        }

        if self.max_depth.is_some_and(|max| depth > max) {
            return Discovery::TooDeep;
        }

        if !self.visited.try_mark(&url) {
            return Discovery::Duplicate;
        }

        self.frontier.push_back(QueuedUrl { url, depth });
        Discovery::Enqueued
    }

    /// Takes the next URL to fetch, if a slot is free
    ///
    /// Returns `None` when the crawl is not running, every slot is busy, or
    /// the frontier is empty. A returned URL is counted as in flight until
    /// [`Scheduler::complete`] is called for it.
    pub fn next_dispatch(&mut self) -> Option<QueuedUrl> {
        if self.phase != CrawlPhase::Running || self.in_flight >= self.max_concurrent {
            return None;
        }

        let next = self.frontier.pop_front()?;
        self.in_flight += 1;
        Some(next)
    }

    /// Releases the slot held by a finished fetch
    ///
    /// Links discovered by that fetch must be offered before this call so the
    /// crawl never looks idle while a page's links are still pending.
    pub fn complete(&mut self) {
        debug_assert!(self.in_flight > 0, "complete() without a dispatched fetch");
        self.in_flight = self.in_flight.saturating_sub(1);
    }

    /// Claims the URL a fetch ended up on after following redirects
    ///
    /// Returns false when that URL was already scheduled, meaning the page is
    /// fetched (or queued) under its own URL and must not be recorded twice.
    pub fn claim_redirect_target(&mut self, url: &CanonicalUrl) -> bool {
        self.visited.try_mark(url)
    }

    /// True when nothing is queued and nothing is in flight
    pub fn is_idle(&self) -> bool {
        self.frontier.is_empty() && self.in_flight == 0
    }

    /// Stops dispatching; queued URLs that were never fetched are dropped
    ///
    /// Returns the number of queued URLs discarded.
    pub fn begin_drain(&mut self) -> usize {
        if self.phase != CrawlPhase::Running {
            return 0;
        }

        self.phase = CrawlPhase::Draining;
        let dropped = self.frontier.len();
        self.frontier.clear();
        dropped
    }

    /// Moves a drained crawl to its final phase
    ///
    /// Returns false (and stays put) while fetches are still in flight.
    pub fn terminate(&mut self) -> bool {
        if self.phase == CrawlPhase::Running {
            self.begin_drain();
        }

        if self.in_flight > 0 {
            return false;
        }

        self.phase = CrawlPhase::Terminated;
        true
    }

    pub fn phase(&self) -> CrawlPhase {
        self.phase
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Returns the number of URLs in the frontier
    pub fn frontier_size(&self) -> usize {
        self.frontier.len()
    }

    /// Returns the number of distinct URLs scheduled so far
    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }
}
