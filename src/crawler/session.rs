//! Shared state of one archive session
//!
//! The visited set, its counter and the dynamic capture record sit behind a
//! single lock; every check-and-insert happens inside one critical section.

use crate::url::CrawlTarget;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Response bodies observed during dynamic capture, keyed by URL
pub type CaptureRecord = BTreeMap<String, String>;

/// Cooperative stop signal shared with the caller
///
/// Once set, workers finish the page they hold and claim nothing new.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    flag: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Default)]
struct SessionState {
    visited: HashSet<String>,
    visited_count: usize,
    failed_count: usize,
    captures: CaptureRecord,
}

/// Target, progress and captures for one archive run
#[derive(Debug)]
pub struct Session {
    target: CrawlTarget,
    state: Mutex<SessionState>,
    active: AtomicBool,
    stop: StopHandle,
}

impl Session {
    pub fn new(target: CrawlTarget) -> Self {
        Self {
            target,
            state: Mutex::new(SessionState::default()),
            active: AtomicBool::new(false),
            stop: StopHandle::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn target(&self) -> &CrawlTarget {
        &self.target
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_stopped()
    }

    pub fn activate(&self) {
        self.active.store(true, Ordering::SeqCst);
    }

    pub fn deactivate(&self) {
        self.active.store(false, Ordering::SeqCst);
    }

    /// Returns true while workers should keep polling the frontier
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst) && !self.is_stopped()
    }

    /// Claims a URL for processing
    ///
    /// Returns true exactly once per URL per session; the caller that gets
    /// true owns the page and bumps the visited counter.
    pub fn mark_visited(&self, url: &str) -> bool {
        let mut state = self.lock();
        if !state.visited.insert(url.to_string()) {
            return false;
        }
        state.visited_count += 1;
        true
    }

    pub fn is_visited(&self, url: &str) -> bool {
        self.lock().visited.contains(url)
    }

    pub fn visited_count(&self) -> usize {
        self.lock().visited_count
    }

    pub fn record_failure(&self) {
        self.lock().failed_count += 1;
    }

    pub fn failed_count(&self) -> usize {
        self.lock().failed_count
    }

    /// Returns true if a discovered link should go onto the frontier
    pub fn should_enqueue(&self, url: &str) -> bool {
        self.target.is_eligible(url) && !self.is_visited(url)
    }

    /// Stores a captured response body; a later capture of the same URL wins
    pub fn record_capture(&self, url: impl Into<String>, body: impl Into<String>) {
        self.lock().captures.insert(url.into(), body.into());
    }

    /// Copy of every capture recorded so far
    pub fn captures(&self) -> CaptureRecord {
        self.lock().captures.clone()
    }

    pub fn capture_count(&self) -> usize {
        self.lock().captures.len()
    }
}
