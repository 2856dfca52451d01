//! Frontier of URLs waiting to be archived
//!
//! This module handles:
//! - FIFO ordering of discovered URLs
//! - Bounded-wait claims so idle workers can notice a stop or a drained crawl
//! - Tracking claimed-but-unfinished URLs, so "drained" means no queued work
//!   and no work in flight

use crate::crawler::StopHandle;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct FrontierState {
    queue: VecDeque<String>,
    in_flight: usize,
}

/// Shared work queue for the worker pool
///
/// Duplicate URLs may be queued; the visited set decides which claim wins.
#[derive(Debug, Default)]
pub struct Frontier {
    state: Mutex<FrontierState>,
    work_ready: Notify,
    drained: Notify,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, FrontierState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends a URL to the back of the queue
    pub fn enqueue(&self, url: impl Into<String>) {
        self.lock().queue.push_back(url.into());
        self.work_ready.notify_one();
    }

    /// Takes the next URL, waiting at most `timeout` for one to arrive
    ///
    /// A claimed URL counts as in flight until `complete` is called for it.
    pub async fn claim(&self, timeout: Duration) -> Option<String> {
        if let Some(url) = self.try_claim() {
            return Some(url);
        }

        let _ = tokio::time::timeout(timeout, self.work_ready.notified()).await;
        self.try_claim()
    }

    fn try_claim(&self) -> Option<String> {
        let mut state = self.lock();
        let url = state.queue.pop_front()?;
        state.in_flight += 1;
        Some(url)
    }

    /// Marks one claimed URL as finished
    pub fn complete(&self) {
        let drained = {
            let mut state = self.lock();
            state.in_flight = state.in_flight.saturating_sub(1);
            state.queue.is_empty() && state.in_flight == 0
        };

        if drained {
            self.drained.notify_waiters();
        }
    }

    /// Returns true when nothing is queued and nothing is in flight
    pub fn is_drained(&self) -> bool {
        let state = self.lock();
        state.queue.is_empty() && state.in_flight == 0
    }

    /// Waits until the frontier drains or a stop is requested
    pub async fn wait_drained(&self, stop: &StopHandle, poll: Duration) {
        loop {
            if self.is_drained() || stop.is_stopped() {
                return;
            }
            let _ = tokio::time::timeout(poll, self.drained.notified()).await;
        }
    }

    /// Number of queued (unclaimed) URLs
    pub fn len(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().queue.is_empty()
    }

    pub fn in_flight(&self) -> usize {
        self.lock().in_flight
    }
}
