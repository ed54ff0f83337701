// Copyright (c) 2025 Evoke Authors
// SPDX-License-Identifier: MIT

//! Deduplicating, rate-limited work queue for reconciliation keys.
//!
//! The queue holds opaque string keys and guarantees that no key is handed to
//! two workers at once. A key added while in-flight is marked dirty and
//! re-queued when the worker calls [`WorkQueue::done`], so concurrent events
//! for one resource collapse into exactly one follow-up pass. Per-key failure
//! counters live here as well; [`WorkQueue::add_rate_limited`] consults the
//! [`RetryPolicy`] to schedule delayed re-adds.
//!
//! All mutable state sits behind one mutex; blocked consumers park on a
//! [`tokio::sync::Notify`] and are woken in a chain so a single permit is
//! never lost between concurrent workers.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;
use tracing::{debug, trace};

use crate::retry::RetryPolicy;

/// Mutex-guarded queue internals.
///
/// Invariants:
/// - a key in `pending` is always in `dirty`
/// - a key is never in `pending` and `processing` at the same time
/// - `waiting` holds keys with a live `add_after` timer; a key already
///   waiting keeps its original deadline
#[derive(Default)]
struct QueueState {
    pending: VecDeque<String>,
    dirty: HashSet<String>,
    processing: HashSet<String>,
    failures: HashMap<String, u32>,
    waiting: HashSet<String>,
    shutting_down: bool,
}

/// Deduplicating work queue with in-flight tracking and rate-limited re-adds.
///
/// Safe to share between any number of producers (informers, timers) and
/// consumers (workers); clone the surrounding [`Arc`].
pub struct WorkQueue {
    policy: RetryPolicy,
    state: Mutex<QueueState>,
    notify: Notify,
}

impl WorkQueue {
    /// Create a queue using the given retry policy for rate-limited re-adds.
    #[must_use]
    pub fn new(policy: RetryPolicy) -> Arc<Self> {
        Arc::new(Self {
            policy,
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
        })
    }

    /// The retry policy this queue applies to failing keys.
    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Insert a key if it is not already pending.
    ///
    /// A key currently in-flight is marked dirty instead and becomes eligible
    /// again when its worker calls [`WorkQueue::done`]. Adds after
    /// [`WorkQueue::shut_down`] are dropped. Non-blocking.
    pub fn add(&self, key: &str) {
        {
            let mut state = self.state.lock().unwrap();
            if state.shutting_down {
                trace!(key, "dropping add on shut-down queue");
                return;
            }
            if !state.dirty.insert(key.to_string()) {
                // Already pending or dirty-while-processing; coalesce.
                return;
            }
            if state.processing.contains(key) {
                trace!(key, "key in flight, deferring re-add until done");
                return;
            }
            state.pending.push_back(key.to_string());
        }
        self.notify.notify_one();
    }

    /// Schedule `key` for insertion after `delay`.
    ///
    /// Re-scheduling a key whose timer has not fired yet coalesces into a
    /// single insertion. A zero delay adds immediately.
    pub fn add_after(self: &Arc<Self>, key: &str, delay: Duration) {
        if delay.is_zero() {
            self.add(key);
            return;
        }
        {
            let mut state = self.state.lock().unwrap();
            if state.shutting_down {
                return;
            }
            if !state.waiting.insert(key.to_string()) {
                return;
            }
        }
        let queue = Arc::clone(self);
        let key = key.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            queue.state.lock().unwrap().waiting.remove(&key);
            queue.add(&key);
        });
    }

    /// Record a failure for `key` and re-add it after the policy's backoff.
    pub fn add_rate_limited(self: &Arc<Self>, key: &str) {
        let delay = {
            let mut state = self.state.lock().unwrap();
            let failures = state.failures.entry(key.to_string()).or_insert(0);
            let attempt = *failures;
            *failures += 1;
            self.policy.delay_for(attempt)
        };
        debug!(key, delay = ?delay, "rate-limited requeue");
        self.add_after(key, delay);
    }

    /// Wait for the next key and mark it in-flight.
    ///
    /// Returns `None` once [`WorkQueue::shut_down`] has been called. The
    /// flag is checked before the pending items, so shutdown is observed
    /// immediately even while work remains logically queued.
    pub async fn get(&self) -> Option<String> {
        loop {
            let notified = self.notify.notified();
            {
                let mut state = self.state.lock().unwrap();
                if state.shutting_down {
                    drop(state);
                    // Wake the next parked worker so shutdown cascades.
                    self.notify.notify_one();
                    return None;
                }
                if let Some(key) = state.pending.pop_front() {
                    state.dirty.remove(&key);
                    state.processing.insert(key.clone());
                    let more = !state.pending.is_empty();
                    drop(state);
                    if more {
                        self.notify.notify_one();
                    }
                    return Some(key);
                }
            }
            notified.await;
        }
    }

    /// Mark `key` no longer in-flight.
    ///
    /// If the key was re-added while it was being processed it goes straight
    /// back to pending, preserving the exactly-one-follow-up guarantee.
    pub fn done(&self, key: &str) {
        let requeued = {
            let mut state = self.state.lock().unwrap();
            state.processing.remove(key);
            if state.dirty.contains(key) {
                state.pending.push_back(key.to_string());
                true
            } else {
                false
            }
        };
        if requeued {
            self.notify.notify_one();
        }
    }

    /// Clear the failure counter for `key`.
    pub fn forget(&self, key: &str) {
        self.state.lock().unwrap().failures.remove(key);
    }

    /// Number of rate-limited requeues recorded for `key`.
    #[must_use]
    pub fn num_requeues(&self, key: &str) -> u32 {
        self.state
            .lock()
            .unwrap()
            .failures
            .get(key)
            .copied()
            .unwrap_or(0)
    }

    /// Number of keys currently pending (excludes in-flight keys).
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().unwrap().pending.len()
    }

    /// Whether no keys are pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Signal that no more items will be produced.
    ///
    /// Blocked [`WorkQueue::get`] calls drain and return `None`; later adds
    /// are dropped. Idempotent.
    pub fn shut_down(&self) {
        {
            let mut state = self.state.lock().unwrap();
            state.shutting_down = true;
        }
        self.notify.notify_one();
    }

    /// Whether [`WorkQueue::shut_down`] has been called.
    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.state.lock().unwrap().shutting_down
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod queue_tests;
