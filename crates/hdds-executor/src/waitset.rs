// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Blocking wait primitive for guard conditions.
//!
//! Guard conditions attached to a [`WaitSet`] hold a weak reference to its
//! [`WakeNotifier`] and poke it when triggered. The notifier uses an atomic
//! flag for the hot path and only falls back to a condvar when the waiter is
//! actually asleep.

use crate::error::{Error, Result};
use crate::guard::GuardCondition;
use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Identifier of an attached guard condition (its condition id).
pub type ConditionKey = u64;

/// Wake notification with an atomic fast path.
#[derive(Debug, Default)]
pub struct WakeNotifier {
    ready: AtomicBool,
    sleeping: Mutex<bool>,
    condvar: Condvar,
}

impl WakeNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Flag readiness and wake a sleeping waiter if there is one.
    pub fn notify(&self) {
        self.ready.store(true, Ordering::Release);
        if *self.sleeping.lock() {
            self.condvar.notify_one();
        }
    }

    /// Wait until notified or `timeout` elapses; `None` waits forever.
    /// Returns `true` if notified.
    pub fn wait(&self, timeout: Option<Duration>) -> bool {
        if self.ready.swap(false, Ordering::Acquire) {
            return true;
        }

        // A timeout too large to represent as an Instant means no deadline
        let deadline = timeout.and_then(|timeout| Instant::now().checked_add(timeout));
        let mut sleeping = self.sleeping.lock();
        loop {
            if self.ready.swap(false, Ordering::Acquire) {
                *sleeping = false;
                return true;
            }
            *sleeping = true;
            match deadline {
                Some(deadline) => {
                    if self.condvar.wait_until(&mut sleeping, deadline).timed_out() {
                        *sleeping = false;
                        return self.ready.swap(false, Ordering::Acquire);
                    }
                }
                None => self.condvar.wait(&mut sleeping),
            }
        }
    }
}

/// Set of guard conditions a dispatch thread can block on.
#[derive(Default)]
pub struct WaitSet {
    notifier: Arc<WakeNotifier>,
    guards: Mutex<HashMap<ConditionKey, Arc<GuardCondition>>>,
}

impl WaitSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a guard condition. Attaching the same guard twice is an error.
    pub fn attach_guard(&self, guard: &Arc<GuardCondition>) -> Result<ConditionKey> {
        let key = guard.condition_id();
        let mut guards = self.guards.lock();
        if guards.contains_key(&key) {
            return Err(Error::Registration(format!(
                "guard condition {} already attached",
                key
            )));
        }
        guard.add_wake_notifier(&self.notifier);
        guards.insert(key, Arc::clone(guard));
        Ok(key)
    }

    /// Detach a guard condition; unknown keys are ignored.
    pub fn detach_guard(&self, key: ConditionKey) {
        if let Some(guard) = self.guards.lock().remove(&key) {
            guard.remove_wake_notifier(&self.notifier);
        }
    }

    #[must_use]
    pub fn contains(&self, key: ConditionKey) -> bool {
        self.guards.lock().contains_key(&key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.guards.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.guards.lock().is_empty()
    }

    /// Block until an attached guard triggers or the timeout expires.
    ///
    /// Returns the keys of triggered guards and clears their trigger value.
    /// An empty vector means the wait timed out.
    pub fn wait(&self, timeout: Option<Duration>) -> Vec<ConditionKey> {
        let triggered = self.take_triggered();
        if !triggered.is_empty() {
            return triggered;
        }
        if self.notifier.wait(timeout) {
            self.take_triggered()
        } else {
            Vec::new()
        }
    }

    fn take_triggered(&self) -> Vec<ConditionKey> {
        let guards = self.guards.lock();
        let mut keys: Vec<ConditionKey> = guards
            .iter()
            .filter(|(_, guard)| guard.take_trigger())
            .map(|(key, _)| *key)
            .collect();
        keys.sort_unstable();
        keys
    }
}

impl std::fmt::Debug for WaitSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WaitSet")
            .field("guards", &self.guards.lock().len())
            .finish()
    }
}
