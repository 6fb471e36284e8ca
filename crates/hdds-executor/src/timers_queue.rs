// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Time-ordered queue of the timers registered with an executor.
//!
//! Backed by a `BinaryHeap` used as a min-heap on
//! `(time_until_trigger, insertion_seq)`. Keys are snapshots: timers can be
//! reset, cancelled or shifted by a clock jump behind the queue's back, so
//! [`TimersQueue::execute_ready`] re-keys the whole heap (O(n)) before it
//! walks it. Insertion is O(log n).
//!
//! ```text
//! execute_ready():
//!   re-key all entries from live time_until_trigger()
//!   while head is due:  pop, execute, stash
//!   first not-due head: stop (no full scan)
//!   push stashed timers back with fresh keys
//! ```
//!
//! Only the dispatch thread touches the queue; it is not internally locked.

use crate::error::Result;
use crate::timer::Timer;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::time::Duration;

struct QueuedTimer {
    key: i64,
    seq: u64,
    timer: Arc<dyn Timer>,
}

impl PartialEq for QueuedTimer {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.seq == other.seq
    }
}

impl Eq for QueuedTimer {}

impl PartialOrd for QueuedTimer {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedTimer {
    // Reversed: BinaryHeap is a max-heap, the earliest deadline must be on top.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .key
            .cmp(&self.key)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Identity of a timer, independent of the vtable half of the fat pointer.
fn timer_addr(timer: &Arc<dyn Timer>) -> *const () {
    Arc::as_ptr(timer).cast::<()>()
}

/// Ordered collection of timers keyed by time until trigger.
#[derive(Default)]
pub struct TimersQueue {
    heap: BinaryHeap<QueuedTimer>,
    next_seq: u64,
}

impl TimersQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a timer.
    pub fn add(&mut self, timer: Arc<dyn Timer>) -> Result<()> {
        let key = timer.time_until_trigger()?;
        let seq = self.bump_seq();
        self.heap.push(QueuedTimer { key, seq, timer });
        Ok(())
    }

    /// Nanoseconds until the earliest timer is due (negative if overdue),
    /// `i64::MAX` when the queue is empty.
    pub fn head_timeout(&self) -> Result<i64> {
        match self.heap.peek() {
            Some(head) => head.timer.time_until_trigger(),
            None => Ok(i64::MAX),
        }
    }

    /// [`TimersQueue::head_timeout`] as a wait bound: `None` when nothing is
    /// queued, zero when the head is already overdue.
    pub fn wait_timeout(&self) -> Result<Option<Duration>> {
        let head = self.head_timeout()?;
        if head == i64::MAX {
            return Ok(None);
        }
        Ok(Some(Duration::from_nanos(u64::try_from(head).unwrap_or(0))))
    }

    /// Execute every due timer in deadline order and return how many ran.
    ///
    /// Stops at the first timer that is not due yet.
    pub fn execute_ready(&mut self) -> Result<usize> {
        self.reorder()?;

        let mut fired = Vec::new();
        let mut outcome = Ok(());
        while let Some(head) = self.heap.peek() {
            match head.timer.time_until_trigger() {
                Ok(remaining) if remaining <= 0 => {}
                Ok(_) => break,
                Err(err) => {
                    outcome = Err(err);
                    break;
                }
            }
            let Some(entry) = self.heap.pop() else {
                break;
            };
            let result = entry.timer.execute_callback();
            fired.push(entry.timer);
            if let Err(err) = result {
                outcome = Err(err);
                break;
            }
        }

        let executed = fired.len();
        for timer in fired {
            // Fired timers rescheduled themselves; a failed sample keeps them due.
            let key = timer.time_until_trigger().unwrap_or(0);
            let seq = self.bump_seq();
            self.heap.push(QueuedTimer { key, seq, timer });
        }
        outcome.map(|()| executed)
    }

    /// Remove a timer by identity. Absent timers are ignored.
    pub fn remove(&mut self, timer: &Arc<dyn Timer>) {
        let target = timer_addr(timer);
        let mut removed = false;
        self.heap.retain(|entry| {
            if !removed && timer_addr(&entry.timer) == target {
                removed = true;
                return false;
            }
            true
        });
    }

    /// Drop every timer without running it.
    pub fn clear(&mut self) {
        self.heap.clear();
    }

    #[must_use]
    pub fn contains(&self, timer: &Arc<dyn Timer>) -> bool {
        let target = timer_addr(timer);
        self.heap
            .iter()
            .any(|entry| timer_addr(&entry.timer) == target)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    fn reorder(&mut self) -> Result<()> {
        let mut entries = std::mem::take(&mut self.heap).into_vec();
        let mut outcome = Ok(());
        for entry in &mut entries {
            match entry.timer.time_until_trigger() {
                Ok(key) => entry.key = key,
                Err(err) => {
                    outcome = Err(err);
                    break;
                }
            }
        }
        self.heap = BinaryHeap::from(entries);
        outcome
    }

    fn bump_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);
        seq
    }
}

impl std::fmt::Debug for TimersQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimersQueue")
            .field("len", &self.heap.len())
            .finish()
    }
}
