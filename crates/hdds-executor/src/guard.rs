// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Guard condition: a manually triggered wake-up signal.
//!
//! A guard wakes any [`crate::waitset::WaitSet`] it is attached to and, when
//! wired, pushes an [`ExecutorEvent`] to the executor. Nodes use one to
//! announce entity graph changes; the intra-process service uses one to
//! announce queued requests.

use crate::entity::{EntityId, EntityKind, ExecutorCallback, ExecutorEvent};
use crate::error::{Error, Result};
use crate::waitset::WakeNotifier;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

struct EventBinding {
    callback: ExecutorCallback,
    entity: EntityId,
    kind: EntityKind,
}

#[derive(Default)]
struct GuardEvents {
    binding: Option<EventBinding>,
    /// Triggers that happened while unwired.
    unread: usize,
}

pub struct GuardCondition {
    id: u64,
    trigger_value: AtomicBool,
    valid: AtomicBool,
    notifiers: Mutex<Vec<Weak<WakeNotifier>>>,
    events: Mutex<GuardEvents>,
}

impl GuardCondition {
    #[must_use]
    pub fn new() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1_000_000);
        Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            trigger_value: AtomicBool::new(false),
            valid: AtomicBool::new(true),
            notifiers: Mutex::new(Vec::new()),
            events: Mutex::new(GuardEvents::default()),
        }
    }

    #[must_use]
    pub fn condition_id(&self) -> u64 {
        self.id
    }

    /// Raise the guard: wake waitsets and push an event if wired.
    pub fn trigger(&self) {
        self.trigger_value.store(true, Ordering::Release);

        self.notifiers.lock().retain(|notifier| match notifier.upgrade() {
            Some(notifier) => {
                notifier.notify();
                true
            }
            None => false,
        });

        let wired = {
            let mut events = self.events.lock();
            let wired = events
                .binding
                .as_ref()
                .map(|binding| (Arc::clone(&binding.callback), binding.entity, binding.kind));
            if wired.is_none() {
                events.unread = events.unread.saturating_add(1);
            }
            wired
        };
        if let Some((callback, entity, kind)) = wired {
            callback.push_event(ExecutorEvent {
                entity,
                kind,
                count: 1,
            });
        }
    }

    #[must_use]
    pub fn trigger_value(&self) -> bool {
        self.trigger_value.load(Ordering::Acquire)
    }

    /// Read and clear the trigger value.
    pub fn take_trigger(&self) -> bool {
        self.trigger_value.swap(false, Ordering::AcqRel)
    }

    /// Wire or unwire the executor callback.
    ///
    /// With `use_previous_events`, triggers that happened while unwired are
    /// delivered as one event right away; otherwise they are discarded.
    /// Fails once the guard has been finalized.
    pub fn set_events_executor_callback(
        &self,
        callback: Option<ExecutorCallback>,
        entity: EntityId,
        kind: EntityKind,
        use_previous_events: bool,
    ) -> Result<()> {
        if !self.is_valid() {
            return Err(Error::Registration(format!(
                "guard condition {} is finalized",
                self.id
            )));
        }

        let replay = {
            let mut events = self.events.lock();
            let unread = std::mem::take(&mut events.unread);
            let replay = match &callback {
                Some(callback) if use_previous_events && unread > 0 => {
                    Some((Arc::clone(callback), unread))
                }
                _ => None,
            };
            events.binding = callback.map(|callback| EventBinding {
                callback,
                entity,
                kind,
            });
            replay
        };

        if let Some((callback, count)) = replay {
            callback.push_event(ExecutorEvent {
                entity,
                kind,
                count,
            });
        }
        Ok(())
    }

    #[must_use]
    pub fn is_wired(&self) -> bool {
        self.events.lock().binding.is_some()
    }

    /// Finalize the guard. Further callback changes fail; triggering still
    /// wakes waitsets.
    pub fn finalize(&self) {
        self.valid.store(false, Ordering::Release);
        self.events.lock().binding = None;
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }

    pub(crate) fn add_wake_notifier(&self, notifier: &Arc<WakeNotifier>) {
        let mut notifiers = self.notifiers.lock();
        notifiers.retain(|existing| existing.strong_count() > 0);
        notifiers.push(Arc::downgrade(notifier));
        if self.trigger_value() {
            notifier.notify();
        }
    }

    pub(crate) fn remove_wake_notifier(&self, notifier: &Arc<WakeNotifier>) {
        let target = Arc::downgrade(notifier);
        self.notifiers
            .lock()
            .retain(|existing| !existing.ptr_eq(&target));
    }
}

impl Default for GuardCondition {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for GuardCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuardCondition")
            .field("id", &self.id)
            .field("trigger_value", &self.trigger_value())
            .field("valid", &self.is_valid())
            .field("wired", &self.is_wired())
            .finish()
    }
}
