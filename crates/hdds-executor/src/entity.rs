// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Entity identity, executor events and the dispatch callback slot.
//!
//! Every dispatchable entity exposes one callback slot. The executor assigns
//! the same [`ExecutorCallback`] (its event sink) to all of them; an entity
//! reports readiness by pushing an [`ExecutorEvent`] tagged with its own id
//! and kind, so every notification funnels into a single entry point.

use crate::error::Result;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Process-unique identifier of a dispatchable entity.
pub type EntityId = u64;

/// Allocate a fresh entity id.
#[must_use]
pub fn next_entity_id() -> EntityId {
    static NEXT_ID: AtomicU64 = AtomicU64::new(1);
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

/// What an event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Subscription,
    Service,
    Client,
    Waitable,
    /// A node's entity graph changed; the executor must resync its wiring.
    NodeGraph,
    /// The executor's interrupt guard fired.
    Interrupt,
}

/// A readiness notification pushed to the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorEvent {
    pub entity: EntityId,
    pub kind: EntityKind,
    /// Number of items that became ready.
    pub count: usize,
}

/// Receiver of executor events. Implemented by the executor's event queue.
pub trait EventSink: Send + Sync {
    fn push_event(&self, event: ExecutorEvent);
}

/// The dispatch context shared by every wired entity.
pub type ExecutorCallback = Arc<dyn EventSink>;

/// Whether two callbacks are the same dispatch context.
#[must_use]
pub fn same_callback(a: &ExecutorCallback, b: &ExecutorCallback) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a).cast::<()>(),
        Arc::as_ptr(b).cast::<()>(),
    )
}

/// A subscription, service, client or waitable as seen by the executor.
pub trait ExecutorEntity: Send + Sync {
    fn entity_id(&self) -> EntityId;

    fn kind(&self) -> EntityKind;

    /// Wire (`Some`) or unwire (`None`) this entity.
    fn set_events_executor_callback(&self, callback: Option<ExecutorCallback>);

    /// Take one ready item and run the user callback for it.
    fn execute(&self) -> Result<()>;
}

/// Callback slot embedded in entity implementations.
///
/// Notifications that arrive while unwired are counted and delivered as a
/// single event as soon as a callback is assigned.
pub struct EventSlot {
    entity: EntityId,
    kind: EntityKind,
    state: Mutex<SlotState>,
}

#[derive(Default)]
struct SlotState {
    callback: Option<ExecutorCallback>,
    pending: usize,
}

impl EventSlot {
    #[must_use]
    pub fn new(entity: EntityId, kind: EntityKind) -> Self {
        Self {
            entity,
            kind,
            state: Mutex::new(SlotState::default()),
        }
    }

    #[must_use]
    pub fn entity(&self) -> EntityId {
        self.entity
    }

    #[must_use]
    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Assign or clear the callback, flushing notifications counted while unwired.
    pub fn set(&self, callback: Option<ExecutorCallback>) {
        let mut state = self.state.lock();
        state.callback = callback;
        if let Some(callback) = state.callback.clone() {
            let pending = std::mem::take(&mut state.pending);
            drop(state);
            if pending > 0 {
                callback.push_event(self.event(pending));
            }
        }
    }

    /// Report `count` newly ready items.
    pub fn notify(&self, count: usize) {
        let mut state = self.state.lock();
        match state.callback.clone() {
            Some(callback) => {
                drop(state);
                callback.push_event(self.event(count));
            }
            None => state.pending = state.pending.saturating_add(count),
        }
    }

    #[must_use]
    pub fn is_wired(&self) -> bool {
        self.state.lock().callback.is_some()
    }

    /// Currently assigned callback, if any.
    #[must_use]
    pub fn callback(&self) -> Option<ExecutorCallback> {
        self.state.lock().callback.clone()
    }

    fn event(&self, count: usize) -> ExecutorEvent {
        ExecutorEvent {
            entity: self.entity,
            kind: self.kind,
            count,
        }
    }
}

impl std::fmt::Debug for EventSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("EventSlot")
            .field("entity", &self.entity)
            .field("kind", &self.kind)
            .field("wired", &state.callback.is_some())
            .field("pending", &state.pending)
            .finish()
    }
}
