// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Nodes and callback groups as seen by the executor.
//!
//! Ownership follows the client library: user code owns its entities and
//! callback groups, groups only keep weak references to their members, and a
//! node only keeps weak references to the groups created through it (plus a
//! strong one to its default group). Enumeration returns snapshots of the
//! members that are still alive.
//!
//! ```text
//! NodeBase
//! +-- associated_with_executor: AtomicBool
//! +-- notify_guard: GuardCondition    (triggered on every entity change)
//! +-- default_group: Arc<CallbackGroup>
//! +-- groups: Vec<Weak<CallbackGroup>>
//!
//! CallbackGroup
//! +-- can_be_taken_from: AtomicBool
//! +-- timers / subscriptions / services / clients / waitables: Vec<Weak<..>>
//! ```

use crate::entity::{EntityKind, ExecutorEntity};
use crate::guard::GuardCondition;
use crate::timer::Timer;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

/// Concurrency policy of a callback group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackGroupKind {
    /// At most one member callback runs at a time.
    MutuallyExclusive,
    /// Member callbacks may run concurrently.
    Reentrant,
}

#[derive(Default)]
struct GroupMembers {
    timers: Vec<Weak<dyn Timer>>,
    subscriptions: Vec<Weak<dyn ExecutorEntity>>,
    services: Vec<Weak<dyn ExecutorEntity>>,
    clients: Vec<Weak<dyn ExecutorEntity>>,
    waitables: Vec<Weak<dyn ExecutorEntity>>,
}

impl GroupMembers {
    fn list_mut(&mut self, kind: EntityKind) -> Option<&mut Vec<Weak<dyn ExecutorEntity>>> {
        match kind {
            EntityKind::Subscription => Some(&mut self.subscriptions),
            EntityKind::Service => Some(&mut self.services),
            EntityKind::Client => Some(&mut self.clients),
            EntityKind::Waitable => Some(&mut self.waitables),
            EntityKind::NodeGraph | EntityKind::Interrupt => None,
        }
    }

    fn list(&self, kind: EntityKind) -> &[Weak<dyn ExecutorEntity>] {
        match kind {
            EntityKind::Subscription => &self.subscriptions,
            EntityKind::Service => &self.services,
            EntityKind::Client => &self.clients,
            EntityKind::Waitable => &self.waitables,
            EntityKind::NodeGraph | EntityKind::Interrupt => &[],
        }
    }
}

/// A set of entities sharing a "can be taken from" policy.
pub struct CallbackGroup {
    kind: CallbackGroupKind,
    can_be_taken_from: AtomicBool,
    members: Mutex<GroupMembers>,
}

impl CallbackGroup {
    #[must_use]
    pub fn new(kind: CallbackGroupKind) -> Self {
        Self {
            kind,
            can_be_taken_from: AtomicBool::new(true),
            members: Mutex::new(GroupMembers::default()),
        }
    }

    #[must_use]
    pub fn kind(&self) -> CallbackGroupKind {
        self.kind
    }

    /// False while a mutually exclusive sibling is running or when disabled.
    #[must_use]
    pub fn can_be_taken_from(&self) -> bool {
        self.can_be_taken_from.load(Ordering::Acquire)
    }

    pub fn set_can_be_taken_from(&self, value: bool) {
        self.can_be_taken_from.store(value, Ordering::Release);
    }

    pub fn add_timer(&self, timer: &Arc<dyn Timer>) {
        let mut members = self.members.lock();
        members.timers.retain(|weak| weak.strong_count() > 0);
        members.timers.push(Arc::downgrade(timer));
    }

    /// Add a subscription, service, client or waitable according to its kind.
    ///
    /// Returns `false` for kinds that cannot be group members.
    pub fn add_entity(&self, entity: &Arc<dyn ExecutorEntity>) -> bool {
        let mut members = self.members.lock();
        let Some(list) = members.list_mut(entity.kind()) else {
            return false;
        };
        list.retain(|weak| weak.strong_count() > 0);
        list.push(Arc::downgrade(entity));
        true
    }

    /// Drop a member entity by id. Returns whether it was present.
    pub fn remove_entity(&self, entity: &Arc<dyn ExecutorEntity>) -> bool {
        let id = entity.entity_id();
        let mut members = self.members.lock();
        let Some(list) = members.list_mut(entity.kind()) else {
            return false;
        };
        let before = list.len();
        list.retain(|weak| weak.upgrade().is_some_and(|live| live.entity_id() != id));
        list.len() != before
    }

    pub fn remove_timer(&self, timer: &Arc<dyn Timer>) -> bool {
        let target = Arc::as_ptr(timer).cast::<()>();
        let mut members = self.members.lock();
        let before = members.timers.len();
        members
            .timers
            .retain(|weak| weak.strong_count() > 0 && weak.as_ptr().cast::<()>() != target);
        members.timers.len() != before
    }

    /// Live timers in this group.
    #[must_use]
    pub fn timers(&self) -> Vec<Arc<dyn Timer>> {
        self.members
            .lock()
            .timers
            .iter()
            .filter_map(Weak::upgrade)
            .collect()
    }

    /// Live members of the given kind.
    #[must_use]
    pub fn entities(&self, kind: EntityKind) -> Vec<Arc<dyn ExecutorEntity>> {
        self.members
            .lock()
            .list(kind)
            .iter()
            .filter_map(Weak::upgrade)
            .collect()
    }

    /// Live subscriptions, services, clients and waitables, in that order.
    #[must_use]
    pub fn dispatchable_entities(&self) -> Vec<Arc<dyn ExecutorEntity>> {
        let members = self.members.lock();
        [
            EntityKind::Subscription,
            EntityKind::Service,
            EntityKind::Client,
            EntityKind::Waitable,
        ]
        .iter()
        .flat_map(|kind| members.list(*kind).iter().filter_map(Weak::upgrade))
        .collect()
    }
}

impl std::fmt::Debug for CallbackGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let members = self.members.lock();
        f.debug_struct("CallbackGroup")
            .field("kind", &self.kind)
            .field("can_be_taken_from", &self.can_be_taken_from())
            .field("timers", &members.timers.len())
            .field("subscriptions", &members.subscriptions.len())
            .field("services", &members.services.len())
            .field("clients", &members.clients.len())
            .field("waitables", &members.waitables.len())
            .finish()
    }
}

/// The executor-facing part of a node.
pub struct NodeBase {
    name: String,
    associated_with_executor: AtomicBool,
    notify_guard: Arc<GuardCondition>,
    default_group: Arc<CallbackGroup>,
    groups: Mutex<Vec<Weak<CallbackGroup>>>,
}

impl NodeBase {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        let default_group = Arc::new(CallbackGroup::new(CallbackGroupKind::MutuallyExclusive));
        Arc::new(Self {
            name: name.into(),
            associated_with_executor: AtomicBool::new(false),
            notify_guard: Arc::new(GuardCondition::new()),
            groups: Mutex::new(vec![Arc::downgrade(&default_group)]),
            default_group,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Flag claimed by the executor that owns this node.
    #[must_use]
    pub fn associated_with_executor(&self) -> &AtomicBool {
        &self.associated_with_executor
    }

    #[must_use]
    pub fn is_associated_with_executor(&self) -> bool {
        self.associated_with_executor.load(Ordering::Acquire)
    }

    /// Guard triggered whenever an entity is added or removed.
    #[must_use]
    pub fn notify_guard_condition(&self) -> &Arc<GuardCondition> {
        &self.notify_guard
    }

    #[must_use]
    pub fn default_callback_group(&self) -> Arc<CallbackGroup> {
        Arc::clone(&self.default_group)
    }

    /// Create a group owned by the caller; the node only tracks it weakly.
    pub fn create_callback_group(&self, kind: CallbackGroupKind) -> Arc<CallbackGroup> {
        let group = Arc::new(CallbackGroup::new(kind));
        let mut groups = self.groups.lock();
        groups.retain(|weak| weak.strong_count() > 0);
        groups.push(Arc::downgrade(&group));
        group
    }

    /// Snapshot of the callback groups that are still alive.
    #[must_use]
    pub fn callback_groups(&self) -> Vec<Arc<CallbackGroup>> {
        self.groups.lock().iter().filter_map(Weak::upgrade).collect()
    }

    /// Add a timer to `group` (default group when `None`) and notify the executor.
    pub fn add_timer(&self, timer: &Arc<dyn Timer>, group: Option<&Arc<CallbackGroup>>) {
        group.unwrap_or(&self.default_group).add_timer(timer);
        self.notify_guard.trigger();
    }

    /// Add a subscription, service, client or waitable and notify the executor.
    pub fn add_entity(
        &self,
        entity: &Arc<dyn ExecutorEntity>,
        group: Option<&Arc<CallbackGroup>>,
    ) -> bool {
        let added = group.unwrap_or(&self.default_group).add_entity(entity);
        if added {
            self.notify_guard.trigger();
        } else {
            log::warn!(
                "[node] '{}': {:?} entities cannot join a callback group",
                self.name,
                entity.kind()
            );
        }
        added
    }

    /// Remove an entity from every group of this node and notify the executor.
    pub fn remove_entity(&self, entity: &Arc<dyn ExecutorEntity>) -> bool {
        let removed = self
            .callback_groups()
            .iter()
            .fold(false, |acc, group| group.remove_entity(entity) || acc);
        if removed {
            self.notify_guard.trigger();
        }
        removed
    }

    pub fn remove_timer(&self, timer: &Arc<dyn Timer>) -> bool {
        let removed = self
            .callback_groups()
            .iter()
            .fold(false, |acc, group| group.remove_timer(timer) || acc);
        if removed {
            self.notify_guard.trigger();
        }
        removed
    }
}

impl std::fmt::Debug for NodeBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeBase")
            .field("name", &self.name)
            .field(
                "associated_with_executor",
                &self.is_associated_with_executor(),
            )
            .field("groups", &self.groups.lock().len())
            .finish()
    }
}
