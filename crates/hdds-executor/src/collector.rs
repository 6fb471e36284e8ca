// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Entities collector: tracks the executor's nodes and wires their entities.
//!
//! The collector holds only weak references to nodes. It hooks each node's
//! notify guard to the executor so that entity additions while spinning
//! arrive as [`EntityKind::NodeGraph`] events; the executor answers those
//! with [`EntitiesCollector::resync`], which rebuilds the whole wiring from
//! the live graph.
//!
//! # Wiring
//!
//! ```text
//! node -> callback groups (takeable only) -> entities
//!   timer                       -> TimersQueue::add
//!   subscription/service/
//!   client/waitable             -> set_events_executor_callback(Some(sink))
//! ```
//!
//! Groups that cannot be taken from are skipped silently, both when wiring
//! and when unwiring: they may become takeable again later.
//!
//! # Thread Safety
//!
//! Only the node association flag is safe to race on. `add_node`,
//! `remove_node` and `resync` take `&mut self`; callers on different threads
//! must serialize them.

use crate::entity::{next_entity_id, EntityId, EntityKind, ExecutorCallback, ExecutorEntity};
use crate::error::{Error, Result};
use crate::node::NodeBase;
use crate::timers_queue::TimersQueue;
use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Weak};

pub struct EntitiesCollector {
    /// Id the node guards report graph changes under.
    id: EntityId,
    callback: ExecutorCallback,
    weak_nodes: Vec<Weak<NodeBase>>,
    /// Entities wired by the last resync, for event dispatch.
    entities: HashMap<EntityId, Weak<dyn ExecutorEntity>>,
}

impl EntitiesCollector {
    /// Create a collector that wires entities to `callback`.
    #[must_use]
    pub fn new(callback: ExecutorCallback) -> Self {
        Self {
            id: next_entity_id(),
            callback,
            weak_nodes: Vec::new(),
            entities: HashMap::new(),
        }
    }

    /// Id carried by [`EntityKind::NodeGraph`] events of tracked nodes.
    #[must_use]
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Start tracking `node`.
    ///
    /// Fails with [`Error::NodeAlreadyOwned`] if another executor (or this
    /// one) already claimed the node. Entities are wired on the next
    /// [`EntitiesCollector::resync`].
    pub fn add_node(&mut self, node: &Arc<NodeBase>) -> Result<()> {
        if node
            .associated_with_executor()
            .swap(true, Ordering::AcqRel)
        {
            return Err(Error::NodeAlreadyOwned(node.name().to_string()));
        }

        if let Err(err) = node.notify_guard_condition().set_events_executor_callback(
            Some(Arc::clone(&self.callback)),
            self.id,
            EntityKind::NodeGraph,
            false,
        ) {
            node.associated_with_executor()
                .store(false, Ordering::Release);
            return Err(err);
        }

        self.weak_nodes.push(Arc::downgrade(node));
        log::debug!("[collector] added node '{}'", node.name());
        Ok(())
    }

    /// Stop tracking `node` and unwire everything in its takeable groups.
    ///
    /// No-op if the node is not tracked. The node can be added to an executor
    /// again afterwards.
    pub fn remove_node(&mut self, node: &Arc<NodeBase>, timers: &mut TimersQueue) -> Result<()> {
        let target = Arc::as_ptr(node);
        let Some(index) = self
            .weak_nodes
            .iter()
            .position(|weak| weak.as_ptr() == target && weak.strong_count() > 0)
        else {
            return Ok(());
        };

        node.notify_guard_condition()
            .set_events_executor_callback(None, self.id, EntityKind::NodeGraph, false)
            .map_err(|err| {
                Error::Registration(format!(
                    "couldn't unset guard condition callback of node '{}': {}",
                    node.name(),
                    err
                ))
            })?;

        for group in node.callback_groups() {
            if !group.can_be_taken_from() {
                continue;
            }
            for timer in group.timers() {
                timers.remove(&timer);
            }
            for entity in group.dispatchable_entities() {
                entity.set_events_executor_callback(None);
                self.entities.remove(&entity.entity_id());
            }
        }

        self.weak_nodes.remove(index);
        node.associated_with_executor()
            .store(false, Ordering::Release);
        log::debug!("[collector] removed node '{}'", node.name());
        Ok(())
    }

    /// Rebuild the full wiring from the live node graph.
    ///
    /// Clears `timers`, then re-adds every timer and re-wires every other
    /// entity of every takeable group. Nodes that no longer exist are dropped.
    pub fn resync(&mut self, timers: &mut TimersQueue) -> Result<()> {
        timers.clear();
        self.entities.clear();
        self.weak_nodes.retain(|weak| weak.strong_count() > 0);

        for weak_node in &self.weak_nodes {
            let Some(node) = weak_node.upgrade() else {
                continue;
            };
            for group in node.callback_groups() {
                if !group.can_be_taken_from() {
                    continue;
                }
                for timer in group.timers() {
                    timers.add(timer)?;
                }
                for entity in group.dispatchable_entities() {
                    entity.set_events_executor_callback(Some(Arc::clone(&self.callback)));
                    self.entities
                        .insert(entity.entity_id(), Arc::downgrade(&entity));
                }
            }
        }

        log::debug!(
            "[collector] resync: {} nodes, {} timers, {} entities",
            self.weak_nodes.len(),
            timers.len(),
            self.entities.len()
        );
        Ok(())
    }

    /// Look up a wired entity by the id carried in its events.
    #[must_use]
    pub fn entity(&self, id: EntityId) -> Option<Arc<dyn ExecutorEntity>> {
        self.entities.get(&id).and_then(Weak::upgrade)
    }

    /// Number of tracked nodes that are still alive.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.weak_nodes
            .iter()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    #[must_use]
    pub fn has_node(&self, node: &Arc<NodeBase>) -> bool {
        let target = Arc::as_ptr(node);
        self.weak_nodes.iter().any(|weak| weak.as_ptr() == target)
    }

    /// Number of entities wired by the last resync.
    #[must_use]
    pub fn wired_entity_count(&self) -> usize {
        self.entities.len()
    }
}

impl Drop for EntitiesCollector {
    fn drop(&mut self) {
        for entity in self.entities.drain().filter_map(|(_, weak)| weak.upgrade()) {
            entity.set_events_executor_callback(None);
        }
        for weak_node in self.weak_nodes.drain(..) {
            let Some(node) = weak_node.upgrade() else {
                continue;
            };
            node.associated_with_executor()
                .store(false, Ordering::Release);
            if let Err(err) = node.notify_guard_condition().set_events_executor_callback(
                None,
                self.id,
                EntityKind::NodeGraph,
                false,
            ) {
                log::error!(
                    "[collector] failed to unwire node '{}' on teardown: {}",
                    node.name(),
                    err
                );
            }
        }
    }
}

impl std::fmt::Debug for EntitiesCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntitiesCollector")
            .field("id", &self.id)
            .field("nodes", &self.weak_nodes.len())
            .field("entities", &self.entities.len())
            .finish()
    }
}

#[cfg(test)]
mod tests;
