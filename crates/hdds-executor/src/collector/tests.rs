// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use super::*;
use crate::entity::{same_callback, EventSink, EventSlot, ExecutorEvent};
use crate::node::CallbackGroupKind;
use crate::timer::Timer;
use parking_lot::Mutex;
use std::sync::atomic::AtomicUsize;
use std::thread;

#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<ExecutorEvent>>,
}

impl EventSink for RecordingSink {
    fn push_event(&self, event: ExecutorEvent) {
        self.events.lock().push(event);
    }
}

struct TestEntity {
    slot: EventSlot,
    executed: AtomicUsize,
}

impl TestEntity {
    fn new(kind: EntityKind) -> Arc<Self> {
        Arc::new(Self {
            slot: EventSlot::new(next_entity_id(), kind),
            executed: AtomicUsize::new(0),
        })
    }
}

impl ExecutorEntity for TestEntity {
    fn entity_id(&self) -> EntityId {
        self.slot.entity()
    }

    fn kind(&self) -> EntityKind {
        self.slot.kind()
    }

    fn set_events_executor_callback(&self, callback: Option<ExecutorCallback>) {
        self.slot.set(callback);
    }

    fn execute(&self) -> Result<()> {
        self.executed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct IdleTimer;

impl Timer for IdleTimer {
    fn time_until_trigger(&self) -> Result<i64> {
        Ok(1_000_000_000)
    }

    fn execute_callback(&self) -> Result<()> {
        Ok(())
    }
}

struct Fixture {
    sink: Arc<RecordingSink>,
    collector: EntitiesCollector,
    timers: TimersQueue,
}

impl Fixture {
    fn new() -> Self {
        let sink = Arc::new(RecordingSink::default());
        let collector = EntitiesCollector::new(sink.clone());
        Self {
            sink,
            collector,
            timers: TimersQueue::new(),
        }
    }
}

/// Node with one entity of every kind plus a timer in its default group.
struct PopulatedNode {
    node: Arc<NodeBase>,
    entities: Vec<Arc<TestEntity>>,
    timer: Arc<dyn Timer>,
}

fn populated_node(name: &str) -> PopulatedNode {
    let node = NodeBase::new(name);
    let entities: Vec<Arc<TestEntity>> = [
        EntityKind::Subscription,
        EntityKind::Service,
        EntityKind::Client,
        EntityKind::Waitable,
    ]
    .into_iter()
    .map(TestEntity::new)
    .collect();
    for entity in &entities {
        let as_entity: Arc<dyn ExecutorEntity> = entity.clone();
        assert!(node.add_entity(&as_entity, None));
    }
    let timer: Arc<dyn Timer> = Arc::new(IdleTimer);
    node.add_timer(&timer, None);
    PopulatedNode {
        node,
        entities,
        timer,
    }
}

/// Whether the collector can dispatch to `entity`.
fn is_wired<E: ExecutorEntity + ?Sized>(entity: &Arc<E>, collector: &EntitiesCollector) -> bool {
    collector.entity(entity.entity_id()).is_some()
}

#[test]
fn add_node_claims_ownership_once() {
    let mut fixture = Fixture::new();
    let node = NodeBase::new("talker");

    fixture.collector.add_node(&node).expect("first add");
    assert!(node.is_associated_with_executor());
    assert!(matches!(
        fixture.collector.add_node(&node),
        Err(Error::NodeAlreadyOwned(name)) if name == "talker"
    ));

    let mut other = Fixture::new();
    assert!(matches!(
        other.collector.add_node(&node),
        Err(Error::NodeAlreadyOwned(_))
    ));
    assert_eq!(fixture.collector.node_count(), 1);
    assert_eq!(other.collector.node_count(), 0);
}

#[test]
fn concurrent_add_node_has_single_winner() {
    let node = NodeBase::new("contended");
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let node = Arc::clone(&node);
            thread::spawn(move || {
                let mut fixture = Fixture::new();
                fixture.collector.add_node(&node).ok().map(|()| fixture)
            })
        })
        .collect();

    let winners: Vec<Fixture> = handles
        .into_iter()
        .filter_map(|handle| handle.join().expect("join"))
        .collect();
    assert_eq!(winners.len(), 1);
    assert!(node.is_associated_with_executor());
}

#[test]
fn resync_wires_every_entity_and_timer() {
    let mut fixture = Fixture::new();
    let populated = populated_node("full");
    fixture.collector.add_node(&populated.node).expect("add");

    fixture
        .collector
        .resync(&mut fixture.timers)
        .expect("resync");

    assert_eq!(fixture.timers.len(), 1);
    assert!(fixture.timers.contains(&populated.timer));
    assert_eq!(fixture.collector.wired_entity_count(), 4);
    let sink: ExecutorCallback = fixture.sink.clone();
    for entity in &populated.entities {
        assert!(is_wired(entity, &fixture.collector));
        let assigned = entity.slot.callback().expect("slot wired");
        assert!(same_callback(&assigned, &sink));
    }
}

#[test]
fn resync_is_idempotent() {
    let mut fixture = Fixture::new();
    let populated = populated_node("stable");
    fixture.collector.add_node(&populated.node).expect("add");

    fixture.collector.resync(&mut fixture.timers).expect("first");
    let timers_after_first = fixture.timers.len();
    let mut wired_first: Vec<EntityId> = populated
        .entities
        .iter()
        .filter(|entity| is_wired(*entity, &fixture.collector))
        .map(|entity| entity.entity_id())
        .collect();

    fixture.collector.resync(&mut fixture.timers).expect("second");
    let mut wired_second: Vec<EntityId> = populated
        .entities
        .iter()
        .filter(|entity| is_wired(*entity, &fixture.collector))
        .map(|entity| entity.entity_id())
        .collect();

    wired_first.sort_unstable();
    wired_second.sort_unstable();
    assert_eq!(timers_after_first, fixture.timers.len());
    assert_eq!(wired_first, wired_second);
    assert_eq!(fixture.collector.wired_entity_count(), 4);
}

#[test]
fn non_takeable_groups_are_skipped() {
    let mut fixture = Fixture::new();
    let node = NodeBase::new("exclusive");
    let group = node.create_callback_group(CallbackGroupKind::MutuallyExclusive);
    let busy: Arc<dyn ExecutorEntity> = TestEntity::new(EntityKind::Subscription);
    let busy_timer: Arc<dyn Timer> = Arc::new(IdleTimer);
    node.add_entity(&busy, Some(&group));
    node.add_timer(&busy_timer, Some(&group));
    group.set_can_be_taken_from(false);

    fixture.collector.add_node(&node).expect("add");
    fixture.collector.resync(&mut fixture.timers).expect("resync");
    assert!(fixture.timers.is_empty());
    assert!(!is_wired(&busy, &fixture.collector));

    group.set_can_be_taken_from(true);
    fixture.collector.resync(&mut fixture.timers).expect("resync");
    assert_eq!(fixture.timers.len(), 1);
    assert!(is_wired(&busy, &fixture.collector));
}

#[test]
fn remove_node_unwires_and_releases() {
    let mut fixture = Fixture::new();
    let populated = populated_node("leaving");
    let staying = populated_node("staying");
    fixture.collector.add_node(&populated.node).expect("add");
    fixture.collector.add_node(&staying.node).expect("add");
    fixture.collector.resync(&mut fixture.timers).expect("resync");
    assert_eq!(fixture.timers.len(), 2);

    fixture
        .collector
        .remove_node(&populated.node, &mut fixture.timers)
        .expect("remove");

    assert_eq!(fixture.timers.len(), 1);
    assert!(!fixture.timers.contains(&populated.timer));
    for entity in &populated.entities {
        assert!(!is_wired(entity, &fixture.collector));
        assert!(!entity.slot.is_wired());
    }
    for entity in &staying.entities {
        assert!(is_wired(entity, &fixture.collector));
        assert!(entity.slot.is_wired());
    }
    assert!(!populated.node.is_associated_with_executor());
    assert!(!populated.node.notify_guard_condition().is_wired());
    assert!(!fixture.collector.has_node(&populated.node));

    // Free to join another executor now.
    let mut other = Fixture::new();
    other.collector.add_node(&populated.node).expect("re-add");
}

#[test]
fn remove_node_skips_non_takeable_groups() {
    let mut fixture = Fixture::new();
    let node = NodeBase::new("busy");
    let group = node.create_callback_group(CallbackGroupKind::MutuallyExclusive);
    let busy = TestEntity::new(EntityKind::Subscription);
    let idle = TestEntity::new(EntityKind::Subscription);
    let busy_entity: Arc<dyn ExecutorEntity> = busy.clone();
    let idle_entity: Arc<dyn ExecutorEntity> = idle.clone();
    node.add_entity(&busy_entity, Some(&group));
    node.add_entity(&idle_entity, None);
    fixture.collector.add_node(&node).expect("add");
    fixture.collector.resync(&mut fixture.timers).expect("resync");
    assert!(busy.slot.is_wired());

    group.set_can_be_taken_from(false);
    fixture
        .collector
        .remove_node(&node, &mut fixture.timers)
        .expect("remove");

    assert!(busy.slot.is_wired(), "group was not takeable at removal");
    assert!(!idle.slot.is_wired());
    assert!(!node.is_associated_with_executor());
}

#[test]
fn remove_untracked_node_is_noop() {
    let mut fixture = Fixture::new();
    let stranger = NodeBase::new("stranger");
    fixture
        .collector
        .remove_node(&stranger, &mut fixture.timers)
        .expect("noop");
    assert!(!stranger.is_associated_with_executor());
}

#[test]
fn remove_node_surfaces_guard_failure() {
    let mut fixture = Fixture::new();
    let node = NodeBase::new("broken");
    fixture.collector.add_node(&node).expect("add");
    node.notify_guard_condition().finalize();

    let result = fixture.collector.remove_node(&node, &mut fixture.timers);
    assert!(matches!(result, Err(Error::Registration(_))));
    assert!(fixture.collector.has_node(&node));
}

#[test]
fn add_node_rolls_back_on_guard_failure() {
    let mut fixture = Fixture::new();
    let node = NodeBase::new("finalized");
    node.notify_guard_condition().finalize();
    assert!(matches!(
        fixture.collector.add_node(&node),
        Err(Error::Registration(_))
    ));
    assert!(!node.is_associated_with_executor());
    assert_eq!(fixture.collector.node_count(), 0);
}

#[test]
fn teardown_disassociates_tracked_nodes() {
    let node_a = NodeBase::new("a");
    let node_b = NodeBase::new("b");
    {
        let mut fixture = Fixture::new();
        fixture.collector.add_node(&node_a).expect("add a");
        fixture.collector.add_node(&node_b).expect("add b");
        assert!(node_a.is_associated_with_executor());
        assert!(node_b.is_associated_with_executor());
    }
    assert!(!node_a.is_associated_with_executor());
    assert!(!node_b.is_associated_with_executor());
}

#[test]
fn dropped_nodes_and_entities_are_skipped() {
    let mut fixture = Fixture::new();
    let populated = populated_node("ephemeral");
    let survivor = NodeBase::new("survivor");
    fixture.collector.add_node(&populated.node).expect("add");
    fixture.collector.add_node(&survivor).expect("add");

    let transient: Arc<dyn ExecutorEntity> = TestEntity::new(EntityKind::Subscription);
    survivor.add_entity(&transient, None);
    drop(transient);

    drop(populated);
    fixture.collector.resync(&mut fixture.timers).expect("resync");
    assert_eq!(fixture.collector.node_count(), 1);
    assert!(fixture.timers.is_empty());
    assert_eq!(fixture.collector.wired_entity_count(), 0);
}

#[test]
fn entity_added_while_tracked_raises_graph_event() {
    let mut fixture = Fixture::new();
    let node = NodeBase::new("growing");
    fixture.collector.add_node(&node).expect("add");
    assert!(fixture.sink.events.lock().is_empty());

    let late: Arc<dyn ExecutorEntity> = TestEntity::new(EntityKind::Service);
    node.add_entity(&late, None);

    let events = fixture.sink.events.lock().clone();
    assert_eq!(
        events,
        vec![ExecutorEvent {
            entity: fixture.collector.id(),
            kind: EntityKind::NodeGraph,
            count: 1,
        }]
    );

    fixture.collector.resync(&mut fixture.timers).expect("resync");
    assert!(is_wired(&late, &fixture.collector));
}

#[test]
fn wired_entity_notifies_the_shared_sink() {
    let mut fixture = Fixture::new();
    let node = NodeBase::new("notifier");
    let subscription = TestEntity::new(EntityKind::Subscription);
    let as_entity: Arc<dyn ExecutorEntity> = subscription.clone();
    node.add_entity(&as_entity, None);
    fixture.collector.add_node(&node).expect("add");
    fixture.sink.events.lock().clear();

    fixture.collector.resync(&mut fixture.timers).expect("resync");
    let sink: ExecutorCallback = fixture.sink.clone();
    let assigned = subscription.slot.callback().expect("slot wired");
    assert!(same_callback(&assigned, &sink));
    subscription.slot.notify(3);

    let events = fixture.sink.events.lock().clone();
    assert_eq!(
        events,
        vec![ExecutorEvent {
            entity: subscription.entity_id(),
            kind: EntityKind::Subscription,
            count: 3,
        }]
    );
}
