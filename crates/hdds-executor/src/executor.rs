// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Events executor: single-threaded dispatch loop over an event queue.
//!
//! Every wired entity shares one [`EventQueue`] as its executor callback, so
//! all readiness notifications land in a single `crossbeam` channel. The
//! dispatch thread blocks on that channel for at most the time until the next
//! timer is due, handles one event, then runs the timers that became due.
//!
//! ```text
//! entity.notify --+
//! node guard -----+--> EventQueue (crossbeam channel) --> spin_once
//! interrupt ------+                                          |
//!                                       NodeGraph -> collector.resync
//!                                       entity    -> execute() x count
//!                                       then      -> timers.execute_ready
//! ```

use crate::clock::Clock;
use crate::collector::EntitiesCollector;
use crate::config::ExecutorConfig;
use crate::entity::{
    next_entity_id, EntityId, EntityKind, EventSink, ExecutorCallback, ExecutorEvent,
};
use crate::error::{Error, Result};
use crate::guard::GuardCondition;
use crate::node::NodeBase;
use crate::time::ClockKind;
use crate::timers_queue::TimersQueue;
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TrySendError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Event sink backed by a `crossbeam` channel.
struct EventQueue {
    sender: Sender<ExecutorEvent>,
}

impl EventSink for EventQueue {
    fn push_event(&self, event: ExecutorEvent) {
        match self.sender.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                log::warn!(
                    "[executor] event queue full, dropping {:?} event for entity {}",
                    event.kind,
                    event.entity
                );
            }
            Err(TrySendError::Disconnected(event)) => {
                log::debug!(
                    "[executor] executor gone, dropping {:?} event for entity {}",
                    event.kind,
                    event.entity
                );
            }
        }
    }
}

/// Cloneable handle that stops a spinning executor from any thread.
#[derive(Clone)]
pub struct CancelHandle {
    canceled: Arc<AtomicBool>,
    interrupt: Arc<GuardCondition>,
}

impl CancelHandle {
    /// Make `spin`/`spin_until` return and wake the dispatch thread.
    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::Release);
        self.interrupt.trigger();
    }

    #[must_use]
    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelHandle")
            .field("canceled", &self.is_canceled())
            .finish()
    }
}

pub struct EventsExecutor {
    config: ExecutorConfig,
    clock: Clock,
    receiver: Receiver<ExecutorEvent>,
    collector: EntitiesCollector,
    timers: TimersQueue,
    interrupt_id: EntityId,
    cancel: CancelHandle,
}

impl EventsExecutor {
    pub fn new(config: ExecutorConfig) -> Result<Self> {
        let (sender, receiver) = if config.event_queue_capacity > 0 {
            channel::bounded(config.event_queue_capacity)
        } else {
            channel::unbounded()
        };
        let sink: ExecutorCallback = Arc::new(EventQueue { sender });

        let clock = Clock::new(ClockKind::Ros);
        if config.use_sim_time {
            clock.enable_override()?;
        }

        let interrupt = Arc::new(GuardCondition::new());
        let interrupt_id = next_entity_id();
        interrupt.set_events_executor_callback(
            Some(Arc::clone(&sink)),
            interrupt_id,
            EntityKind::Interrupt,
            false,
        )?;

        log::debug!(
            "[executor] created (sim_time={}, max_wait={:?}, queue_capacity={})",
            config.use_sim_time,
            config.max_wait,
            config.event_queue_capacity
        );

        Ok(Self {
            config,
            clock,
            receiver,
            collector: EntitiesCollector::new(sink),
            timers: TimersQueue::new(),
            interrupt_id,
            cancel: CancelHandle {
                canceled: Arc::new(AtomicBool::new(false)),
                interrupt,
            },
        })
    }

    #[must_use]
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// ROS clock of this executor; override is enabled when simulated time
    /// was requested.
    #[must_use]
    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    /// Take ownership of `node` and wire its entities and timers.
    pub fn add_node(&mut self, node: &Arc<NodeBase>) -> Result<()> {
        self.collector.add_node(node)?;
        self.collector.resync(&mut self.timers)
    }

    /// Unwire `node` and release it. No-op for nodes this executor does not own.
    pub fn remove_node(&mut self, node: &Arc<NodeBase>) -> Result<()> {
        self.collector.remove_node(node, &mut self.timers)
    }

    #[must_use]
    pub fn has_node(&self, node: &Arc<NodeBase>) -> bool {
        self.collector.has_node(node)
    }

    #[must_use]
    pub fn timer_count(&self) -> usize {
        self.timers.len()
    }

    /// Events waiting in the queue.
    #[must_use]
    pub fn pending_events(&self) -> usize {
        self.receiver.len()
    }

    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for one event and dispatch it, then run due timers.
    ///
    /// The wait lasts at most `timeout` (bounded by the configured maximum
    /// wait when `None`) and never past the next timer deadline. Returns the
    /// number of callbacks executed.
    pub fn spin_once(&mut self, timeout: Option<Duration>) -> Result<usize> {
        let mut bound = timeout.map_or(self.config.max_wait, |t| t.min(self.config.max_wait));
        if let Some(head) = self.timers.wait_timeout()? {
            bound = bound.min(head);
        }

        let mut executed = match self.receiver.recv_timeout(bound) {
            Ok(event) => self.dispatch(event)?,
            Err(RecvTimeoutError::Timeout) => 0,
            Err(RecvTimeoutError::Disconnected) => return Err(Error::Shutdown),
        };
        executed += self.timers.execute_ready()?;
        Ok(executed)
    }

    /// Dispatch every event already queued and run due timers, without
    /// blocking. Returns the number of callbacks executed.
    pub fn spin_some(&mut self) -> Result<usize> {
        let mut executed = 0;
        while let Ok(event) = self.receiver.try_recv() {
            executed += self.dispatch(event)?;
        }
        executed += self.timers.execute_ready()?;
        Ok(executed)
    }

    /// Spin until canceled.
    pub fn spin(&mut self) -> Result<()> {
        self.spin_until(|| false, None).map(|_| ())
    }

    /// Spin until `predicate` holds, `timeout` expires or the executor is
    /// canceled. Returns whether the predicate was satisfied.
    ///
    /// A timeout too large to represent as a deadline spins without one.
    ///
    /// The cancel flag is consumed on return, so the executor can spin again.
    pub fn spin_until<P>(&mut self, mut predicate: P, timeout: Option<Duration>) -> Result<bool>
    where
        P: FnMut() -> bool,
    {
        let deadline = timeout.and_then(|timeout| Instant::now().checked_add(timeout));
        let result = loop {
            if predicate() {
                break Ok(true);
            }
            if self.cancel.canceled.load(Ordering::Acquire) {
                log::debug!("[executor] spin canceled");
                break Ok(false);
            }
            let remaining = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        break Ok(false);
                    }
                    Some(deadline - now)
                }
                None => None,
            };
            if let Err(err) = self.spin_once(remaining) {
                break Err(err);
            }
        };
        self.cancel.canceled.store(false, Ordering::Release);
        result
    }

    fn dispatch(&mut self, event: ExecutorEvent) -> Result<usize> {
        match event.kind {
            EntityKind::NodeGraph => {
                self.collector.resync(&mut self.timers)?;
                Ok(0)
            }
            EntityKind::Interrupt => {
                debug_assert_eq!(event.entity, self.interrupt_id);
                Ok(0)
            }
            EntityKind::Subscription
            | EntityKind::Service
            | EntityKind::Client
            | EntityKind::Waitable => {
                let Some(entity) = self.collector.entity(event.entity) else {
                    log::debug!(
                        "[executor] {:?} entity {} no longer wired, event dropped",
                        event.kind,
                        event.entity
                    );
                    return Ok(0);
                };
                for _ in 0..event.count {
                    entity.execute()?;
                }
                Ok(event.count)
            }
        }
    }
}

impl std::fmt::Debug for EventsExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventsExecutor")
            .field("config", &self.config)
            .field("collector", &self.collector)
            .field("timers", &self.timers)
            .field("pending_events", &self.receiver.len())
            .finish()
    }
}
