// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Intra-process service endpoint.
//!
//! Local clients reach a local service without going through the transport:
//! a client queues its request here, the service's guard condition wakes the
//! executor, and the response is handed straight back to the client object
//! registered under the request's client id.
//!
//! ```text
//! client --queue_request(id, req)--> ServiceIntraProcess --guard--> executor
//!                                          |
//!                     execute(): handler(req) -> send_response(id, resp)
//!                                          |
//! client <--------store_response(resp)-----+
//! ```
//!
//! # Thread Safety
//!
//! The client table sits behind a `parking_lot::ReentrantMutex`: responses
//! are delivered with the lock held, and a client reacting to its response
//! may register another client on the same thread. `RefCell` borrows never
//! span a call into client code.

use crate::entity::{next_entity_id, EntityId, EntityKind, ExecutorCallback, ExecutorEntity};
use crate::error::{Error, Result};
use crate::guard::GuardCondition;
use crate::qos::QosProfile;
use crate::waitset::WaitSet;
use parking_lot::{Mutex, ReentrantMutex};
use std::any::Any;
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Weak};

/// Type-erased request or response.
pub type Payload = Box<dyn Any + Send>;

/// Turns a request into a response.
pub type ServiceHandler = Box<dyn Fn(Payload) -> Payload + Send + Sync>;

/// A local client able to receive responses directly.
pub trait ClientIntraProcess: Send + Sync {
    fn store_response(&self, response: Payload);
}

type ClientTable = HashMap<u64, Weak<dyn ClientIntraProcess>>;

pub struct ServiceIntraProcess {
    entity: EntityId,
    service_name: String,
    qos: QosProfile,
    guard: Arc<GuardCondition>,
    clients: ReentrantMutex<RefCell<ClientTable>>,
    requests: Mutex<VecDeque<(u64, Payload)>>,
    handler: ServiceHandler,
}

impl ServiceIntraProcess {
    pub fn new(
        service_name: impl Into<String>,
        qos: QosProfile,
        handler: ServiceHandler,
    ) -> Result<Self> {
        qos.validate().map_err(Error::InvalidArgument)?;
        Ok(Self {
            entity: next_entity_id(),
            service_name: service_name.into(),
            qos,
            guard: Arc::new(GuardCondition::new()),
            clients: ReentrantMutex::new(RefCell::new(HashMap::new())),
            requests: Mutex::new(VecDeque::new()),
            handler,
        })
    }

    #[must_use]
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    #[must_use]
    pub fn actual_qos(&self) -> QosProfile {
        self.qos
    }

    /// Guard triggered whenever a request is queued.
    #[must_use]
    pub fn guard_condition(&self) -> &Arc<GuardCondition> {
        &self.guard
    }

    /// Attach the guard condition so queued requests wake `wait_set`.
    pub fn add_to_wait_set(&self, wait_set: &WaitSet) -> bool {
        if let Err(err) = wait_set.attach_guard(&self.guard) {
            log::debug!(
                "[intra-process] '{}' already in wait set: {}",
                self.service_name,
                err
            );
        }
        true
    }

    /// Register (or replace) the client reachable under `client_id`.
    pub fn add_intra_process_client(&self, client: &Arc<dyn ClientIntraProcess>, client_id: u64) {
        let clients = self.clients.lock();
        clients
            .borrow_mut()
            .insert(client_id, Arc::downgrade(client));
    }

    pub fn remove_intra_process_client(&self, client_id: u64) -> bool {
        let clients = self.clients.lock();
        let removed = clients.borrow_mut().remove(&client_id).is_some();
        removed
    }

    #[must_use]
    pub fn has_client(&self, client_id: u64) -> bool {
        let clients = self.clients.lock();
        let present = clients.borrow().contains_key(&client_id);
        present
    }

    #[must_use]
    pub fn client_count(&self) -> usize {
        let clients = self.clients.lock();
        let count = clients.borrow().len();
        count
    }

    /// Buffer a request from `client_id` and wake the executor.
    ///
    /// With a KeepLast(n) profile the oldest request is dropped once `n`
    /// are pending.
    pub fn queue_request(&self, client_id: u64, request: Payload) {
        {
            let mut requests = self.requests.lock();
            if let Some(depth) = self.qos.depth() {
                while requests.len() >= depth {
                    if let Some((dropped, _)) = requests.pop_front() {
                        log::warn!(
                            "[intra-process] '{}' request buffer full, dropping request from client {}",
                            self.service_name,
                            dropped
                        );
                    }
                }
            }
            requests.push_back((client_id, request));
        }
        self.guard.trigger();
    }

    /// Oldest pending request and the id of the client that sent it.
    pub fn take_request(&self) -> Option<(u64, Payload)> {
        self.requests.lock().pop_front()
    }

    #[must_use]
    pub fn pending_requests(&self) -> usize {
        self.requests.lock().len()
    }

    /// Hand `response` to the client registered under `client_id`.
    ///
    /// A client that was dropped is unregistered and reported as
    /// [`Error::ClientGone`].
    pub fn send_response(&self, client_id: u64, response: Payload) -> Result<()> {
        let clients = self.clients.lock();
        let entry = clients.borrow().get(&client_id).cloned();
        match entry.and_then(|weak| weak.upgrade()) {
            Some(client) => {
                client.store_response(response);
                Ok(())
            }
            None => {
                clients.borrow_mut().remove(&client_id);
                log::warn!(
                    "[intra-process] '{}': client {} is gone, response dropped",
                    self.service_name,
                    client_id
                );
                Err(Error::ClientGone(client_id))
            }
        }
    }
}

impl ExecutorEntity for ServiceIntraProcess {
    fn entity_id(&self) -> EntityId {
        self.entity
    }

    fn kind(&self) -> EntityKind {
        EntityKind::Waitable
    }

    fn set_events_executor_callback(&self, callback: Option<ExecutorCallback>) {
        if let Err(err) =
            self.guard
                .set_events_executor_callback(callback, self.entity, EntityKind::Waitable, true)
        {
            log::error!(
                "[intra-process] '{}': failed to set executor callback: {}",
                self.service_name,
                err
            );
        }
    }

    fn execute(&self) -> Result<()> {
        let Some((client_id, request)) = self.take_request() else {
            return Ok(());
        };
        let response = (self.handler)(request);
        self.send_response(client_id, response)
    }
}

impl std::fmt::Debug for ServiceIntraProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceIntraProcess")
            .field("service_name", &self.service_name)
            .field("qos", &self.qos)
            .field("clients", &self.client_count())
            .field("pending_requests", &self.pending_requests())
            .finish()
    }
}
