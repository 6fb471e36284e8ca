// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Event-driven executor core for HDDS-based ROS 2 client libraries.
//!
//! - [`clock`]: system, steady and ROS clocks with simulated-time override
//!   and time-jump observers
//! - [`timers_queue`]: deadline-ordered timer scheduling
//! - [`collector`]: node ownership and entity wiring
//! - [`intra_process`]: local service endpoint reachable without transport
//! - [`executor`]: the dispatch loop tying the above together
//!
//! # Example
//!
//! ```no_run
//! use hdds_executor::{EventsExecutor, ExecutorConfig, NodeBase, Timer, WallTimer};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let mut executor = EventsExecutor::new(ExecutorConfig::from_env())?;
//! let node = NodeBase::new("talker");
//! let timer: Arc<dyn Timer> = Arc::new(WallTimer::new(
//!     executor.clock().clone(),
//!     Duration::from_millis(100),
//!     || println!("tick"),
//! )?);
//! node.add_timer(&timer, None);
//! executor.add_node(&node)?;
//! executor.spin()?;
//! # Ok::<(), hdds_executor::Error>(())
//! ```

pub mod clock;
pub mod collector;
pub mod config;
pub mod entity;
pub mod error;
pub mod executor;
pub mod guard;
pub mod intra_process;
pub mod node;
pub mod qos;
pub mod time;
pub mod timer;
pub mod timers_queue;
pub mod waitset;

pub use clock::{Clock, JumpHandle};
pub use collector::EntitiesCollector;
pub use config::ExecutorConfig;
pub use entity::{
    EntityId, EntityKind, EventSink, EventSlot, ExecutorCallback, ExecutorEntity, ExecutorEvent,
};
pub use error::{Error, Result};
pub use executor::{CancelHandle, EventsExecutor};
pub use guard::GuardCondition;
pub use intra_process::{ClientIntraProcess, Payload, ServiceHandler, ServiceIntraProcess};
pub use node::{CallbackGroup, CallbackGroupKind, NodeBase};
pub use qos::QosProfile;
pub use time::{ClockChange, ClockKind, JumpThreshold, Time, TimeJump};
pub use timer::{Timer, WallTimer};
pub use timers_queue::TimersQueue;
pub use waitset::WaitSet;
