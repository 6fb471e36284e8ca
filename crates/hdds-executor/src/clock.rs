// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Time source with simulation-time override and jump notification.
//!
//! A [`Clock`] samples system, steady or "ROS" time. A ROS clock reports
//! system time until an override is enabled, after which it reports whatever
//! value was last pushed with [`Clock::set_override_time`] (typically fed
//! from a `/clock` topic).
//!
//! Discontinuities are announced to jump handlers registered with
//! [`Clock::create_jump_callback`]. Each handler is filtered by its own
//! [`JumpThreshold`]; selected handlers get their pre-callback before the
//! value changes and their post-callback after.
//!
//! ```text
//! set_override_time(t)
//!   +-- select handlers whose threshold matches (t - current)
//!   +-- pre_callback()  for each selected
//!   +-- store t
//!   +-- post_callback(&jump) for each selected
//! ```
//!
//! Callbacks run synchronously on the caller's thread and never under the
//! handler lock, so a callback may drop its own [`JumpHandle`].

use crate::error::{Error, Result};
use crate::time::{ClockChange, ClockKind, JumpThreshold, Time, TimeJump};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Callback run immediately before a jump is applied.
pub type PreJumpCallback = Box<dyn Fn() + Send + Sync>;
/// Callback run immediately after a jump is applied.
pub type PostJumpCallback = Box<dyn Fn(&TimeJump) + Send + Sync>;

/// A registered pair of jump callbacks and the threshold gating them.
pub struct JumpHandler {
    id: u64,
    pre_callback: Option<PreJumpCallback>,
    post_callback: Option<PostJumpCallback>,
    threshold: JumpThreshold,
}

impl JumpHandler {
    /// Threshold this handler was registered with.
    #[must_use]
    pub fn threshold(&self) -> JumpThreshold {
        self.threshold
    }
}

impl std::fmt::Debug for JumpHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JumpHandler")
            .field("id", &self.id)
            .field("pre_callback", &self.pre_callback.is_some())
            .field("post_callback", &self.post_callback.is_some())
            .field("threshold", &self.threshold)
            .finish()
    }
}

#[derive(Debug, Default)]
struct OverrideState {
    enabled: bool,
    nanoseconds: i64,
}

struct ClockInner {
    kind: ClockKind,
    overrides: Mutex<OverrideState>,
    handlers: Mutex<Vec<Arc<JumpHandler>>>,
    next_handler_id: AtomicU64,
}

impl ClockInner {
    fn remove_handler(&self, id: u64) -> bool {
        let mut handlers = self.handlers.lock();
        let before = handlers.len();
        handlers.retain(|handler| handler.id != id);
        handlers.len() != before
    }
}

/// Shared handle to a time source. Clones observe the same override state
/// and jump handlers.
#[derive(Clone)]
pub struct Clock {
    inner: Arc<ClockInner>,
}

impl Clock {
    /// Create a clock of the given kind. ROS clocks start with override disabled.
    #[must_use]
    pub fn new(kind: ClockKind) -> Self {
        Self {
            inner: Arc::new(ClockInner {
                kind,
                overrides: Mutex::new(OverrideState::default()),
                handlers: Mutex::new(Vec::new()),
                next_handler_id: AtomicU64::new(1),
            }),
        }
    }

    /// Kind of time this clock reports.
    #[must_use]
    pub fn kind(&self) -> ClockKind {
        self.inner.kind
    }

    /// Sample the current time.
    pub fn now(&self) -> Result<Time> {
        let nanoseconds = match self.inner.kind {
            ClockKind::System => system_nanos()?,
            ClockKind::Steady => steady_nanos()?,
            ClockKind::Ros => {
                let overrides = self.inner.overrides.lock();
                if overrides.enabled {
                    overrides.nanoseconds
                } else {
                    drop(overrides);
                    system_nanos()?
                }
            }
        };
        Ok(Time::from_nanos(nanoseconds, self.inner.kind))
    }

    /// True iff this is a ROS clock with simulation-time override enabled.
    ///
    /// Querying a non-ROS clock is a failure that is logged, not returned.
    pub fn is_override_active(&self) -> bool {
        if self.inner.kind != ClockKind::Ros {
            log::warn!(
                "[clock] override query on a {} clock, only ros clocks can be overridden",
                self.inner.kind
            );
            return false;
        }
        self.inner.overrides.lock().enabled
    }

    /// Switch a ROS clock to simulation time.
    ///
    /// Dispatches a [`ClockChange::RosTimeActivated`] jump whose delta is the
    /// override value minus the current system time. No-op if already enabled.
    pub fn enable_override(&self) -> Result<()> {
        self.require_ros()?;
        let (enabled, override_ns) = {
            let overrides = self.inner.overrides.lock();
            (overrides.enabled, overrides.nanoseconds)
        };
        if enabled {
            return Ok(());
        }
        let jump = TimeJump {
            clock_change: ClockChange::RosTimeActivated,
            delta: override_ns.saturating_sub(system_nanos()?),
        };
        self.dispatch_jump(jump, |state| state.enabled = true);
        log::debug!("[clock] ros time override enabled (delta={}ns)", jump.delta);
        Ok(())
    }

    /// Switch a ROS clock back to system time. No-op if already disabled.
    pub fn disable_override(&self) -> Result<()> {
        self.require_ros()?;
        let (enabled, override_ns) = {
            let overrides = self.inner.overrides.lock();
            (overrides.enabled, overrides.nanoseconds)
        };
        if !enabled {
            return Ok(());
        }
        let jump = TimeJump {
            clock_change: ClockChange::RosTimeDeactivated,
            delta: system_nanos()?.saturating_sub(override_ns),
        };
        self.dispatch_jump(jump, |state| state.enabled = false);
        log::debug!("[clock] ros time override disabled (delta={}ns)", jump.delta);
        Ok(())
    }

    /// Set the simulation time of a ROS clock.
    ///
    /// While override is enabled this is a jump of `new - current`; while
    /// disabled the value is stored silently and reported once enabled.
    pub fn set_override_time(&self, nanoseconds: i64) -> Result<()> {
        self.require_ros()?;
        let current = {
            let mut overrides = self.inner.overrides.lock();
            if !overrides.enabled {
                overrides.nanoseconds = nanoseconds;
                return Ok(());
            }
            overrides.nanoseconds
        };
        let jump = TimeJump {
            clock_change: ClockChange::RosTimeNoChange,
            delta: nanoseconds.saturating_sub(current),
        };
        self.dispatch_jump(jump, |state| state.nanoseconds = nanoseconds);
        Ok(())
    }

    /// Register jump callbacks.
    ///
    /// Both callbacks are optional. The returned handle deregisters them when
    /// dropped. Nothing is registered if this returns an error.
    pub fn create_jump_callback(
        &self,
        pre_callback: Option<PreJumpCallback>,
        post_callback: Option<PostJumpCallback>,
        threshold: JumpThreshold,
    ) -> Result<JumpHandle> {
        if !threshold.is_valid() {
            return Err(Error::Registration(format!(
                "invalid jump threshold: min_forward={} min_backward={}",
                threshold.min_forward, threshold.min_backward
            )));
        }

        let id = self.inner.next_handler_id.fetch_add(1, Ordering::Relaxed);
        let handler = Arc::new(JumpHandler {
            id,
            pre_callback,
            post_callback,
            threshold,
        });

        let mut handlers = self.inner.handlers.lock();
        handlers
            .try_reserve(1)
            .map_err(|err| Error::Allocation(format!("jump handler storage: {}", err)))?;
        handlers.push(handler);

        Ok(JumpHandle {
            clock: Arc::downgrade(&self.inner),
            id,
        })
    }

    /// Number of currently registered jump handlers.
    #[must_use]
    pub fn jump_handler_count(&self) -> usize {
        self.inner.handlers.lock().len()
    }

    fn require_ros(&self) -> Result<()> {
        if self.inner.kind == ClockKind::Ros {
            Ok(())
        } else {
            Err(Error::ClockKindMismatch {
                expected: ClockKind::Ros,
                actual: self.inner.kind,
            })
        }
    }

    fn dispatch_jump(&self, jump: TimeJump, apply: impl FnOnce(&mut OverrideState)) {
        let selected: Vec<Arc<JumpHandler>> = self
            .inner
            .handlers
            .lock()
            .iter()
            .filter(|handler| handler.threshold.matches(&jump))
            .cloned()
            .collect();

        for handler in &selected {
            if let Some(pre) = &handler.pre_callback {
                pre();
            }
        }

        apply(&mut self.inner.overrides.lock());

        for handler in &selected {
            if let Some(post) = &handler.post_callback {
                post(&jump);
            }
        }
    }
}

impl std::fmt::Debug for Clock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Clock")
            .field("kind", &self.inner.kind)
            .field("overrides", &*self.inner.overrides.lock())
            .finish_non_exhaustive()
    }
}

/// Owner of a registered jump handler. Dropping it deregisters the handler.
#[derive(Debug)]
pub struct JumpHandle {
    clock: Weak<ClockInner>,
    id: u64,
}

impl JumpHandle {
    /// Identifier of the registered handler.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for JumpHandle {
    fn drop(&mut self) {
        match self.clock.upgrade() {
            Some(clock) => {
                if !clock.remove_handler(self.id) {
                    log::error!("[clock] failed to remove time jump callback {}", self.id);
                }
            }
            None => {
                log::error!(
                    "[clock] failed to remove time jump callback {}: clock already destroyed",
                    self.id
                );
            }
        }
    }
}

fn system_nanos() -> Result<i64> {
    let since_epoch = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|err| Error::ClockUnavailable(format!("system time before epoch: {}", err)))?;
    i64::try_from(since_epoch.as_nanos())
        .map_err(|_| Error::ClockUnavailable("system time out of range".to_string()))
}

fn steady_nanos() -> Result<i64> {
    static ANCHOR: OnceLock<Instant> = OnceLock::new();
    let anchor = ANCHOR.get_or_init(Instant::now);
    i64::try_from(anchor.elapsed().as_nanos())
        .map_err(|_| Error::ClockUnavailable("steady time out of range".to_string()))
}

#[cfg(test)]
mod tests;
