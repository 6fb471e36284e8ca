// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Timer abstraction consumed by the timers queue, plus a periodic timer
//! driven by a [`Clock`].

use crate::clock::{Clock, JumpHandle};
use crate::error::{Error, Result};
use crate::time::{duration_to_nanos, ClockKind, JumpThreshold, TimeJump};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

/// A timer the executor can schedule.
pub trait Timer: Send + Sync {
    /// Nanoseconds until the timer is due; negative when overdue,
    /// `i64::MAX` when it will never fire.
    fn time_until_trigger(&self) -> Result<i64>;

    /// Whether the timer is due now.
    fn is_ready(&self) -> Result<bool> {
        Ok(self.time_until_trigger()? <= 0)
    }

    /// Run the user callback and reschedule.
    fn execute_callback(&self) -> Result<()>;
}

struct TimerState {
    clock: Clock,
    period: i64,
    next_call: AtomicI64,
    canceled: AtomicBool,
    /// `next_call - now` captured before a jump, restored after it.
    jump_credit: AtomicI64,
}

impl TimerState {
    fn on_pre_jump(&self) {
        match self.clock.now() {
            Ok(now) => {
                let credit = self
                    .next_call
                    .load(Ordering::Acquire)
                    .saturating_sub(now.nanoseconds());
                self.jump_credit.store(credit, Ordering::Release);
            }
            Err(err) => log::warn!("[timer] pre-jump sample failed: {}", err),
        }
    }

    fn on_post_jump(&self, jump: &TimeJump) {
        // Forward jumps simply make the timer due earlier.
        if !jump.clock_change.is_kind_change() && jump.delta >= 0 {
            return;
        }
        match self.clock.now() {
            Ok(now) => {
                let credit = self.jump_credit.load(Ordering::Acquire);
                self.next_call
                    .store(now.nanoseconds().saturating_add(credit), Ordering::Release);
            }
            Err(err) => log::warn!("[timer] post-jump sample failed: {}", err),
        }
    }
}

/// Periodic timer.
///
/// On a ROS clock the timer keeps its remaining time across override
/// activation, deactivation and backward jumps instead of stalling until the
/// clock catches up again.
pub struct WallTimer {
    state: Arc<TimerState>,
    callback: Box<dyn Fn() + Send + Sync>,
    _jump_handle: Option<JumpHandle>,
}

impl WallTimer {
    /// Create a timer that first fires one `period` from now.
    pub fn new<F>(clock: Clock, period: Duration, callback: F) -> Result<Self>
    where
        F: Fn() + Send + Sync + 'static,
    {
        if period.is_zero() {
            return Err(Error::InvalidArgument("timer period must be > 0".into()));
        }
        let period = duration_to_nanos(period);
        let now = clock.now()?.nanoseconds();
        let state = Arc::new(TimerState {
            clock: clock.clone(),
            period,
            next_call: AtomicI64::new(now.saturating_add(period)),
            canceled: AtomicBool::new(false),
            jump_credit: AtomicI64::new(0),
        });

        let jump_handle = if clock.kind() == ClockKind::Ros {
            let pre_state: Weak<TimerState> = Arc::downgrade(&state);
            let post_state: Weak<TimerState> = Arc::downgrade(&state);
            let threshold = JumpThreshold {
                on_clock_change: true,
                min_forward: 0,
                min_backward: -1,
            };
            Some(clock.create_jump_callback(
                Some(Box::new(move || {
                    if let Some(state) = pre_state.upgrade() {
                        state.on_pre_jump();
                    }
                })),
                Some(Box::new(move |jump: &TimeJump| {
                    if let Some(state) = post_state.upgrade() {
                        state.on_post_jump(jump);
                    }
                })),
                threshold,
            )?)
        } else {
            None
        };

        Ok(Self {
            state,
            callback: Box::new(callback),
            _jump_handle: jump_handle,
        })
    }

    /// Timer period in nanoseconds.
    #[must_use]
    pub fn period(&self) -> i64 {
        self.state.period
    }

    /// Stop the timer from firing until [`WallTimer::reset`] is called.
    pub fn cancel(&self) {
        self.state.canceled.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_canceled(&self) -> bool {
        self.state.canceled.load(Ordering::Acquire)
    }

    /// Restart the period from now and clear cancellation.
    pub fn reset(&self) -> Result<()> {
        let now = self.state.clock.now()?.nanoseconds();
        self.state
            .next_call
            .store(now.saturating_add(self.state.period), Ordering::Release);
        self.state.canceled.store(false, Ordering::Release);
        Ok(())
    }
}

impl Timer for WallTimer {
    fn time_until_trigger(&self) -> Result<i64> {
        if self.is_canceled() {
            return Ok(i64::MAX);
        }
        let now = self.state.clock.now()?.nanoseconds();
        Ok(self
            .state
            .next_call
            .load(Ordering::Acquire)
            .saturating_sub(now))
    }

    fn execute_callback(&self) -> Result<()> {
        if self.is_canceled() {
            return Ok(());
        }
        let now = self.state.clock.now()?.nanoseconds();
        let period = self.state.period;
        let mut next_call = self
            .state
            .next_call
            .load(Ordering::Acquire)
            .saturating_add(period);
        if next_call < now {
            // Skip the periods that were missed entirely.
            let periods_ahead = 1 + (now - next_call) / period;
            next_call = next_call.saturating_add(periods_ahead.saturating_mul(period));
        }
        self.state.next_call.store(next_call, Ordering::Release);
        (self.callback)();
        Ok(())
    }
}

impl std::fmt::Debug for WallTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WallTimer")
            .field("period", &self.state.period)
            .field("next_call", &self.state.next_call.load(Ordering::Relaxed))
            .field("canceled", &self.is_canceled())
            .finish()
    }
}
