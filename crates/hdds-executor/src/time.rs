// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Time values, clock kinds and jump descriptions.
//!
//! Timestamps and deltas are signed nanosecond counts so that overdue timers
//! and backward jumps are representable without a separate sign flag.

use std::fmt;
use std::time::Duration;

/// Source a [`crate::clock::Clock`] samples from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClockKind {
    /// Wall-clock time (nanoseconds since the Unix epoch).
    System,
    /// Monotonic time, unaffected by wall-clock adjustments.
    Steady,
    /// System time that can be overridden by a simulation time source.
    Ros,
}

impl fmt::Display for ClockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClockKind::System => write!(f, "system"),
            ClockKind::Steady => write!(f, "steady"),
            ClockKind::Ros => write!(f, "ros"),
        }
    }
}

/// A timestamp tagged with the kind of clock that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Time {
    nanoseconds: i64,
    kind: ClockKind,
}

impl Time {
    /// Build a timestamp from raw nanoseconds.
    #[must_use]
    pub const fn from_nanos(nanoseconds: i64, kind: ClockKind) -> Self {
        Self { nanoseconds, kind }
    }

    /// Raw nanosecond count.
    #[must_use]
    pub const fn nanoseconds(&self) -> i64 {
        self.nanoseconds
    }

    /// Clock kind that produced this timestamp.
    #[must_use]
    pub const fn kind(&self) -> ClockKind {
        self.kind
    }

    /// Signed difference `self - earlier` in nanoseconds, saturating.
    #[must_use]
    pub fn nanos_since(&self, earlier: Time) -> i64 {
        self.nanoseconds.saturating_sub(earlier.nanoseconds)
    }

    /// Timestamp `delta` nanoseconds later (or earlier when negative), saturating.
    #[must_use]
    pub fn offset(&self, delta: i64) -> Self {
        Self {
            nanoseconds: self.nanoseconds.saturating_add(delta),
            kind: self.kind,
        }
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ns({})", self.nanoseconds, self.kind)
    }
}

/// Whether a jump also switched the clock between system and override time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockChange {
    /// Override time was set while override is active; the kind did not change.
    RosTimeNoChange,
    /// Override was enabled: the clock now reports simulation time.
    RosTimeActivated,
    /// Override was disabled: the clock reports system time again.
    RosTimeDeactivated,
}

impl ClockChange {
    /// True when the jump switched the reported time source.
    #[must_use]
    pub const fn is_kind_change(&self) -> bool {
        matches!(
            self,
            ClockChange::RosTimeActivated | ClockChange::RosTimeDeactivated
        )
    }
}

/// A discontinuity in the value a clock reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeJump {
    /// What kind of discontinuity this is.
    pub clock_change: ClockChange,
    /// `new - old`, in nanoseconds.
    pub delta: i64,
}

/// Conditions under which a jump observer is notified.
///
/// `min_forward` must be `>= 0` and `min_backward` must be `<= 0`; a zero
/// value disables that direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JumpThreshold {
    /// Notify on every clock change and every nonzero jump.
    pub on_clock_change: bool,
    /// Minimum forward jump (nanoseconds) that triggers a notification.
    pub min_forward: i64,
    /// Maximum (most negative) backward jump that triggers a notification.
    pub min_backward: i64,
}

impl JumpThreshold {
    /// Threshold that fires on any change.
    #[must_use]
    pub const fn any_change() -> Self {
        Self {
            on_clock_change: true,
            min_forward: 0,
            min_backward: 0,
        }
    }

    /// Threshold on jump magnitude only.
    #[must_use]
    pub fn deltas(min_forward: Duration, min_backward: Duration) -> Self {
        Self {
            on_clock_change: false,
            min_forward: duration_to_nanos(min_forward),
            min_backward: duration_to_nanos(min_backward).saturating_neg(),
        }
    }

    pub(crate) fn is_valid(&self) -> bool {
        self.min_forward >= 0 && self.min_backward <= 0
    }

    /// Whether `jump` satisfies this threshold.
    #[must_use]
    pub fn matches(&self, jump: &TimeJump) -> bool {
        if self.on_clock_change && (jump.clock_change.is_kind_change() || jump.delta != 0) {
            return true;
        }
        if jump.clock_change.is_kind_change() {
            return false;
        }
        if jump.delta > 0 {
            self.min_forward > 0 && jump.delta >= self.min_forward
        } else if jump.delta < 0 {
            self.min_backward < 0 && jump.delta <= self.min_backward
        } else {
            false
        }
    }
}

/// Convert a `Duration` to saturating signed nanoseconds.
#[must_use]
pub fn duration_to_nanos(duration: Duration) -> i64 {
    i64::try_from(duration.as_nanos()).unwrap_or(i64::MAX)
}
