// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! QoS profile carried by services and clients.
//!
//! The executor core passes profiles through untouched; only the history
//! depth is consulted, to bound the intra-process request buffer.

/// QoS Profile - collection of policies for a service or client endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QosProfile {
    pub reliability: Reliability,
    pub history: History,
    pub durability: Durability,
}

impl Default for QosProfile {
    fn default() -> Self {
        Self::services_default()
    }
}

impl QosProfile {
    /// Profile services and clients use unless told otherwise:
    /// reliable, volatile, KeepLast(10).
    #[must_use]
    pub const fn services_default() -> Self {
        Self {
            reliability: Reliability::Reliable,
            history: History::KeepLast(10),
            durability: Durability::Volatile,
        }
    }

    /// Validate the profile.
    ///
    /// # Validation Rules
    ///
    /// - History::KeepLast(n) where n > 0
    pub fn validate(&self) -> Result<(), String> {
        match self.history {
            History::KeepLast(0) => Err("History::KeepLast(n) requires n > 0".to_string()),
            History::KeepLast(_) | History::KeepAll => Ok(()),
        }
    }

    /// Maximum number of buffered items, `None` when unbounded.
    #[must_use]
    pub fn depth(&self) -> Option<usize> {
        match self.history {
            History::KeepLast(depth) => Some(depth as usize),
            History::KeepAll => None,
        }
    }
}

/// Reliability policy
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Reliability {
    /// Fire-and-forget
    #[default]
    BestEffort,
    /// Delivery is retried until acknowledged
    Reliable,
}

/// History policy
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum History {
    /// Keep last N items (bounded queue, drops oldest)
    KeepLast(u32),
    /// Keep everything
    KeepAll,
}

/// Durability policy
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Durability {
    /// No data for late joiners
    #[default]
    Volatile,
    /// Last samples are kept for late joiners
    TransientLocal,
}
