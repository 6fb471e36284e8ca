// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error type shared by every executor component.

use crate::time::ClockKind;
use thiserror::Error;

/// Errors returned by the executor core.
///
/// Cleanup paths (dropping a [`crate::clock::JumpHandle`], dropping an
/// [`crate::collector::EntitiesCollector`]) never return these; failures there
/// are logged instead.
#[derive(Debug, Error)]
pub enum Error {
    /// The node is already associated with an executor.
    #[error("node '{0}' has already been added to an executor")]
    NodeAlreadyOwned(String),
    /// Installing or removing a callback with a guard condition or clock failed.
    #[error("registration failed: {0}")]
    Registration(String),
    /// Storage for a jump handler could not be reserved.
    #[error("allocation failed: {0}")]
    Allocation(String),
    /// The underlying time source could not be sampled.
    #[error("clock unavailable: {0}")]
    ClockUnavailable(String),
    /// Operation requires a clock of a different kind.
    #[error("clock kind mismatch: expected {expected:?}, got {actual:?}")]
    ClockKindMismatch {
        /// Kind the operation requires.
        expected: ClockKind,
        /// Kind of the clock it was called on.
        actual: ClockKind,
    },
    /// The intra-process client registered under this id was dropped.
    #[error("intra-process client {0} is no longer alive")]
    ClientGone(u64),
    /// Argument rejected before reaching any external layer.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// The executor was cancelled or its event queue disconnected.
    #[error("executor shut down")]
    Shutdown,
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
