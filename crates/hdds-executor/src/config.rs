// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Environment variable configuration for the events executor.
//!
//! - `HDDS_EXECUTOR_USE_SIM_TIME`: Drive the executor clock from an override
//!   ("1" or "true"; default: false, or ROS_USE_SIM_TIME if set)
//! - `HDDS_EXECUTOR_MAX_WAIT_MS`: Upper bound for a single blocking wait
//!   (default: 100)
//! - `HDDS_EXECUTOR_EVENT_QUEUE_CAPACITY`: Event queue capacity, 0 for
//!   unbounded (default: 0)
//!
//! # Example
//!
//! ```bash
//! export HDDS_EXECUTOR_USE_SIM_TIME=true
//! export HDDS_EXECUTOR_MAX_WAIT_MS=20
//! ```

use std::env;
use std::time::Duration;

/// Environment variable names
pub const ENV_USE_SIM_TIME: &str = "HDDS_EXECUTOR_USE_SIM_TIME";
pub const ENV_MAX_WAIT_MS: &str = "HDDS_EXECUTOR_MAX_WAIT_MS";
pub const ENV_EVENT_QUEUE_CAPACITY: &str = "HDDS_EXECUTOR_EVENT_QUEUE_CAPACITY";

/// ROS 2 simulated time switch (fallback)
pub const ENV_ROS_USE_SIM_TIME: &str = "ROS_USE_SIM_TIME";

const DEFAULT_MAX_WAIT: Duration = Duration::from_millis(100);

/// Runtime configuration of an [`crate::executor::EventsExecutor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// Executor clock is a ROS clock with its override enabled
    pub use_sim_time: bool,

    /// Longest single wait on the event queue
    pub max_wait: Duration,

    /// Bound on queued events (0 = unbounded)
    pub event_queue_capacity: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            use_sim_time: false,
            max_wait: DEFAULT_MAX_WAIT,
            event_queue_capacity: 0,
        }
    }
}

fn parse_flag(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}

impl ExecutorConfig {
    /// Load configuration from environment variables
    ///
    /// Priority for simulated time:
    /// 1. HDDS_EXECUTOR_USE_SIM_TIME
    /// 2. ROS_USE_SIM_TIME
    /// 3. Default (false)
    #[must_use]
    pub fn from_env() -> Self {
        let use_sim_time = env::var(ENV_USE_SIM_TIME)
            .or_else(|_| env::var(ENV_ROS_USE_SIM_TIME))
            .ok()
            .filter(|s| !s.is_empty())
            .map(|s| parse_flag(&s))
            .unwrap_or(false);

        // Zero would turn every spin into a busy loop
        let max_wait = env::var(ENV_MAX_WAIT_MS)
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .filter(|ms| *ms > 0)
            .map_or(DEFAULT_MAX_WAIT, Duration::from_millis);

        let event_queue_capacity = env::var(ENV_EVENT_QUEUE_CAPACITY)
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(0);

        Self {
            use_sim_time,
            max_wait,
            event_queue_capacity,
        }
    }

    /// Check if any custom configuration was provided
    #[must_use]
    pub fn is_custom(&self) -> bool {
        *self != Self::default()
    }

    #[must_use]
    pub fn with_sim_time(mut self, use_sim_time: bool) -> Self {
        self.use_sim_time = use_sim_time;
        self
    }

    #[must_use]
    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    #[must_use]
    pub fn with_event_queue_capacity(mut self, capacity: usize) -> Self {
        self.event_queue_capacity = capacity;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    // Tests below mutate process-wide environment variables
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn with_env<F: FnOnce()>(vars: &[(&str, Option<&str>)], body: F) {
        let _guard = ENV_LOCK.lock();
        let saved: Vec<(String, Option<String>)> = vars
            .iter()
            .map(|(name, _)| ((*name).to_string(), env::var(name).ok()))
            .collect();
        for (name, value) in vars {
            match value {
                Some(value) => env::set_var(name, value),
                None => env::remove_var(name),
            }
        }

        body();

        for (name, value) in saved {
            match value {
                Some(value) => env::set_var(&name, value),
                None => env::remove_var(&name),
            }
        }
    }

    #[test]
    fn test_default_config() {
        let config = ExecutorConfig::default();
        assert!(!config.use_sim_time);
        assert_eq!(config.max_wait, Duration::from_millis(100));
        assert_eq!(config.event_queue_capacity, 0);
        assert!(!config.is_custom());
    }

    #[test]
    fn test_from_env_prefers_hdds_sim_time() {
        with_env(
            &[
                (ENV_USE_SIM_TIME, Some("false")),
                (ENV_ROS_USE_SIM_TIME, Some("true")),
            ],
            || {
                assert!(!ExecutorConfig::from_env().use_sim_time);
            },
        );
    }

    #[test]
    fn test_from_env_falls_back_to_ros_sim_time() {
        with_env(
            &[
                (ENV_USE_SIM_TIME, None),
                (ENV_ROS_USE_SIM_TIME, Some("1")),
            ],
            || {
                assert!(ExecutorConfig::from_env().use_sim_time);
            },
        );
    }

    #[test]
    fn test_from_env_numeric_values() {
        with_env(
            &[
                (ENV_MAX_WAIT_MS, Some("25")),
                (ENV_EVENT_QUEUE_CAPACITY, Some("64")),
            ],
            || {
                let config = ExecutorConfig::from_env();
                assert_eq!(config.max_wait, Duration::from_millis(25));
                assert_eq!(config.event_queue_capacity, 64);
                assert!(config.is_custom());
            },
        );
    }

    #[test]
    fn test_from_env_ignores_garbage() {
        with_env(
            &[
                (ENV_MAX_WAIT_MS, Some("0")),
                (ENV_EVENT_QUEUE_CAPACITY, Some("lots")),
            ],
            || {
                let config = ExecutorConfig::from_env();
                assert_eq!(config.max_wait, DEFAULT_MAX_WAIT);
                assert_eq!(config.event_queue_capacity, 0);
            },
        );
    }

    #[test]
    fn test_builders() {
        let config = ExecutorConfig::default()
            .with_sim_time(true)
            .with_max_wait(Duration::from_millis(5))
            .with_event_queue_capacity(8);
        assert!(config.use_sim_time);
        assert_eq!(config.max_wait, Duration::from_millis(5));
        assert_eq!(config.event_queue_capacity, 8);
    }
}
