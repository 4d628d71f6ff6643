// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Service configuration

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables for the lock service and its housekeeping
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Number of lock-service workers pulling from the shared request queue
    #[serde(default = "default_lock_workers")]
    pub lock_workers: usize,
    /// Capacity of the shared request queue
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// How long a free lock record may sit idle before a sweep removes it
    #[serde(with = "humantime_serde", default = "default_idle_threshold")]
    pub lock_idle_threshold: Duration,
    /// How often the background sweeper runs
    #[serde(with = "humantime_serde", default = "default_sweep_interval")]
    pub lock_sweep_interval: Duration,
}

fn default_lock_workers() -> usize {
    4
}

fn default_queue_capacity() -> usize {
    64
}

fn default_idle_threshold() -> Duration {
    Duration::from_secs(300)
}

fn default_sweep_interval() -> Duration {
    Duration::from_secs(60)
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            lock_workers: default_lock_workers(),
            queue_capacity: default_queue_capacity(),
            lock_idle_threshold: default_idle_threshold(),
            lock_sweep_interval: default_sweep_interval(),
        }
    }
}

impl ServiceConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lock_workers(mut self, workers: usize) -> Self {
        self.lock_workers = workers;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_lock_idle_threshold(mut self, threshold: Duration) -> Self {
        self.lock_idle_threshold = threshold;
        self
    }

    pub fn with_lock_sweep_interval(mut self, interval: Duration) -> Self {
        self.lock_sweep_interval = interval;
        self
    }

    /// Parse from TOML; unset fields fall back to the defaults
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
