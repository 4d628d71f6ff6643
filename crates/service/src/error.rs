// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Service-layer errors
//!
//! State-machine rejections are booleans, never errors; these variants cover
//! infrastructure failures only.

use thiserror::Error;

/// Infrastructure failures in the service layer
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The lock service's request queue is closed (shutdown in progress)
    #[error("lock service unavailable")]
    LockServiceUnavailable,
}

/// Configuration parse failures
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid service config: {0}")]
    Parse(#[from] toml::de::Error),
}
