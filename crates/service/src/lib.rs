// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! dmpc-service: the tokio service layer of the DMPC messaging core
//!
//! Wires the dmpc-core building blocks behind running machinery:
//! - `locks`: the resource lock service (bounded worker pool)
//! - `dispatch`: the request surface the router/executor drives
//! - `keystore`: the symmetric-key collaborator seam
//! - `config`: service tunables

pub mod config;
pub mod dispatch;
pub mod error;
pub mod keystore;
pub mod locks;

pub use config::ServiceConfig;
pub use dispatch::{ChannelSpec, Dispatcher, Request, Response, Signers};
pub use error::{ConfigError, ServiceError};
pub use keystore::{KeyStore, MemoryKeyStore};
pub use locks::{
    default_classes, LockCapability, LockOp, LockRequest, LockServiceHandle,
    ResourceLockService, CHANNEL_CLASS, USER_CLASS,
};
