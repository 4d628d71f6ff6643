// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! dmpc-core: building blocks for the DMPC encrypted-channel messaging core
//!
//! This crate provides:
//! - The per-channel lifecycle state machine (Buffered → Open → Closed)
//! - The deadlock-free multi-resource lock coordinator
//! - The per-channel listener registry with in-order, exactly-once fan-out
//! - The buffer for operations that raced ahead of their channel
//!
//! Everything here is in-memory and transport-agnostic; the service layer
//! (`dmpc-service`) wires these pieces behind the lock service and the
//! request dispatcher.

pub mod clock;
pub mod id;
pub mod timestamp;

pub mod buffer;
pub mod channel;
pub mod event;
pub mod listener;
pub mod lock;
pub mod store;

// Re-exports
pub use buffer::{ChannelOp, OperationBuffer};
pub use channel::{
    ChannelId, ChannelRecord, ChannelState, Permissions, SignedAction, UserGrants,
};
pub use clock::{Clock, FakeClock, SystemClock};
pub use event::{ChannelEvent, EventKind};
pub use id::{IdGen, SequentialIdGen, UuidIdGen};
pub use listener::{EventReceiver, EventSender, ListenerRegistry, SubscriberId};
pub use lock::{LockBatch, LockNeed, LockTable, Strength};
pub use store::SharedIndex;
pub use timestamp::Timestamp;
