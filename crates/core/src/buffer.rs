// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-channel buffer for operations that arrived too early
//!
//! The routing layer parks operations it could not yet apply (e.g. a message
//! destined for a channel that is still Buffered) and replays them later,
//! typically after observing the channel's Open event. The buffer itself
//! performs no validation and no replay; it is a FIFO per channel id.

use crate::channel::{Permissions, SignedAction};
use crate::timestamp::Timestamp;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A deferred lifecycle operation, queued verbatim for replay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelOp {
    Open {
        key_id: String,
        key: Vec<u8>,
        action: SignedAction,
        permissions: Permissions,
    },
    Close {
        action: SignedAction,
    },
    Message {
        action: SignedAction,
        payload: Vec<u8>,
    },
}

impl ChannelOp {
    /// Timestamp of the underlying action
    pub fn timestamp(&self) -> Timestamp {
        match self {
            ChannelOp::Open { action, .. }
            | ChannelOp::Close { action }
            | ChannelOp::Message { action, .. } => action.timestamp,
        }
    }
}

/// Append-only FIFOs of deferred operations, one per channel id
#[derive(Debug, Default)]
pub struct OperationBuffer {
    queues: HashMap<String, Vec<ChannelOp>>,
}

impl OperationBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an operation to the channel's queue
    pub fn push(&mut self, channel_id: impl Into<String>, op: ChannelOp) {
        self.queues.entry(channel_id.into()).or_default().push(op);
    }

    /// Hand the queued operations to the replayer, emptying the queue
    pub fn drain(&mut self, channel_id: &str) -> Vec<ChannelOp> {
        self.queues.remove(channel_id).unwrap_or_default()
    }

    /// Number of operations waiting for the channel
    pub fn pending(&self, channel_id: &str) -> usize {
        self.queues.get(channel_id).map(Vec::len).unwrap_or(0)
    }
}

#[cfg(test)]
#[path = "buffer_tests.rs"]
mod tests;
