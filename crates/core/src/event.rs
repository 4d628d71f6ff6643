// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lifecycle events delivered to channel subscribers
//!
//! Wire schema: `{type: "open"|"message"|"close", position, timestamp, data}`.
//! Open always carries position 0 and no payload; Message carries the
//! insertion rank and the payload bytes; Close carries the count of messages
//! accepted at the moment of closure, giving consumers a precise cutoff.

use crate::timestamp::Timestamp;
use serde::{Deserialize, Serialize};

/// Kind of lifecycle event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Open,
    Message,
    Close,
}

/// A single lifecycle event on a channel's feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub position: u64,
    pub timestamp: Timestamp,
    pub data: Option<Vec<u8>>,
}

impl ChannelEvent {
    /// The channel opened
    pub fn open(timestamp: Timestamp) -> Self {
        Self {
            kind: EventKind::Open,
            position: 0,
            timestamp,
            data: None,
        }
    }

    /// A message was accepted at the given rank
    pub fn message(position: usize, timestamp: Timestamp, data: Vec<u8>) -> Self {
        Self {
            kind: EventKind::Message,
            position: position as u64,
            timestamp,
            data: Some(data),
        }
    }

    /// The channel closed after accepting `accepted` messages
    pub fn close(accepted: usize, timestamp: Timestamp) -> Self {
        Self {
            kind: EventKind::Close,
            position: accepted as u64,
            timestamp,
            data: None,
        }
    }

    /// Short name for logging
    pub fn name(&self) -> &'static str {
        match self.kind {
            EventKind::Open => "open",
            EventKind::Message => "message",
            EventKind::Close => "close",
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
