// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Channel lifecycle state machine
//!
//! A channel is a named, permissioned message stream. Its record moves
//! Buffered → Open → Closed and never backwards. Operations arrive from an
//! asynchronous decrypt-then-route pipeline, so a close request can reach
//! the record before the open confirmation does: while Buffered, close
//! requests are accumulated as closure attempts and reconciled once the
//! channel opens (`apply_close_attempts` picks the earliest valid one).
//!
//! Every operation returns a boolean (or `Option` for message positions):
//! false means nothing was mutated. Classifying a rejection into a
//! user-facing reason is the router's job, not the record's.

use crate::timestamp::Timestamp;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Unique identifier for a channel
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelId(pub String);

impl ChannelId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a single user may do in a channel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserGrants {
    pub read: bool,
    pub write: bool,
    pub close: bool,
}

impl UserGrants {
    /// Full read/write/close access
    pub fn all() -> Self {
        Self {
            read: true,
            write: true,
            close: true,
        }
    }

    /// Read-only access
    pub fn read_only() -> Self {
        Self {
            read: true,
            write: false,
            close: false,
        }
    }
}

/// Per-user permission table for a channel
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions {
    pub users: HashMap<String, UserGrants>,
}

impl Permissions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(mut self, user_id: impl Into<String>, grants: UserGrants) -> Self {
        self.users.insert(user_id.into(), grants);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Whether the given user holds the `close` grant
    pub fn can_close(&self, user_id: &str) -> bool {
        self.users.get(user_id).map(|g| g.close).unwrap_or(false)
    }

    /// Whether the given user holds the `write` grant
    pub fn can_write(&self, user_id: &str) -> bool {
        self.users.get(user_id).map(|g| g.write).unwrap_or(false)
    }
}

/// A signed lifecycle action: who issued it, who certified it, and when
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedAction {
    pub issuer_id: String,
    pub certifier_id: String,
    pub timestamp: Timestamp,
}

impl SignedAction {
    pub fn new(
        issuer_id: impl Into<String>,
        certifier_id: impl Into<String>,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            issuer_id: issuer_id.into(),
            certifier_id: certifier_id.into(),
            timestamp,
        }
    }

    /// Action issued and certified by the same identity
    pub fn signed_by(user_id: &str, timestamp: Timestamp) -> Self {
        Self::new(user_id, user_id, timestamp)
    }
}

/// Lifecycle state of a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelState {
    /// Created by reference before its open confirmation arrived
    Buffered,
    /// Open for messages
    Open,
    /// Closed; in-flight messages are still recorded
    Closed,
    /// Unrecoverable corruption (e.g. failed deserialization); never entered
    /// by the transitions below and fatal if observed
    Inconsistent,
}

/// The per-channel record
///
/// Mutated exclusively under the channel's exclusive lock (held by the
/// caller via the resource lock service); never deleted while referenced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRecord {
    pub id: ChannelId,
    /// Key-store handle for this channel's symmetric key (opaque here)
    pub key_id: String,
    pub permissions: Permissions,
    pub state: ChannelState,
    /// The action that opened the channel, once Open
    pub open_action: Option<SignedAction>,
    /// The action that closed the channel; set iff state is Closed
    pub closure: Option<SignedAction>,
    /// Close requests recorded while Buffered, in arrival order
    pub closure_attempts: Vec<SignedAction>,
    /// Accepted message timestamps, ascending
    pub message_timestamps: Vec<Timestamp>,
}

impl ChannelRecord {
    /// Create a record in the Buffered state with no permissions or messages
    pub fn new(id: ChannelId) -> Self {
        Self {
            id,
            key_id: String::new(),
            permissions: Permissions::new(),
            state: ChannelState::Buffered,
            open_action: None,
            closure: None,
            closure_attempts: Vec::new(),
            message_timestamps: Vec::new(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.state == ChannelState::Open
    }

    pub fn is_closed(&self) -> bool {
        self.state == ChannelState::Closed
    }

    /// Messages accepted so far; the Close event carries this as its position
    pub fn message_count(&self) -> usize {
        self.message_timestamps.len()
    }

    /// Open the channel
    ///
    /// Succeeds only while Buffered, with a non-zero action timestamp and a
    /// permission table naming at least one user. On failure the record is
    /// left untouched.
    pub fn try_open(&mut self, action: SignedAction, permissions: Permissions) -> bool {
        if self.state != ChannelState::Buffered {
            return false;
        }
        if action.timestamp.is_zero() || permissions.is_empty() {
            return false;
        }
        self.permissions = permissions;
        self.open_action = Some(action);
        self.state = ChannelState::Open;
        true
    }

    /// Close the channel, or record the attempt if it is not open yet
    ///
    /// While Buffered the attempt is appended unconditionally: the permission
    /// table and open time are not established yet, so validation is deferred
    /// to `apply_close_attempts`. While Open the closure applies iff the
    /// certifier holds the `close` grant and the action is not timed before
    /// the open action. Already-Closed channels reject every closure.
    pub fn try_close(&mut self, action: SignedAction) -> bool {
        match self.state {
            ChannelState::Buffered => {
                self.closure_attempts.push(action);
                true
            }
            ChannelState::Open => {
                if self.is_valid_closure(&action) {
                    self.closure = Some(action);
                    self.state = ChannelState::Closed;
                    true
                } else {
                    false
                }
            }
            ChannelState::Closed | ChannelState::Inconsistent => false,
        }
    }

    /// Reconcile closure attempts that raced ahead of the open confirmation
    ///
    /// Only meaningful while Open. Among the recorded attempts that are both
    /// authorized and timed at or after the open action, the earliest one is
    /// applied as the closure. Returns false (state unchanged) when no
    /// attempt qualifies.
    pub fn apply_close_attempts(&mut self) -> bool {
        if self.state != ChannelState::Open {
            return false;
        }
        let earliest = self
            .closure_attempts
            .iter()
            .filter(|a| self.is_valid_closure(a))
            .min_by_key(|a| a.timestamp)
            .cloned();
        match earliest {
            Some(action) => {
                self.closure = Some(action);
                self.state = ChannelState::Closed;
                true
            }
            None => false,
        }
    }

    /// Record a message timestamp, returning its 0-based rank
    ///
    /// Rejected while Buffered and for zero timestamps. Accepted while Open
    /// and also while Closed: messages in flight at the moment of closure
    /// still land, and consumers use the Close event's position as the
    /// cutoff. Insertion keeps `message_timestamps` sorted ascending; equal
    /// timestamps rank after the ones already present.
    pub fn add_message(&mut self, timestamp: Timestamp) -> Option<usize> {
        match self.state {
            ChannelState::Open | ChannelState::Closed => {}
            ChannelState::Buffered | ChannelState::Inconsistent => return None,
        }
        if timestamp.is_zero() {
            return None;
        }
        let position = self.message_timestamps.partition_point(|t| *t <= timestamp);
        self.message_timestamps.insert(position, timestamp);
        Some(position)
    }

    fn is_valid_closure(&self, action: &SignedAction) -> bool {
        let opened_at = match &self.open_action {
            Some(open) => open.timestamp,
            None => return false,
        };
        self.permissions.can_close(&action.certifier_id) && action.timestamp >= opened_at
    }
}

#[cfg(test)]
#[path = "channel_tests.rs"]
mod tests;
