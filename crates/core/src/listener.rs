// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-channel listener registry and event fan-out
//!
//! Each channel has one registry record holding its subscribers' output
//! queues in registration order; the record is created on first subscribe or
//! first event, whichever comes first, and never proactively deleted.
//!
//! `notify` delivers under the record's own lock, so a subscriber registered
//! before the call receives the event exactly once, in emission order,
//! before `notify` returns. Subscribers registered after an event fired
//! never see it; there is no catch-up at this layer. Output queues are
//! unbounded sends, so a stalled consumer cannot stall the notifying
//! mutation; a disconnected consumer is pruned when its queue rejects the
//! send.

use crate::event::ChannelEvent;
use crate::id::{IdGen, UuidIdGen};
use crate::store::SharedIndex;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

/// Sender half of a subscriber's output queue
pub type EventSender = mpsc::UnboundedSender<ChannelEvent>;
/// Receiver half handed back to the subscriber
pub type EventReceiver = mpsc::UnboundedReceiver<ChannelEvent>;

/// Handle identifying one subscription on one channel
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriberId(pub String);

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One channel's subscribers, in registration order
struct ListenerRecord {
    subscribers: Vec<(SubscriberId, EventSender)>,
}

impl ListenerRecord {
    fn new() -> Self {
        Self {
            subscribers: Vec::new(),
        }
    }
}

/// Registry of listener records, keyed by channel id
pub struct ListenerRegistry<G: IdGen = UuidIdGen> {
    records: SharedIndex<Mutex<ListenerRecord>>,
    id_gen: G,
}

impl ListenerRegistry<UuidIdGen> {
    pub fn new() -> Self {
        Self::with_id_gen(UuidIdGen)
    }
}

impl Default for ListenerRegistry<UuidIdGen> {
    fn default() -> Self {
        Self::new()
    }
}

impl<G: IdGen> ListenerRegistry<G> {
    pub fn with_id_gen(id_gen: G) -> Self {
        Self {
            records: SharedIndex::new(),
            id_gen,
        }
    }

    /// Register a new output queue on the channel
    pub fn subscribe(&self, channel_id: &str) -> (SubscriberId, EventReceiver) {
        let record = self
            .records
            .get_or_create(channel_id, || Mutex::new(ListenerRecord::new()));
        let (tx, rx) = mpsc::unbounded_channel();
        let id = SubscriberId(self.id_gen.next());
        let mut record = record.lock().unwrap_or_else(|e| e.into_inner());
        record.subscribers.push((id.clone(), tx));
        debug!(channel = channel_id, subscriber = %id, "subscribed");
        (id, rx)
    }

    /// Remove a subscription; false if it was not registered
    pub fn unsubscribe(&self, channel_id: &str, subscriber: &SubscriberId) -> bool {
        let Some(record) = self.records.get(channel_id) else {
            return false;
        };
        let mut record = record.lock().unwrap_or_else(|e| e.into_inner());
        let before = record.subscribers.len();
        record.subscribers.retain(|(id, _)| id != subscriber);
        record.subscribers.len() != before
    }

    /// Deliver an event to every current subscriber, in registration order
    pub fn notify(&self, channel_id: &str, event: ChannelEvent) {
        let record = self
            .records
            .get_or_create(channel_id, || Mutex::new(ListenerRecord::new()));
        let mut record = record.lock().unwrap_or_else(|e| e.into_inner());
        record.subscribers.retain(|(id, tx)| {
            let delivered = tx.send(event.clone()).is_ok();
            if !delivered {
                debug!(channel = channel_id, subscriber = %id, "pruning disconnected subscriber");
            }
            delivered
        });
        debug!(
            channel = channel_id,
            event = event.name(),
            subscribers = record.subscribers.len(),
            "notified"
        );
    }

    /// Number of live subscriptions on the channel
    pub fn subscriber_count(&self, channel_id: &str) -> usize {
        self.records
            .get(channel_id)
            .map(|r| r.lock().unwrap_or_else(|e| e.into_inner()).subscribers.len())
            .unwrap_or(0)
    }
}

#[cfg(test)]
#[path = "listener_tests.rs"]
mod tests;
