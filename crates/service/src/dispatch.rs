// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request dispatch: the surface the router/executor drives
//!
//! Every channel mutation follows the same shape: take the channel's
//! exclusive lock from the resource lock service, mutate the record, notify
//! the channel's listeners, release the lock. Holding the service-level lock
//! across the notification is what keeps event order linearized with the
//! mutations that produced it.
//!
//! The router performs signer authentication and permission pre-checks
//! before dispatching; rejections here are state-machine rejections
//! (`Response::Result { ok: false }`), reported distinctly from a channel
//! lock that could not be taken (`Response::Busy`, worth a retry upstream).

use crate::error::ServiceError;
use crate::keystore::KeyStore;
use crate::locks::{LockOp, LockRequest, LockServiceHandle, CHANNEL_CLASS};
use dmpc_core::{
    ChannelEvent, ChannelId, ChannelOp, ChannelRecord, ChannelState, EventReceiver, IdGen,
    ListenerRegistry, LockNeed, OperationBuffer, Permissions, SharedIndex, SignedAction,
    SubscriberId, UuidIdGen,
};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

/// How long the dispatcher keeps retrying a busy channel lock before
/// reporting `Busy` to the router
const LOCK_RETRY_LIMIT: usize = 256;
const LOCK_RETRY_DELAY: Duration = Duration::from_millis(1);

/// The channel shape carried by an open request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSpec {
    pub id: String,
    pub key_id: String,
    pub permissions: Permissions,
}

/// Who issued and certified a request (authenticated upstream)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signers {
    pub issuer_id: String,
    pub certifier_id: String,
}

/// Requests consumed from the router/executor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Request {
    OpenChannel {
        channel: ChannelSpec,
        key: Vec<u8>,
        action: SignedAction,
    },
    CloseChannel {
        channel_id: String,
        action: SignedAction,
    },
    AddMessage {
        channel_id: String,
        action: SignedAction,
        message: Vec<u8>,
    },
    BufferOperation {
        channel_id: String,
        operation: ChannelOp,
    },
    Subscribe {
        channel_id: String,
        signers: Signers,
    },
    Unsubscribe {
        channel_id: String,
        subscriber_id: SubscriberId,
    },
    Lock {
        class: String,
        needs: Vec<LockNeed>,
        op: LockOp,
    },
}

/// Outcomes handed back to the router
///
/// Not serializable: `Subscribed` carries the live output queue. Transport
/// framing is out of scope; the router consumes the dispatcher in-process.
#[derive(Debug)]
pub enum Response {
    /// The state machine accepted (true) or rejected (false) the operation
    Result { ok: bool },
    /// The channel's lock could not be taken; retry upstream
    Busy,
    /// A new subscription and its output queue
    Subscribed {
        subscriber_id: SubscriberId,
        events: EventReceiver,
    },
    /// Infrastructure failure, not a state-machine rejection
    Error { message: String },
}

impl Response {
    /// True only for an accepted state-machine operation
    pub fn accepted(&self) -> bool {
        matches!(self, Response::Result { ok: true })
    }
}

/// Executes requests against the channel store, lock service, listener
/// registry, operation buffer, and key store
pub struct Dispatcher<G: IdGen = UuidIdGen> {
    channels: SharedIndex<Mutex<ChannelRecord>>,
    listeners: ListenerRegistry<G>,
    buffer: Mutex<OperationBuffer>,
    keys: Arc<dyn KeyStore>,
    locks: LockServiceHandle,
}

impl Dispatcher<UuidIdGen> {
    pub fn new(locks: LockServiceHandle, keys: Arc<dyn KeyStore>) -> Self {
        Self::with_id_gen(locks, keys, UuidIdGen)
    }
}

impl<G: IdGen> Dispatcher<G> {
    pub fn with_id_gen(locks: LockServiceHandle, keys: Arc<dyn KeyStore>, id_gen: G) -> Self {
        Self {
            channels: SharedIndex::new(),
            listeners: ListenerRegistry::with_id_gen(id_gen),
            buffer: Mutex::new(OperationBuffer::new()),
            keys,
            locks,
        }
    }

    /// Execute one request to completion
    pub async fn handle(&self, request: Request) -> Response {
        match request {
            Request::OpenChannel {
                channel,
                key,
                action,
            } => self.open_channel(channel, key, action).await,
            Request::CloseChannel { channel_id, action } => {
                self.close_channel(&channel_id, action).await
            }
            Request::AddMessage {
                channel_id,
                action,
                message,
            } => self.add_message(&channel_id, action, message).await,
            Request::BufferOperation {
                channel_id,
                operation,
            } => {
                let mut buffer = self.buffer.lock().unwrap_or_else(|e| e.into_inner());
                buffer.push(channel_id, operation);
                Response::Result { ok: true }
            }
            Request::Subscribe {
                channel_id,
                signers,
            } => {
                let (subscriber_id, events) = self.listeners.subscribe(&channel_id);
                debug!(
                    channel = %channel_id,
                    issuer = %signers.issuer_id,
                    subscriber = %subscriber_id,
                    "subscriber registered"
                );
                Response::Subscribed {
                    subscriber_id,
                    events,
                }
            }
            Request::Unsubscribe {
                channel_id,
                subscriber_id,
            } => Response::Result {
                ok: self.listeners.unsubscribe(&channel_id, &subscriber_id),
            },
            Request::Lock { class, needs, op } => {
                match self.locks.request(LockRequest { class, needs, op }).await {
                    Ok(ok) => Response::Result { ok },
                    Err(e) => Response::Error {
                        message: e.to_string(),
                    },
                }
            }
        }
    }

    /// Hand buffered operations to the external replayer
    pub fn drain_buffered(&self, channel_id: &str) -> Vec<ChannelOp> {
        self.buffer
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain(channel_id)
    }

    /// Operations waiting for the channel
    pub fn pending_buffered(&self, channel_id: &str) -> usize {
        self.buffer
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pending(channel_id)
    }

    /// Current lifecycle state, if the channel has ever been referenced
    pub fn channel_state(&self, channel_id: &str) -> Option<ChannelState> {
        self.channels
            .get(channel_id)
            .map(|record| record.lock().unwrap_or_else(|e| e.into_inner()).state)
    }

    async fn open_channel(
        &self,
        spec: ChannelSpec,
        key: Vec<u8>,
        action: SignedAction,
    ) -> Response {
        match self.lock_channel(&spec.id).await {
            Ok(true) => {}
            Ok(false) => return Response::Busy,
            Err(e) => return Response::Error {
                message: e.to_string(),
            },
        }

        let record = self.record(&spec.id);
        let mut events = Vec::new();
        let opened = {
            let mut record = record.lock().unwrap_or_else(|e| e.into_inner());
            if record.try_open(action.clone(), spec.permissions) {
                record.key_id = spec.key_id.clone();
                events.push(ChannelEvent::open(action.timestamp));
                // A closure that raced ahead of this open may apply now.
                if record.apply_close_attempts() {
                    let closed_at = record
                        .closure
                        .as_ref()
                        .map(|c| c.timestamp)
                        .unwrap_or(action.timestamp);
                    events.push(ChannelEvent::close(record.message_count(), closed_at));
                }
                true
            } else {
                false
            }
        };

        if opened {
            self.keys.put(&spec.key_id, key).await;
            info!(channel = %spec.id, "channel opened");
            for event in events {
                self.listeners.notify(&spec.id, event);
            }
        } else {
            debug!(channel = %spec.id, "open rejected");
        }

        self.unlock_channel(&spec.id).await;
        Response::Result { ok: opened }
    }

    async fn close_channel(&self, channel_id: &str, action: SignedAction) -> Response {
        match self.lock_channel(channel_id).await {
            Ok(true) => {}
            Ok(false) => return Response::Busy,
            Err(e) => return Response::Error {
                message: e.to_string(),
            },
        }

        let record = self.record(channel_id);
        let (ok, event) = {
            let mut record = record.lock().unwrap_or_else(|e| e.into_inner());
            let ok = record.try_close(action.clone());
            let event = (ok && record.is_closed())
                .then(|| ChannelEvent::close(record.message_count(), action.timestamp));
            (ok, event)
        };

        if let Some(event) = event {
            info!(channel = %channel_id, "channel closed");
            self.listeners.notify(channel_id, event);
        } else if ok {
            debug!(channel = %channel_id, "closure attempt recorded while buffered");
        } else {
            debug!(channel = %channel_id, "close rejected");
        }

        self.unlock_channel(channel_id).await;
        Response::Result { ok }
    }

    async fn add_message(
        &self,
        channel_id: &str,
        action: SignedAction,
        message: Vec<u8>,
    ) -> Response {
        match self.lock_channel(channel_id).await {
            Ok(true) => {}
            Ok(false) => return Response::Busy,
            Err(e) => return Response::Error {
                message: e.to_string(),
            },
        }

        let record = self.record(channel_id);
        let position = {
            let mut record = record.lock().unwrap_or_else(|e| e.into_inner());
            record.add_message(action.timestamp)
        };

        if let Some(position) = position {
            self.listeners.notify(
                channel_id,
                ChannelEvent::message(position, action.timestamp, message),
            );
        } else {
            debug!(channel = %channel_id, "message rejected");
        }

        self.unlock_channel(channel_id).await;
        Response::Result {
            ok: position.is_some(),
        }
    }

    fn record(&self, channel_id: &str) -> Arc<Mutex<ChannelRecord>> {
        self.channels.get_or_create(channel_id, || {
            Mutex::new(ChannelRecord::new(ChannelId::new(channel_id)))
        })
    }

    async fn lock_channel(&self, channel_id: &str) -> Result<bool, ServiceError> {
        for _ in 0..LOCK_RETRY_LIMIT {
            if self
                .locks
                .lock(CHANNEL_CLASS, vec![LockNeed::write(channel_id)])
                .await?
            {
                return Ok(true);
            }
            tokio::time::sleep(LOCK_RETRY_DELAY).await;
        }
        Ok(false)
    }

    async fn unlock_channel(&self, channel_id: &str) {
        match self
            .locks
            .unlock(CHANNEL_CLASS, vec![LockNeed::write(channel_id)])
            .await
        {
            Ok(true) => {}
            Ok(false) => warn!(channel = %channel_id, "channel lock was not held at release"),
            Err(e) => warn!(channel = %channel_id, error = %e, "channel unlock failed"),
        }
    }
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
