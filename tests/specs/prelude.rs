//! Shared harness for the DMPC specs.

use dmpc_core::{EventReceiver, Permissions, SignedAction, SubscriberId, Timestamp, UserGrants};
use dmpc_service::{
    ChannelSpec, Dispatcher, KeyStore, MemoryKeyStore, Request, ResourceLockService, Response,
    ServiceConfig, Signers,
};
use std::sync::Arc;

pub const HOUR_MS: i64 = 3_600_000;

pub struct Harness {
    // Kept alive so its workers keep serving the dispatcher's lock requests.
    #[allow(dead_code)]
    pub service: ResourceLockService,
    pub dispatcher: Dispatcher,
}

pub fn harness() -> Harness {
    let config = ServiceConfig::new().with_lock_workers(2).with_queue_capacity(16);
    let service = ResourceLockService::spawn(&config);
    let keys: Arc<dyn KeyStore> = Arc::new(MemoryKeyStore::new());
    let dispatcher = Dispatcher::new(service.handle(), keys);
    Harness {
        service,
        dispatcher,
    }
}

pub fn t(millis: i64) -> Timestamp {
    Timestamp::from_millis(millis)
}

pub fn open_request(channel_id: &str, user: &str, ts: Timestamp) -> Request {
    Request::OpenChannel {
        channel: ChannelSpec {
            id: channel_id.to_string(),
            key_id: format!("{channel_id}-key"),
            permissions: Permissions::new().grant(user, UserGrants::all()),
        },
        key: vec![0x42; 32],
        action: SignedAction::signed_by(user, ts),
    }
}

pub fn close_request(channel_id: &str, user: &str, ts: Timestamp) -> Request {
    Request::CloseChannel {
        channel_id: channel_id.to_string(),
        action: SignedAction::signed_by(user, ts),
    }
}

pub fn message_request(channel_id: &str, user: &str, ts: Timestamp, payload: &[u8]) -> Request {
    Request::AddMessage {
        channel_id: channel_id.to_string(),
        action: SignedAction::signed_by(user, ts),
        message: payload.to_vec(),
    }
}

pub async fn subscribe(harness: &Harness, channel_id: &str) -> (SubscriberId, EventReceiver) {
    let request = Request::Subscribe {
        channel_id: channel_id.to_string(),
        signers: Signers {
            issuer_id: "u1".to_string(),
            certifier_id: "u1".to_string(),
        },
    };
    match harness.dispatcher.handle(request).await {
        Response::Subscribed {
            subscriber_id,
            events,
        } => (subscriber_id, events),
        other => panic!("expected subscription, got {other:?}"),
    }
}
