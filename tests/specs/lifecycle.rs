//! Channel lifecycle scenarios: out-of-order closures and buffered replay.

use crate::prelude::*;
use dmpc_core::{ChannelOp, ChannelState, EventKind, Permissions, SignedAction};
use dmpc_service::{ChannelSpec, Request, Response};

#[tokio::test]
async fn earliest_valid_closure_attempt_wins_after_open() {
    let h = harness();
    let opened_at = t(HOUR_MS);

    // Five closure attempts by u1 race ahead of the open, recorded in
    // descending timestamp order (T+5h first).
    for hours in (1..=5).rev() {
        let attempt = close_request("ch-1", "u1", opened_at.plus_millis(hours * HOUR_MS));
        assert!(h.dispatcher.handle(attempt).await.accepted());
    }
    assert_eq!(h.dispatcher.channel_state("ch-1"), Some(ChannelState::Buffered));

    let (_, mut events) = subscribe(&h, "ch-1").await;
    assert!(h.dispatcher.handle(open_request("ch-1", "u1", opened_at)).await.accepted());

    // The open applied the earliest valid attempt: T+1h.
    assert_eq!(h.dispatcher.channel_state("ch-1"), Some(ChannelState::Closed));
    assert_eq!(events.try_recv().map(|e| e.kind), Ok(EventKind::Open));
    let close = events.try_recv().ok();
    assert_eq!(close.as_ref().map(|e| e.kind), Some(EventKind::Close));
    assert_eq!(close.map(|e| e.timestamp), Some(opened_at.plus_millis(HOUR_MS)));
}

#[tokio::test]
async fn unauthorized_closure_attempts_leave_the_channel_open() {
    let h = harness();
    let opened_at = t(HOUR_MS);

    // u2 never receives the close grant.
    for hours in 1..=5 {
        let attempt = close_request("ch-1", "u2", opened_at.plus_millis(hours * HOUR_MS));
        assert!(h.dispatcher.handle(attempt).await.accepted());
    }

    assert!(h.dispatcher.handle(open_request("ch-1", "u1", opened_at)).await.accepted());
    assert_eq!(h.dispatcher.channel_state("ch-1"), Some(ChannelState::Open));
}

#[tokio::test]
async fn open_requires_at_least_one_user() {
    let h = harness();
    let empty = Request::OpenChannel {
        channel: ChannelSpec {
            id: "ch-1".to_string(),
            key_id: "k".to_string(),
            permissions: Permissions::new(),
        },
        key: vec![],
        action: SignedAction::signed_by("u1", t(1_000)),
    };
    let response = h.dispatcher.handle(empty).await;
    assert!(matches!(response, Response::Result { ok: false }));
    assert_eq!(h.dispatcher.channel_state("ch-1"), Some(ChannelState::Buffered));
}

#[tokio::test]
async fn early_message_is_buffered_and_replayed_after_open() {
    let h = harness();

    // The message arrives while the channel is still Buffered.
    let rejected = h
        .dispatcher
        .handle(message_request("ch-1", "u1", t(2_000), b"early"))
        .await;
    assert!(matches!(rejected, Response::Result { ok: false }));

    // The router parks it for replay.
    let queued = h
        .dispatcher
        .handle(Request::BufferOperation {
            channel_id: "ch-1".to_string(),
            operation: ChannelOp::Message {
                action: SignedAction::signed_by("u1", t(2_000)),
                payload: b"early".to_vec(),
            },
        })
        .await;
    assert!(queued.accepted());

    let (_, mut events) = subscribe(&h, "ch-1").await;
    assert!(h.dispatcher.handle(open_request("ch-1", "u1", t(1_000))).await.accepted());

    // After observing the open, the router replays the buffer.
    for op in h.dispatcher.drain_buffered("ch-1") {
        match op {
            ChannelOp::Message { action, payload } => {
                let replay = Request::AddMessage {
                    channel_id: "ch-1".to_string(),
                    action,
                    message: payload,
                };
                assert!(h.dispatcher.handle(replay).await.accepted());
            }
            other => panic!("unexpected buffered op: {other:?}"),
        }
    }
    assert_eq!(h.dispatcher.pending_buffered("ch-1"), 0);

    assert_eq!(events.try_recv().map(|e| e.kind), Ok(EventKind::Open));
    let replayed = events.try_recv().ok();
    assert_eq!(replayed.as_ref().map(|e| e.kind), Some(EventKind::Message));
    assert_eq!(replayed.and_then(|e| e.data), Some(b"early".to_vec()));
}

#[tokio::test]
async fn closed_channel_still_accepts_in_flight_messages() {
    let h = harness();
    assert!(h.dispatcher.handle(open_request("ch-1", "u1", t(1_000))).await.accepted());
    assert!(h.dispatcher.handle(message_request("ch-1", "u1", t(2_000), b"a")).await.accepted());
    assert!(h.dispatcher.handle(close_request("ch-1", "u1", t(3_000))).await.accepted());

    // A message that was already in the pipeline when the close landed.
    let late = h
        .dispatcher
        .handle(message_request("ch-1", "u1", t(2_500), b"late"))
        .await;
    assert!(late.accepted());
    assert_eq!(h.dispatcher.channel_state("ch-1"), Some(ChannelState::Closed));
}
