//! Subscriber fan-out: in order, exactly once, no catch-up.

use crate::prelude::*;
use dmpc_core::EventKind;
use dmpc_service::Request;
use tokio::sync::mpsc::error::TryRecvError;

#[tokio::test]
async fn subscriber_sees_the_full_lifecycle_in_order() {
    let h = harness();
    let (_, mut events) = subscribe(&h, "ch-1").await;

    assert!(h.dispatcher.handle(open_request("ch-1", "u1", t(1_000))).await.accepted());
    assert!(h.dispatcher.handle(message_request("ch-1", "u1", t(2_000), b"m1")).await.accepted());
    assert!(h.dispatcher.handle(message_request("ch-1", "u1", t(3_000), b"m2")).await.accepted());
    assert!(h.dispatcher.handle(close_request("ch-1", "u1", t(4_000))).await.accepted());

    let kinds: Vec<EventKind> = std::iter::from_fn(|| events.try_recv().ok())
        .map(|e| e.kind)
        .collect();
    assert_eq!(
        kinds,
        vec![
            EventKind::Open,
            EventKind::Message,
            EventKind::Message,
            EventKind::Close,
        ]
    );
    // Exactly once: the queue is drained, not replaying.
    assert_eq!(events.try_recv(), Err(TryRecvError::Empty));
}

#[tokio::test]
async fn message_events_carry_rank_and_payload() {
    let h = harness();
    let (_, mut events) = subscribe(&h, "ch-1").await;

    assert!(h.dispatcher.handle(open_request("ch-1", "u1", t(1_000))).await.accepted());
    assert!(h.dispatcher.handle(message_request("ch-1", "u1", t(3_000), b"b")).await.accepted());
    // Timed earlier, so it ranks ahead of the message already recorded.
    assert!(h.dispatcher.handle(message_request("ch-1", "u1", t(2_000), b"a")).await.accepted());

    let _ = events.try_recv();
    let first = events.try_recv().ok();
    assert_eq!(first.as_ref().map(|e| e.position), Some(0));
    assert_eq!(first.and_then(|e| e.data), Some(b"b".to_vec()));
    let second = events.try_recv().ok();
    assert_eq!(second.as_ref().map(|e| e.position), Some(0));
    assert_eq!(second.and_then(|e| e.data), Some(b"a".to_vec()));
}

#[tokio::test]
async fn late_subscriber_gets_no_catch_up() {
    let h = harness();

    assert!(h.dispatcher.handle(open_request("ch-1", "u1", t(1_000))).await.accepted());
    assert!(h.dispatcher.handle(message_request("ch-1", "u1", t(2_000), b"m1")).await.accepted());

    let (_, mut events) = subscribe(&h, "ch-1").await;
    assert_eq!(events.try_recv(), Err(TryRecvError::Empty));

    // Only what happens after registration is delivered.
    assert!(h.dispatcher.handle(close_request("ch-1", "u1", t(3_000))).await.accepted());
    assert_eq!(events.try_recv().map(|e| e.kind), Ok(EventKind::Close));
}

#[tokio::test]
async fn unsubscribed_listener_stops_receiving() {
    let h = harness();
    let (id, mut events) = subscribe(&h, "ch-1").await;

    assert!(h.dispatcher.handle(open_request("ch-1", "u1", t(1_000))).await.accepted());
    assert_eq!(events.try_recv().map(|e| e.kind), Ok(EventKind::Open));

    let detached = h
        .dispatcher
        .handle(Request::Unsubscribe {
            channel_id: "ch-1".to_string(),
            subscriber_id: id,
        })
        .await;
    assert!(detached.accepted());

    assert!(h.dispatcher.handle(message_request("ch-1", "u1", t(2_000), b"m")).await.accepted());
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn independent_subscribers_each_get_every_event() {
    let h = harness();
    let (_, mut left) = subscribe(&h, "ch-1").await;
    let (_, mut right) = subscribe(&h, "ch-1").await;

    assert!(h.dispatcher.handle(open_request("ch-1", "u1", t(1_000))).await.accepted());
    assert!(h.dispatcher.handle(message_request("ch-1", "u1", t(2_000), b"m")).await.accepted());

    for events in [&mut left, &mut right] {
        assert_eq!(events.try_recv().map(|e| e.kind), Ok(EventKind::Open));
        assert_eq!(events.try_recv().map(|e| e.kind), Ok(EventKind::Message));
        assert_eq!(events.try_recv(), Err(TryRecvError::Empty));
    }
}
