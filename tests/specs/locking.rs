//! Resource lock scenarios driven through the request surface.

use crate::prelude::*;
use dmpc_core::LockNeed;
use dmpc_service::{LockOp, Request, CHANNEL_CLASS, USER_CLASS};

async fn lock(h: &Harness, class: &str, needs: Vec<LockNeed>) -> bool {
    h.dispatcher
        .handle(Request::Lock {
            class: class.to_string(),
            needs,
            op: LockOp::Lock,
        })
        .await
        .accepted()
}

async fn unlock(h: &Harness, class: &str, needs: Vec<LockNeed>) -> bool {
    h.dispatcher
        .handle(Request::Lock {
            class: class.to_string(),
            needs,
            op: LockOp::Unlock,
        })
        .await
        .accepted()
}

#[tokio::test]
async fn opposing_batches_never_deadlock() {
    let h = std::sync::Arc::new(harness());

    // Both batches name the same two channels in opposite order. Canonical
    // ordering inside the service means one always wins outright and the
    // other retries, instead of each holding one lock and waiting forever.
    let forward = {
        let h = std::sync::Arc::clone(&h);
        tokio::spawn(async move {
            let needs = vec![LockNeed::write("a"), LockNeed::write("b")];
            for _ in 0..1_000 {
                if lock(&h, CHANNEL_CLASS, needs.clone()).await {
                    assert!(unlock(&h, CHANNEL_CLASS, needs.clone()).await);
                    return true;
                }
                tokio::time::sleep(std::time::Duration::from_millis(1)).await;
            }
            false
        })
    };
    let reverse = {
        let h = std::sync::Arc::clone(&h);
        tokio::spawn(async move {
            let needs = vec![LockNeed::write("b"), LockNeed::write("a")];
            for _ in 0..1_000 {
                if lock(&h, CHANNEL_CLASS, needs.clone()).await {
                    assert!(unlock(&h, CHANNEL_CLASS, needs.clone()).await);
                    return true;
                }
                tokio::time::sleep(std::time::Duration::from_millis(1)).await;
            }
            false
        })
    };

    assert!(forward.await.unwrap());
    assert!(reverse.await.unwrap());
}

#[tokio::test]
async fn failed_batch_holds_nothing() {
    let h = harness();

    assert!(lock(&h, CHANNEL_CLASS, vec![LockNeed::write("c")]).await);

    // The batch acquires "a" first, fails on "c", and rolls "a" back.
    assert!(!lock(&h, CHANNEL_CLASS, vec![LockNeed::write("a"), LockNeed::write("c")]).await);

    // "a" is immediately lockable by anyone else.
    assert!(lock(&h, CHANNEL_CLASS, vec![LockNeed::write("a")]).await);
}

#[tokio::test]
async fn user_class_allows_concurrent_readers() {
    let h = harness();

    assert!(lock(&h, USER_CLASS, vec![LockNeed::read("u1")]).await);
    assert!(lock(&h, USER_CLASS, vec![LockNeed::read("u1")]).await);

    // A writer is shut out until every reader releases.
    assert!(!lock(&h, USER_CLASS, vec![LockNeed::write("u1")]).await);
    assert!(unlock(&h, USER_CLASS, vec![LockNeed::read("u1")]).await);
    assert!(unlock(&h, USER_CLASS, vec![LockNeed::read("u1")]).await);
    assert!(lock(&h, USER_CLASS, vec![LockNeed::write("u1")]).await);
}

#[tokio::test]
async fn channel_class_treats_read_and_write_alike() {
    let h = harness();

    // Channel records are exclusive regardless of requested strength.
    assert!(lock(&h, CHANNEL_CLASS, vec![LockNeed::read("a")]).await);
    assert!(!lock(&h, CHANNEL_CLASS, vec![LockNeed::read("a")]).await);
    assert!(unlock(&h, CHANNEL_CLASS, vec![LockNeed::read("a")]).await);
}

#[tokio::test]
async fn duplicate_needs_collapse_to_the_strongest() {
    let h = harness();

    let needs = vec![LockNeed::read("u1"), LockNeed::write("u1")];
    assert!(lock(&h, USER_CLASS, needs.clone()).await);

    // A single write lock was taken, so a reader is refused and a single
    // unlock of the collapsed batch frees the record.
    assert!(!lock(&h, USER_CLASS, vec![LockNeed::read("u1")]).await);
    assert!(unlock(&h, USER_CLASS, needs).await);
    assert!(lock(&h, USER_CLASS, vec![LockNeed::read("u1")]).await);
}

#[tokio::test]
async fn unknown_class_is_refused() {
    let h = harness();
    assert!(!lock(&h, "tenant", vec![LockNeed::write("x")]).await);
}
