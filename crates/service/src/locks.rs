// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Resource lock service
//!
//! Hosts one lockable record per resource id, partitioned by resource class,
//! and exposes the lock coordinator behind a bounded worker pool: workers
//! pull `{class, needs, op}` requests off one shared queue, run the batch
//! against the class's partition, and answer on a per-request oneshot slot.
//!
//! Records are created lazily on first reference. A resource class declares
//! which locking capability its records carry: `Exclusive` (single holder,
//! whatever strength was asked for) or `ReadWrite` (many readers, one
//! writer). Free records idle past a threshold are removed by `sweep_idle`;
//! a held record is never swept.
//!
//! Shutdown is cooperative: closing the queue lets every worker finish its
//! current request and drain; nobody holding a lock is interrupted.

use crate::config::ServiceConfig;
use crate::error::ServiceError;
use dmpc_core::{Clock, LockBatch, LockNeed, LockTable, SharedIndex, Strength, SystemClock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Resource class for channel records (exclusive locking)
pub const CHANNEL_CLASS: &str = "channel";
/// Resource class for user records (read/write locking)
pub const USER_CLASS: &str = "user";

/// Which locking capability a resource class carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockCapability {
    /// One holder at a time; Read and Write requests both take the record whole
    Exclusive,
    /// Many readers or one writer
    ReadWrite,
}

/// Whether a batch should be acquired or released
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockOp {
    Lock,
    Unlock,
}

/// One unit of work for the lock workers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRequest {
    pub class: String,
    pub needs: Vec<LockNeed>,
    pub op: LockOp,
}

struct ExclusiveRecord {
    held: bool,
    released_at: Instant,
}

struct SharedRecord {
    readers: u32,
    writer: bool,
    released_at: Instant,
}

enum PartitionRecords {
    Exclusive(SharedIndex<Mutex<ExclusiveRecord>>),
    ReadWrite(SharedIndex<Mutex<SharedRecord>>),
}

/// One resource class's lock records
struct Partition<C: Clock> {
    records: PartitionRecords,
    clock: C,
}

impl<C: Clock> Partition<C> {
    fn new(capability: LockCapability, clock: C) -> Self {
        let records = match capability {
            LockCapability::Exclusive => PartitionRecords::Exclusive(SharedIndex::new()),
            LockCapability::ReadWrite => PartitionRecords::ReadWrite(SharedIndex::new()),
        };
        Self { records, clock }
    }

    fn record_count(&self) -> usize {
        match &self.records {
            PartitionRecords::Exclusive(index) => index.len(),
            PartitionRecords::ReadWrite(index) => index.len(),
        }
    }

    /// Remove records that are free and idle past the threshold
    ///
    /// A record with an `Arc` clone outside the index belongs to an acquirer
    /// that has fetched it but not yet taken its mutex; removing it would let
    /// a second acquirer create a fresh record for the same id and hold the
    /// resource concurrently. Such records always survive the sweep.
    fn sweep(&self, threshold: Duration) -> usize {
        let now = self.clock.now();
        let before = self.record_count();
        match &self.records {
            PartitionRecords::Exclusive(index) => index.retain(|_, record| {
                if Arc::strong_count(record) > 1 {
                    return true;
                }
                let record = record.lock().unwrap_or_else(|e| e.into_inner());
                record.held || now.duration_since(record.released_at) < threshold
            }),
            PartitionRecords::ReadWrite(index) => index.retain(|_, record| {
                if Arc::strong_count(record) > 1 {
                    return true;
                }
                let record = record.lock().unwrap_or_else(|e| e.into_inner());
                record.writer
                    || record.readers > 0
                    || now.duration_since(record.released_at) < threshold
            }),
        }
        before - self.record_count()
    }
}

impl<C: Clock> LockTable for Partition<C> {
    fn try_lock(&self, id: &str, strength: Strength) -> bool {
        match &self.records {
            PartitionRecords::Exclusive(index) => {
                let now = self.clock.now();
                let record = index.get_or_create(id, || {
                    Mutex::new(ExclusiveRecord {
                        held: false,
                        released_at: now,
                    })
                });
                let mut record = record.lock().unwrap_or_else(|e| e.into_inner());
                if record.held {
                    false
                } else {
                    record.held = true;
                    true
                }
            }
            PartitionRecords::ReadWrite(index) => {
                let now = self.clock.now();
                let record = index.get_or_create(id, || {
                    Mutex::new(SharedRecord {
                        readers: 0,
                        writer: false,
                        released_at: now,
                    })
                });
                let mut record = record.lock().unwrap_or_else(|e| e.into_inner());
                match strength {
                    Strength::Read => {
                        if record.writer {
                            false
                        } else {
                            record.readers += 1;
                            true
                        }
                    }
                    Strength::Write => {
                        if record.writer || record.readers > 0 {
                            false
                        } else {
                            record.writer = true;
                            true
                        }
                    }
                }
            }
        }
    }

    fn unlock(&self, id: &str, strength: Strength) -> bool {
        match &self.records {
            PartitionRecords::Exclusive(index) => {
                let Some(record) = index.get(id) else {
                    return false;
                };
                let mut record = record.lock().unwrap_or_else(|e| e.into_inner());
                if record.held {
                    record.held = false;
                    record.released_at = self.clock.now();
                    true
                } else {
                    false
                }
            }
            PartitionRecords::ReadWrite(index) => {
                let Some(record) = index.get(id) else {
                    return false;
                };
                let mut record = record.lock().unwrap_or_else(|e| e.into_inner());
                let released = match strength {
                    Strength::Read => {
                        if record.readers > 0 {
                            record.readers -= 1;
                            true
                        } else {
                            false
                        }
                    }
                    Strength::Write => {
                        if record.writer {
                            record.writer = false;
                            true
                        } else {
                            false
                        }
                    }
                };
                if released && !record.writer && record.readers == 0 {
                    record.released_at = self.clock.now();
                }
                released
            }
        }
    }
}

struct QueuedRequest {
    request: LockRequest,
    reply: oneshot::Sender<bool>,
}

/// Cloneable sender side of the lock service
#[derive(Clone)]
pub struct LockServiceHandle {
    tx: mpsc::Sender<QueuedRequest>,
}

impl LockServiceHandle {
    /// Submit a request and wait for its boolean outcome
    pub async fn request(&self, request: LockRequest) -> Result<bool, ServiceError> {
        let (reply, slot) = oneshot::channel();
        self.tx
            .send(QueuedRequest { request, reply })
            .await
            .map_err(|_| ServiceError::LockServiceUnavailable)?;
        slot.await.map_err(|_| ServiceError::LockServiceUnavailable)
    }

    /// Atomically acquire a batch in the given class
    pub async fn lock(
        &self,
        class: impl Into<String>,
        needs: Vec<LockNeed>,
    ) -> Result<bool, ServiceError> {
        self.request(LockRequest {
            class: class.into(),
            needs,
            op: LockOp::Lock,
        })
        .await
    }

    /// Release a previously acquired batch
    pub async fn unlock(
        &self,
        class: impl Into<String>,
        needs: Vec<LockNeed>,
    ) -> Result<bool, ServiceError> {
        self.request(LockRequest {
            class: class.into(),
            needs,
            op: LockOp::Unlock,
        })
        .await
    }
}

/// Worker-pool service hosting the lock records for every resource class
pub struct ResourceLockService<C: Clock = SystemClock> {
    partitions: Arc<HashMap<String, Partition<C>>>,
    tx: mpsc::Sender<QueuedRequest>,
    workers: Vec<JoinHandle<()>>,
}

/// The default partitions: exclusive channel locks and read/write user locks
pub fn default_classes() -> Vec<(String, LockCapability)> {
    vec![
        (CHANNEL_CLASS.to_string(), LockCapability::Exclusive),
        (USER_CLASS.to_string(), LockCapability::ReadWrite),
    ]
}

impl ResourceLockService<SystemClock> {
    /// Spawn over the default resource classes with the system clock
    pub fn spawn(config: &ServiceConfig) -> Self {
        Self::spawn_with_clock(config, default_classes(), SystemClock)
    }
}

impl<C: Clock + 'static> ResourceLockService<C> {
    /// Spawn the worker pool over the given resource classes
    pub fn spawn_with_clock(
        config: &ServiceConfig,
        classes: Vec<(String, LockCapability)>,
        clock: C,
    ) -> Self {
        let partitions: Arc<HashMap<String, Partition<C>>> = Arc::new(
            classes
                .into_iter()
                .map(|(name, capability)| (name, Partition::new(capability, clock.clone())))
                .collect(),
        );

        let (tx, rx) = mpsc::channel::<QueuedRequest>(config.queue_capacity.max(1));
        let rx = Arc::new(tokio::sync::Mutex::new(rx));

        let workers = (0..config.lock_workers.max(1))
            .map(|index| {
                let rx = Arc::clone(&rx);
                let partitions = Arc::clone(&partitions);
                tokio::spawn(async move {
                    loop {
                        let queued = { rx.lock().await.recv().await };
                        let Some(queued) = queued else {
                            debug!(worker = index, "lock worker drained");
                            break;
                        };
                        let outcome = process(&partitions, &queued.request);
                        // The requester may have given up; that is not our problem.
                        let _ = queued.reply.send(outcome);
                    }
                })
            })
            .collect();

        Self {
            partitions,
            tx,
            workers,
        }
    }

    /// A cloneable handle for submitting requests
    pub fn handle(&self) -> LockServiceHandle {
        LockServiceHandle {
            tx: self.tx.clone(),
        }
    }

    /// Lock records currently hosted for a class
    pub fn record_count(&self, class: &str) -> usize {
        self.partitions
            .get(class)
            .map(Partition::record_count)
            .unwrap_or(0)
    }

    /// Remove free records idle past the threshold; returns how many went
    pub fn sweep_idle(&self, threshold: Duration) -> usize {
        let swept: usize = self
            .partitions
            .values()
            .map(|partition| partition.sweep(threshold))
            .sum();
        if swept > 0 {
            debug!(swept, "swept idle lock records");
        }
        swept
    }

    /// Run `sweep_idle` forever on the configured cadence
    ///
    /// The caller owns the returned handle and aborts it on shutdown.
    pub fn start_sweeper(&self, config: &ServiceConfig) -> JoinHandle<()> {
        let partitions = Arc::clone(&self.partitions);
        let threshold = config.lock_idle_threshold;
        let mut ticker = tokio::time::interval(config.lock_sweep_interval);
        tokio::spawn(async move {
            loop {
                ticker.tick().await;
                let swept: usize = partitions.values().map(|p| p.sweep(threshold)).sum();
                if swept > 0 {
                    debug!(swept, "swept idle lock records");
                }
            }
        })
    }

    /// Close the queue and wait for every worker to drain
    pub async fn shutdown(self) {
        drop(self.tx);
        for worker in self.workers {
            let _ = worker.await;
        }
    }
}

fn process<C: Clock>(partitions: &HashMap<String, Partition<C>>, request: &LockRequest) -> bool {
    let Some(partition) = partitions.get(&request.class) else {
        warn!(class = %request.class, "lock request for unknown resource class");
        return false;
    };
    let batch = LockBatch::new(request.needs.iter().cloned());
    match request.op {
        LockOp::Lock => batch.acquire(partition),
        LockOp::Unlock => batch.release(partition),
    }
}

#[cfg(test)]
#[path = "locks_tests.rs"]
mod tests;
