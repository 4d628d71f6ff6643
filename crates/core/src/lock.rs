// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Deadlock-free multi-resource lock batches
//!
//! A batch of lock needs is sanitized into a canonical acquisition order:
//! duplicate ids collapse to the strongest requested strength, then all Read
//! needs sort ascending by id followed by all Write needs ascending by id.
//! Because every concurrent batch acquires in this same global order,
//! batches that share resources but list them differently can never deadlock
//! each other.
//!
//! Acquisition is all-or-nothing: the first failed `try_lock` rolls back the
//! locks already taken, in reverse acquisition order. Releasing a held batch
//! walks the canonical order strictly in reverse.
//!
//! The coordinator has no resource-specific knowledge; it drives any
//! [`LockTable`], whether that table guards channel records or user records.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Requested lock strength; Write beats Read when a batch names an id twice
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strength {
    Read,
    Write,
}

/// One (resource id, strength) entry in a lock batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockNeed {
    pub id: String,
    pub strength: Strength,
}

impl LockNeed {
    pub fn read(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            strength: Strength::Read,
        }
    }

    pub fn write(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            strength: Strength::Write,
        }
    }
}

/// Non-blocking lock operations over a set of named resources
pub trait LockTable {
    /// Attempt to take the lock; false means "not ready", never an error
    fn try_lock(&self, id: &str, strength: Strength) -> bool;
    /// Release a previously taken lock; false if nothing was held
    fn unlock(&self, id: &str, strength: Strength) -> bool;
}

/// A sanitized batch of lock needs in canonical acquisition order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockBatch {
    needs: Vec<LockNeed>,
}

impl LockBatch {
    /// Sanitize raw needs into the canonical order
    pub fn new(needs: impl IntoIterator<Item = LockNeed>) -> Self {
        let mut strongest: HashMap<String, Strength> = HashMap::new();
        for need in needs {
            strongest
                .entry(need.id)
                .and_modify(|s| *s = (*s).max(need.strength))
                .or_insert(need.strength);
        }

        let mut reads: Vec<String> = Vec::new();
        let mut writes: Vec<String> = Vec::new();
        for (id, strength) in strongest {
            match strength {
                Strength::Read => reads.push(id),
                Strength::Write => writes.push(id),
            }
        }
        reads.sort();
        writes.sort();

        let needs = reads
            .into_iter()
            .map(LockNeed::read)
            .chain(writes.into_iter().map(LockNeed::write))
            .collect();
        Self { needs }
    }

    /// The canonical, deduplicated needs
    pub fn needs(&self) -> &[LockNeed] {
        &self.needs
    }

    pub fn is_empty(&self) -> bool {
        self.needs.is_empty()
    }

    /// Acquire every lock in the batch, or none of them
    ///
    /// On the first `try_lock` failure, locks already taken in this batch
    /// are released in reverse acquisition order and the whole batch reports
    /// failure; the caller must treat it as fully unlocked.
    pub fn acquire(&self, table: &impl LockTable) -> bool {
        for (taken, need) in self.needs.iter().enumerate() {
            if !table.try_lock(&need.id, need.strength) {
                for held in self.needs[..taken].iter().rev() {
                    table.unlock(&held.id, held.strength);
                }
                return false;
            }
        }
        true
    }

    /// Release a held batch, strictly in reverse of the canonical order
    ///
    /// True iff every unlock succeeded.
    pub fn release(&self, table: &impl LockTable) -> bool {
        let mut all = true;
        for need in self.needs.iter().rev() {
            all &= table.unlock(&need.id, need.strength);
        }
        all
    }
}

#[cfg(test)]
#[path = "lock_tests.rs"]
mod tests;
