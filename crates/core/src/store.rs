// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Concurrent get-or-create index of shared records
//!
//! Channel records, lock records, and listener records all live in an index
//! keyed by a stable string id: the first reference creates the record,
//! later references find it. Creation must be atomic at the index level so
//! two concurrent first references can never produce two records; each
//! record then carries its own lock, independent of the index lock.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// An index of `Arc`-shared records with atomic first-reference-wins creation
pub struct SharedIndex<T> {
    records: RwLock<HashMap<String, Arc<T>>>,
}

impl<T> SharedIndex<T> {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Fetch the record for `id`, creating it with `make` on first reference
    ///
    /// The index write lock is held across the existence check and the
    /// insert, so exactly one record is ever created per id.
    pub fn get_or_create(&self, id: &str, make: impl FnOnce() -> T) -> Arc<T> {
        if let Some(found) = self
            .records
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
        {
            return Arc::clone(found);
        }
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        Arc::clone(
            records
                .entry(id.to_string())
                .or_insert_with(|| Arc::new(make())),
        )
    }

    /// Fetch an existing record without creating one
    pub fn get(&self, id: &str) -> Option<Arc<T>> {
        self.records
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .map(Arc::clone)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.records.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every record the predicate rejects (used by lock-record sweeps)
    pub fn retain(&self, mut keep: impl FnMut(&str, &Arc<T>) -> bool) {
        self.records
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|id, record| keep(id, record));
    }
}

impl<T> Default for SharedIndex<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
