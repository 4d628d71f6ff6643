// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Symmetric-key storage seam
//!
//! The decryption pipeline resolves a channel's `key_id` to key material
//! through this trait. The material is opaque bytes here; envelope handling
//! lives upstream.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Resolves channel key ids to symmetric key material
#[async_trait]
pub trait KeyStore: Send + Sync {
    async fn put(&self, key_id: &str, key: Vec<u8>);
    async fn get(&self, key_id: &str) -> Option<Vec<u8>>;
}

/// In-memory key store backing tests and single-process deployments
#[derive(Default)]
pub struct MemoryKeyStore {
    keys: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyStore for MemoryKeyStore {
    async fn put(&self, key_id: &str, key: Vec<u8>) {
        self.keys.write().await.insert(key_id.to_string(), key);
    }

    async fn get(&self, key_id: &str) -> Option<Vec<u8>> {
        self.keys.read().await.get(key_id).cloned()
    }
}

#[cfg(test)]
#[path = "keystore_tests.rs"]
mod tests;
