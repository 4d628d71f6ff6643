// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Millisecond timestamps for channel lifecycle ordering
//!
//! Actions arriving from the decryption pipeline carry the wall-clock time
//! at which they were signed, as milliseconds since the Unix epoch. A zero
//! timestamp means "absent" and is rejected by every lifecycle operation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Milliseconds since the Unix epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Create a timestamp from raw epoch milliseconds
    pub fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Current wall-clock time
    pub fn now() -> Self {
        Self(Utc::now().timestamp_millis())
    }

    /// Zero marks an absent/unset timestamp
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn as_millis(&self) -> i64 {
        self.0
    }

    /// A timestamp shifted forward by the given number of milliseconds
    pub fn plus_millis(&self, millis: i64) -> Self {
        Self(self.0 + millis)
    }

    /// Wall-clock representation, if the value is in chrono's range
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.0)
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt.timestamp_millis())
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
#[path = "timestamp_tests.rs"]
mod tests;
