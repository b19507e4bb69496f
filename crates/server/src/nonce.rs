// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! At-most-once nonce acceptance per device.
//!
//! The authoritative answer is the `device_nonces` primary key; the
//! in-memory cache only short-circuits recently-seen nonces and may be
//! dropped entirely without affecting correctness.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use indexmap::IndexMap;

use crate::clock::to_wire;
use crate::crypto::sha256_hex;
use crate::error::ErrorKind;
use crate::store::{nonces, Db};

/// Per-device cache bound; oldest entries are evicted first.
const CACHE_CAP: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NonceOutcome {
    Accepted,
    Reused,
}

pub struct NonceStore {
    db: Db,
    ttl_secs: i64,
    /// Device id → accepted nonce hash → expiry, insertion-ordered.
    cache: Mutex<HashMap<String, IndexMap<String, DateTime<Utc>>>>,
}

impl NonceStore {
    pub fn new(db: Db, ttl_secs: i64) -> Self {
        Self { db, ttl_secs, cache: Mutex::new(HashMap::new()) }
    }

    /// Accept the nonce exactly once within its TTL.
    pub async fn check_and_mark(
        &self,
        device_id: &str,
        nonce: &str,
        now: DateTime<Utc>,
    ) -> Result<NonceOutcome, ErrorKind> {
        let hash = sha256_hex(nonce);

        // Fast negative path: an unexpired cache hit is a definite replay.
        // An expired hit falls through to the store, which can reclaim it.
        if let Ok(mut cache) = self.cache.lock() {
            if let Some(seen) = cache.get_mut(device_id) {
                match seen.get(&hash) {
                    Some(expires) if *expires > now => return Ok(NonceOutcome::Reused),
                    Some(_) => {
                        seen.shift_remove(&hash);
                    }
                    None => {}
                }
            }
        }

        let expires = now + Duration::seconds(self.ttl_secs);
        let used_at = to_wire(now);
        let expires_at = to_wire(expires);
        let (device, hash_for_db) = (device_id.to_owned(), hash.clone());
        let accepted = self
            .db
            .call(move |conn| nonces::try_mark(conn, &device, &hash_for_db, &used_at, &expires_at))
            .await?;

        if !accepted {
            return Ok(NonceOutcome::Reused);
        }

        if let Ok(mut cache) = self.cache.lock() {
            let seen = cache.entry(device_id.to_owned()).or_default();
            if seen.len() >= CACHE_CAP {
                seen.shift_remove_index(0);
            }
            seen.insert(hash, expires);
        }
        Ok(NonceOutcome::Accepted)
    }

    /// Delete expired rows; returns how many were purged.
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, ErrorKind> {
        let cutoff = to_wire(now);
        self.db.call(move |conn| nonces::purge_expired(conn, &cutoff)).await
    }
}

impl std::fmt::Debug for NonceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let devices = self.cache.lock().map(|c| c.len()).unwrap_or(0);
        f.debug_struct("NonceStore").field("cached_devices", &devices).finish()
    }
}

#[cfg(test)]
#[path = "nonce_tests.rs"]
mod tests;
