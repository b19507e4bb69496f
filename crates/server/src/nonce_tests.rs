// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use chrono::{TimeZone, Utc};

use super::{NonceOutcome, NonceStore};
use crate::store::Db;

fn store() -> NonceStore {
    NonceStore::new(Db::open(":memory:", 1).unwrap(), 86_400)
}

fn t0() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap()
}

#[tokio::test]
async fn fresh_nonce_is_accepted_once() {
    let nonces = store();
    assert_eq!(
        nonces.check_and_mark("dev_1", "nonce-1", t0()).await.unwrap(),
        NonceOutcome::Accepted
    );
    assert_eq!(
        nonces.check_and_mark("dev_1", "nonce-1", t0()).await.unwrap(),
        NonceOutcome::Reused
    );
}

#[tokio::test]
async fn concurrent_marks_accept_exactly_one() {
    let nonces = std::sync::Arc::new(store());
    let mut handles = Vec::new();
    for _ in 0..16 {
        let nonces = std::sync::Arc::clone(&nonces);
        handles.push(tokio::spawn(async move {
            nonces.check_and_mark("dev_1", "racing-nonce", t0()).await.unwrap()
        }));
    }

    let mut accepted = 0;
    for handle in handles {
        if handle.await.unwrap() == NonceOutcome::Accepted {
            accepted += 1;
        }
    }
    assert_eq!(accepted, 1);
}

#[tokio::test]
async fn different_devices_do_not_collide() {
    let nonces = store();
    assert_eq!(
        nonces.check_and_mark("dev_1", "shared", t0()).await.unwrap(),
        NonceOutcome::Accepted
    );
    assert_eq!(
        nonces.check_and_mark("dev_2", "shared", t0()).await.unwrap(),
        NonceOutcome::Accepted
    );
}

#[tokio::test]
async fn nonce_becomes_usable_after_ttl() {
    let nonces = store();
    nonces.check_and_mark("dev_1", "n", t0()).await.unwrap();

    // Within the TTL it is a replay; past it the cache entry is stale and
    // the store reclaims the row.
    let within = t0() + chrono::Duration::seconds(3_600);
    assert_eq!(
        nonces.check_and_mark("dev_1", "n", within).await.unwrap(),
        NonceOutcome::Reused
    );

    let after_ttl = t0() + chrono::Duration::seconds(86_401);
    assert_eq!(
        nonces.check_and_mark("dev_1", "n", after_ttl).await.unwrap(),
        NonceOutcome::Accepted
    );
}

#[tokio::test]
async fn purge_reports_removed_rows() {
    let nonces = store();
    nonces.check_and_mark("dev_1", "a", t0()).await.unwrap();
    nonces.check_and_mark("dev_1", "b", t0()).await.unwrap();

    let purged =
        nonces.purge_expired(t0() + chrono::Duration::seconds(90_000)).await.unwrap();
    assert_eq!(purged, 2);
}
