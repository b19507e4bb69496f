// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::Db;

#[tokio::test]
async fn call_runs_against_a_live_schema() {
    let db = Db::open(":memory:", 4).unwrap();
    let n: i64 = db
        .call(|conn| conn.query_row("SELECT COUNT(*) FROM devices", [], |row| row.get(0)))
        .await
        .unwrap();
    assert_eq!(n, 0);
}

#[tokio::test]
async fn concurrent_calls_share_the_pool() {
    let db = Db::open(":memory:", 1).unwrap();
    let mut handles = Vec::new();
    for i in 0..8 {
        let db = db.clone();
        handles.push(tokio::spawn(async move {
            db.call(move |conn| {
                conn.execute(
                    "INSERT INTO device_logs (device_id, message, received_at) \
                     VALUES (?1, ?2, ?3)",
                    rusqlite::params![
                        format!("dev_{i}"),
                        "line",
                        "2025-01-01T00:00:00Z"
                    ],
                )
            })
            .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let n: i64 = db
        .call(|conn| conn.query_row("SELECT COUNT(*) FROM device_logs", [], |row| row.get(0)))
        .await
        .unwrap();
    assert_eq!(n, 8);
}

#[tokio::test]
async fn file_backed_pool_sees_one_database() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("toond.db");
    let db = Db::open(path.to_str().unwrap(), 4).unwrap();

    db.call(|conn| {
        conn.execute(
            "INSERT INTO device_logs (device_id, message, received_at) VALUES ('d', 'm', 't')",
            [],
        )
    })
    .await
    .unwrap();

    // A different pooled connection must see the same row.
    for _ in 0..4 {
        let n: i64 = db
            .call(|conn| {
                conn.query_row("SELECT COUNT(*) FROM device_logs", [], |row| row.get(0))
            })
            .await
            .unwrap();
        assert_eq!(n, 1);
    }
}

#[test]
fn reopening_a_database_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("toond.db");
    drop(Db::open(path.to_str().unwrap(), 2).unwrap());
    // Second open re-runs migrations over existing tables.
    drop(Db::open(path.to_str().unwrap(), 2).unwrap());
}
