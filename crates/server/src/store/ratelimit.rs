// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use rusqlite::{params, Connection};

/// Increment the fixed-window counter for `(device, endpoint)` and return
/// the new count. The upsert resolves read-modify-write races in the store.
pub fn increment(
    conn: &Connection,
    device_id: &str,
    endpoint: &str,
    window_start: i64,
) -> rusqlite::Result<i64> {
    conn.execute(
        r#"
        INSERT INTO rate_limits (device_id, endpoint, window_start, count)
        VALUES (?1, ?2, ?3, 1)
        ON CONFLICT(device_id, endpoint, window_start) DO UPDATE SET
            count = count + 1
        "#,
        params![device_id, endpoint, window_start],
    )?;
    conn.query_row(
        "SELECT count FROM rate_limits \
         WHERE device_id = ?1 AND endpoint = ?2 AND window_start = ?3",
        params![device_id, endpoint, window_start],
        |row| row.get(0),
    )
}

/// Drop windows that ended before `oldest_window_start`.
pub fn prune(conn: &Connection, oldest_window_start: i64) -> rusqlite::Result<usize> {
    conn.execute("DELETE FROM rate_limits WHERE window_start < ?1", [oldest_window_start])
}

#[cfg(test)]
#[path = "ratelimit_tests.rs"]
mod tests;
