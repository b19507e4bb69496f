// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use rusqlite::{params, Connection};

/// Atomically record a nonce for a device.
///
/// Returns true when the nonce was accepted (fresh, or reclaiming an
/// expired row); false means the nonce is live and this is a replay. The
/// whole decision is a single upsert so concurrent callers race on the
/// primary key, never on application logic.
pub fn try_mark(
    conn: &Connection,
    device_id: &str,
    nonce_hash: &str,
    used_at: &str,
    expires_at: &str,
) -> rusqlite::Result<bool> {
    let changed = conn.execute(
        r#"
        INSERT INTO device_nonces (device_id, nonce_hash, used_at, expires_at)
        VALUES (?1, ?2, ?3, ?4)
        ON CONFLICT(nonce_hash, device_id) DO UPDATE SET
            used_at = ?3,
            expires_at = ?4
        WHERE device_nonces.expires_at <= ?3
        "#,
        params![device_id, nonce_hash, used_at, expires_at],
    )?;
    Ok(changed == 1)
}

/// Delete rows past their expiry; returns how many were purged.
pub fn purge_expired(conn: &Connection, now: &str) -> rusqlite::Result<usize> {
    conn.execute("DELETE FROM device_nonces WHERE expires_at <= ?1", [now])
}

pub fn count(conn: &Connection) -> rusqlite::Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM device_nonces", [], |row| row.get(0))
}

#[cfg(test)]
#[path = "nonces_tests.rs"]
mod tests;
