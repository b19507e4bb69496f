// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use rusqlite::{params, Connection};

/// One uploaded device log line.
#[derive(Debug, Clone)]
pub struct DeviceLogEntry {
    pub device_id: String,
    pub level: Option<String>,
    pub message: String,
    pub logged_at: Option<String>,
    pub received_at: String,
}

/// Append a batch of uploaded log lines; returns how many were written.
pub fn append_batch(conn: &mut Connection, entries: &[DeviceLogEntry]) -> rusqlite::Result<usize> {
    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO device_logs (device_id, level, message, logged_at, received_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        for entry in entries {
            stmt.execute(params![
                &entry.device_id,
                &entry.level,
                &entry.message,
                &entry.logged_at,
                &entry.received_at,
            ])?;
        }
    }
    tx.commit()?;
    Ok(entries.len())
}

pub fn count_for_device(conn: &Connection, device_id: &str) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM device_logs WHERE device_id = ?1",
        [device_id],
        |row| row.get(0),
    )
}
