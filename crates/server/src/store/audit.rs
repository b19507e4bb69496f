// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use rusqlite::{params, Connection};

/// Append-only audit trail: one row per inbound device payload with the
/// verbatim bytes, the response we sent, and the terminal status.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub company_id: Option<String>,
    pub device_id: Option<String>,
    pub endpoint: String,
    pub inbound: String,
    pub response: String,
    pub status: String,
    pub created_at: String,
}

pub fn append(conn: &Connection, entry: &AuditEntry) -> rusqlite::Result<()> {
    conn.execute(
        r#"
        INSERT INTO audit_log (company_id, device_id, endpoint, inbound, response, status, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
        params![
            &entry.company_id,
            &entry.device_id,
            &entry.endpoint,
            &entry.inbound,
            &entry.response,
            &entry.status,
            &entry.created_at,
        ],
    )?;
    Ok(())
}

pub fn count_for_device(conn: &Connection, device_id: &str) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM audit_log WHERE device_id = ?1",
        [device_id],
        |row| row.get(0),
    )
}

/// Recent entries for one device, newest first.
pub fn recent_for_device(
    conn: &Connection,
    device_id: &str,
    limit: usize,
) -> rusqlite::Result<Vec<AuditEntry>> {
    let mut stmt = conn.prepare(
        "SELECT company_id, device_id, endpoint, inbound, response, status, created_at \
         FROM audit_log WHERE device_id = ?1 ORDER BY id DESC LIMIT ?2",
    )?;
    let rows = stmt.query_map(params![device_id, limit as i64], |row| {
        Ok(AuditEntry {
            company_id: row.get(0)?,
            device_id: row.get(1)?,
            endpoint: row.get(2)?,
            inbound: row.get(3)?,
            response: row.get(4)?,
            status: row.get(5)?,
            created_at: row.get(6)?,
        })
    })?;
    rows.collect()
}
