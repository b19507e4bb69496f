// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use rusqlite::{params, Connection, OptionalExtension, Row};

/// One row of `device_commands`.
#[derive(Debug, Clone)]
pub struct CommandRecord {
    pub command_id: String,
    pub company_id: String,
    pub device_id: String,
    pub name: String,
    pub payload: String,
    pub priority: i64,
    pub issued_at: String,
    pub expires_at: String,
    pub server_signature: String,
    pub status: String,
    pub completed_at: Option<String>,
    pub ack_status: Option<String>,
    pub ack_message: Option<String>,
    pub execution_time_ms: Option<i64>,
    pub raw_ack: Option<String>,
}

const ALL_COLUMNS: &str = "command_id, company_id, device_id, name, payload, priority, \
     issued_at, expires_at, server_signature, status, completed_at, ack_status, \
     ack_message, execution_time_ms, raw_ack";

fn from_row(row: &Row<'_>) -> rusqlite::Result<CommandRecord> {
    Ok(CommandRecord {
        command_id: row.get(0)?,
        company_id: row.get(1)?,
        device_id: row.get(2)?,
        name: row.get(3)?,
        payload: row.get(4)?,
        priority: row.get(5)?,
        issued_at: row.get(6)?,
        expires_at: row.get(7)?,
        server_signature: row.get(8)?,
        status: row.get(9)?,
        completed_at: row.get(10)?,
        ack_status: row.get(11)?,
        ack_message: row.get(12)?,
        execution_time_ms: row.get(13)?,
        raw_ack: row.get(14)?,
    })
}

pub fn insert(conn: &Connection, rec: &CommandRecord) -> rusqlite::Result<()> {
    conn.execute(
        r#"
        INSERT INTO device_commands (
            command_id, company_id, device_id, name, payload, priority,
            issued_at, expires_at, server_signature, status
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 'pending')
        "#,
        params![
            &rec.command_id,
            &rec.company_id,
            &rec.device_id,
            &rec.name,
            &rec.payload,
            rec.priority,
            &rec.issued_at,
            &rec.expires_at,
            &rec.server_signature,
        ],
    )?;
    Ok(())
}

pub fn get(conn: &Connection, command_id: &str) -> rusqlite::Result<Option<CommandRecord>> {
    conn.query_row(
        &format!("SELECT {ALL_COLUMNS} FROM device_commands WHERE command_id = ?1"),
        [command_id],
        |row| from_row(row),
    )
    .optional()
}

/// Pending queue for one device: priority desc, then oldest first.
pub fn pending_for_device(
    conn: &Connection,
    device_id: &str,
) -> rusqlite::Result<Vec<CommandRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ALL_COLUMNS} FROM device_commands \
         WHERE device_id = ?1 AND status = 'pending' \
         ORDER BY priority DESC, issued_at ASC"
    ))?;
    let rows = stmt.query_map([device_id], |row| from_row(row))?;
    rows.collect()
}

pub fn count_pending(conn: &Connection, device_id: &str) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM device_commands WHERE device_id = ?1 AND status = 'pending'",
        [device_id],
        |row| row.get(0),
    )
}

/// Outcome of an acknowledgement attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    /// This ack performed the pending → completed transition.
    Completed,
    /// The command was already terminal; the ack is idempotent.
    AlreadySettled,
    /// No such command for this device.
    NotFound,
}

/// Acknowledgement fields captured from the device.
#[derive(Debug, Clone)]
pub struct Ack {
    pub status: String,
    pub message: Option<String>,
    pub execution_time_ms: Option<i64>,
    pub raw: String,
    pub completed_at: String,
}

/// Complete a command exactly once. The transition is a conditional update
/// (`WHERE status = 'pending'`); a lost race or repeat ack settles as
/// [`AckOutcome::AlreadySettled`].
pub fn complete(
    conn: &Connection,
    command_id: &str,
    device_id: &str,
    ack: &Ack,
) -> rusqlite::Result<AckOutcome> {
    let changed = conn.execute(
        r#"
        UPDATE device_commands SET
            status = 'completed',
            completed_at = ?3,
            ack_status = ?4,
            ack_message = ?5,
            execution_time_ms = ?6,
            raw_ack = ?7
        WHERE command_id = ?1 AND device_id = ?2 AND status = 'pending'
        "#,
        params![
            command_id,
            device_id,
            &ack.completed_at,
            &ack.status,
            &ack.message,
            ack.execution_time_ms,
            &ack.raw,
        ],
    )?;
    if changed == 1 {
        return Ok(AckOutcome::Completed);
    }

    let exists: i64 = conn.query_row(
        "SELECT COUNT(*) FROM device_commands WHERE command_id = ?1 AND device_id = ?2",
        params![command_id, device_id],
        |row| row.get(0),
    )?;
    if exists > 0 {
        Ok(AckOutcome::AlreadySettled)
    } else {
        Ok(AckOutcome::NotFound)
    }
}

/// Flip every overdue pending command to expired; returns how many.
pub fn expire_due(conn: &Connection, now: &str) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE device_commands SET status = 'expired' \
         WHERE status = 'pending' AND expires_at < ?1",
        [now],
    )
}

/// Expire all of one device's pending commands (revocation path).
pub fn expire_for_device(conn: &Connection, device_id: &str) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE device_commands SET status = 'expired' \
         WHERE device_id = ?1 AND status = 'pending'",
        [device_id],
    )
}

#[cfg(test)]
#[path = "commands_tests.rs"]
mod tests;
