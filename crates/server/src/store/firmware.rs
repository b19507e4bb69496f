// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use rusqlite::{params, Connection, OptionalExtension, Row};

/// One row of `firmware_releases`.
#[derive(Debug, Clone)]
pub struct FirmwareRecord {
    pub firmware_id: String,
    pub version: String,
    pub device_type: String,
    pub bundle_url_template: String,
    pub checksum: String,
    pub size_bytes: i64,
    pub policy_id: Option<String>,
    pub server_signature: String,
    pub created_at: String,
    pub deprecated_at: Option<String>,
}

const ALL_COLUMNS: &str = "firmware_id, version, device_type, bundle_url_template, checksum, \
     size_bytes, policy_id, server_signature, created_at, deprecated_at";

fn from_row(row: &Row<'_>) -> rusqlite::Result<FirmwareRecord> {
    Ok(FirmwareRecord {
        firmware_id: row.get(0)?,
        version: row.get(1)?,
        device_type: row.get(2)?,
        bundle_url_template: row.get(3)?,
        checksum: row.get(4)?,
        size_bytes: row.get(5)?,
        policy_id: row.get(6)?,
        server_signature: row.get(7)?,
        created_at: row.get(8)?,
        deprecated_at: row.get(9)?,
    })
}

pub fn insert(conn: &Connection, rec: &FirmwareRecord) -> rusqlite::Result<()> {
    conn.execute(
        r#"
        INSERT INTO firmware_releases (
            firmware_id, version, device_type, bundle_url_template, checksum,
            size_bytes, policy_id, server_signature, created_at, deprecated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
        params![
            &rec.firmware_id,
            &rec.version,
            &rec.device_type,
            &rec.bundle_url_template,
            &rec.checksum,
            rec.size_bytes,
            &rec.policy_id,
            &rec.server_signature,
            &rec.created_at,
            &rec.deprecated_at,
        ],
    )?;
    Ok(())
}

pub fn get(conn: &Connection, firmware_id: &str) -> rusqlite::Result<Option<FirmwareRecord>> {
    conn.query_row(
        &format!("SELECT {ALL_COLUMNS} FROM firmware_releases WHERE firmware_id = ?1"),
        [firmware_id],
        |row| from_row(row),
    )
    .optional()
}

/// Latest non-deprecated release for a device type and policy. A release
/// pinned to a policy wins over a general one of the same age.
pub fn latest_for(
    conn: &Connection,
    device_type: &str,
    policy_id: Option<&str>,
) -> rusqlite::Result<Option<FirmwareRecord>> {
    conn.query_row(
        &format!(
            "SELECT {ALL_COLUMNS} FROM firmware_releases \
             WHERE device_type = ?1 AND deprecated_at IS NULL \
               AND (policy_id IS NULL OR policy_id = ?2) \
             ORDER BY (policy_id IS NOT NULL) DESC, created_at DESC \
             LIMIT 1"
        ),
        params![device_type, policy_id],
        |row| from_row(row),
    )
    .optional()
}

pub fn deprecate(conn: &Connection, firmware_id: &str, at: &str) -> rusqlite::Result<bool> {
    let n = conn.execute(
        "UPDATE firmware_releases SET deprecated_at = ?2 \
         WHERE firmware_id = ?1 AND deprecated_at IS NULL",
        params![firmware_id, at],
    )?;
    Ok(n == 1)
}

/// Upsert the per-device rollout state row.
pub fn set_device_state(
    conn: &Connection,
    device_id: &str,
    firmware_id: &str,
    state: &str,
    detail: Option<&str>,
    at: &str,
) -> rusqlite::Result<()> {
    conn.execute(
        r#"
        INSERT INTO device_firmware_status (device_id, firmware_id, status, detail, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5)
        ON CONFLICT(device_id) DO UPDATE SET
            firmware_id = ?2,
            status = ?3,
            detail = ?4,
            updated_at = ?5
        "#,
        params![device_id, firmware_id, state, detail, at],
    )?;
    Ok(())
}

pub fn device_state(
    conn: &Connection,
    device_id: &str,
) -> rusqlite::Result<Option<(String, String)>> {
    conn.query_row(
        "SELECT firmware_id, status FROM device_firmware_status WHERE device_id = ?1",
        [device_id],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )
    .optional()
}

#[cfg(test)]
#[path = "firmware_tests.rs"]
mod tests;
