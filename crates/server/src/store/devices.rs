// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use rusqlite::{params, Connection, OptionalExtension, Row};

/// One row of the `devices` table.
#[derive(Debug, Clone)]
pub struct DeviceRecord {
    pub device_id: String,
    pub company_id: String,
    pub device_type: String,
    pub public_key_pem: String,
    pub capabilities: String,
    pub firmware_version: Option<String>,
    pub status: String,
    pub policy_id: Option<String>,
    pub battery_pct: Option<i64>,
    pub queue_depth: Option<i64>,
    pub storage_free_mb: Option<i64>,
    pub app_version: Option<String>,
    pub registered_at: String,
    pub last_seen_at: Option<String>,
}

impl DeviceRecord {
    pub fn is_revoked(&self) -> bool {
        self.status == "revoked"
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            device_id: row.get(0)?,
            company_id: row.get(1)?,
            device_type: row.get(2)?,
            public_key_pem: row.get(3)?,
            capabilities: row.get(4)?,
            firmware_version: row.get(5)?,
            status: row.get(6)?,
            policy_id: row.get(7)?,
            battery_pct: row.get(8)?,
            queue_depth: row.get(9)?,
            storage_free_mb: row.get(10)?,
            app_version: row.get(11)?,
            registered_at: row.get(12)?,
            last_seen_at: row.get(13)?,
        })
    }
}

const ALL_COLUMNS: &str = "device_id, company_id, device_type, public_key_pem, capabilities, \
     firmware_version, status, policy_id, battery_pct, queue_depth, storage_free_mb, \
     app_version, registered_at, last_seen_at";

/// First registration inserts; re-registration refreshes key, type,
/// capabilities, and last-seen. Revoked devices stay revoked.
pub fn upsert_registration(conn: &Connection, rec: &DeviceRecord) -> rusqlite::Result<()> {
    conn.execute(
        r#"
        INSERT INTO devices (device_id, company_id, device_type, public_key_pem,
                             capabilities, firmware_version, status, policy_id,
                             registered_at, last_seen_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'active', ?7, ?8, ?8)
        ON CONFLICT(device_id) DO UPDATE SET
            device_type = ?3,
            public_key_pem = ?4,
            capabilities = ?5,
            firmware_version = COALESCE(?6, firmware_version),
            policy_id = COALESCE(?7, policy_id),
            last_seen_at = ?8
        "#,
        params![
            &rec.device_id,
            &rec.company_id,
            &rec.device_type,
            &rec.public_key_pem,
            &rec.capabilities,
            &rec.firmware_version,
            &rec.policy_id,
            &rec.registered_at,
        ],
    )?;
    Ok(())
}

pub fn get(conn: &Connection, device_id: &str) -> rusqlite::Result<Option<DeviceRecord>> {
    conn.query_row(
        &format!("SELECT {ALL_COLUMNS} FROM devices WHERE device_id = ?1"),
        [device_id],
        |row| DeviceRecord::from_row(row),
    )
    .optional()
}

pub fn touch_last_seen(conn: &Connection, device_id: &str, at: &str) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE devices SET last_seen_at = ?2 WHERE device_id = ?1",
        params![device_id, at],
    )?;
    Ok(())
}

/// Persist heartbeat telemetry onto the device row.
#[derive(Debug, Clone, Default)]
pub struct Telemetry {
    pub battery_pct: Option<i64>,
    pub queue_depth: Option<i64>,
    pub storage_free_mb: Option<i64>,
    pub app_version: Option<String>,
    pub firmware_version: Option<String>,
}

pub fn record_heartbeat(
    conn: &Connection,
    device_id: &str,
    at: &str,
    telemetry: &Telemetry,
) -> rusqlite::Result<()> {
    conn.execute(
        r#"
        UPDATE devices SET
            last_seen_at = ?2,
            battery_pct = COALESCE(?3, battery_pct),
            queue_depth = COALESCE(?4, queue_depth),
            storage_free_mb = COALESCE(?5, storage_free_mb),
            app_version = COALESCE(?6, app_version),
            firmware_version = COALESCE(?7, firmware_version)
        WHERE device_id = ?1
        "#,
        params![
            device_id,
            at,
            telemetry.battery_pct,
            telemetry.queue_depth,
            telemetry.storage_free_mb,
            telemetry.app_version,
            telemetry.firmware_version,
        ],
    )?;
    Ok(())
}

/// Flip a device to revoked; returns false when it was already revoked or
/// does not exist.
pub fn revoke(conn: &Connection, device_id: &str, company_id: &str) -> rusqlite::Result<bool> {
    let n = conn.execute(
        "UPDATE devices SET status = 'revoked' \
         WHERE device_id = ?1 AND company_id = ?2 AND status != 'revoked'",
        params![device_id, company_id],
    )?;
    Ok(n == 1)
}

pub fn set_firmware_version(
    conn: &Connection,
    device_id: &str,
    version: &str,
) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE devices SET firmware_version = ?2 WHERE device_id = ?1",
        params![device_id, version],
    )?;
    Ok(())
}

pub fn list_for_company(
    conn: &Connection,
    company_id: &str,
) -> rusqlite::Result<Vec<DeviceRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ALL_COLUMNS} FROM devices WHERE company_id = ?1 ORDER BY device_id"
    ))?;
    let rows = stmt.query_map([company_id], |row| DeviceRecord::from_row(row))?;
    rows.collect()
}

#[cfg(test)]
#[path = "devices_tests.rs"]
mod tests;
