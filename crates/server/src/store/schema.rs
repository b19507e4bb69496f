// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use rusqlite::Connection;

/// Schema version, bumped on any table definition change.
pub const SCHEMA_VERSION: i32 = 1;

/// Idempotent schema creation. Everything is `IF NOT EXISTS`; the database
/// is the system of record, so nothing is ever dropped here.
pub fn init(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS devices (
            device_id        TEXT PRIMARY KEY,
            company_id       TEXT NOT NULL,
            device_type      TEXT NOT NULL,
            public_key_pem   TEXT NOT NULL,
            capabilities     TEXT NOT NULL DEFAULT '',
            firmware_version TEXT,
            status           TEXT NOT NULL DEFAULT 'active',
            policy_id        TEXT,
            battery_pct      INTEGER,
            queue_depth      INTEGER,
            storage_free_mb  INTEGER,
            app_version      TEXT,
            registered_at    TEXT NOT NULL,
            last_seen_at     TEXT
        );

        CREATE TABLE IF NOT EXISTS employees (
            employee_id  TEXT PRIMARY KEY,
            company_id   TEXT NOT NULL,
            full_name    TEXT NOT NULL,
            department   TEXT,
            active       INTEGER NOT NULL DEFAULT 1,
            enrolled_at  TEXT NOT NULL,
            updated_at   TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_employees_company ON employees(company_id);

        CREATE TABLE IF NOT EXISTS attendance_events (
            event_id            TEXT PRIMARY KEY,
            company_id          TEXT NOT NULL,
            employee_id         TEXT NOT NULL,
            event_type          TEXT NOT NULL,
            ts                  TEXT NOT NULL,
            device_id           TEXT NOT NULL,
            lat                 REAL,
            lng                 REAL,
            accuracy            REAL,
            face_score          REAL,
            fingerprint_score   REAL,
            liveness_score      REAL,
            quality_score       REAL,
            break_type          TEXT,
            break_duration_mins INTEGER,
            over_break          INTEGER,
            consent_token       TEXT,
            device_signature    TEXT,
            raw_toon            TEXT NOT NULL,
            status              TEXT NOT NULL,
            reject_reason       TEXT,
            received_at         TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_events_employee_ts
            ON attendance_events(employee_id, ts);
        CREATE INDEX IF NOT EXISTS idx_events_device_received
            ON attendance_events(device_id, received_at);

        CREATE TABLE IF NOT EXISTS device_nonces (
            device_id  TEXT NOT NULL,
            nonce_hash TEXT NOT NULL,
            used_at    TEXT NOT NULL,
            expires_at TEXT NOT NULL,
            PRIMARY KEY (nonce_hash, device_id)
        );
        CREATE INDEX IF NOT EXISTS idx_nonces_expiry ON device_nonces(expires_at);

        CREATE TABLE IF NOT EXISTS device_commands (
            command_id        TEXT PRIMARY KEY,
            company_id        TEXT NOT NULL,
            device_id         TEXT NOT NULL,
            name              TEXT NOT NULL,
            payload           TEXT NOT NULL,
            priority          INTEGER NOT NULL DEFAULT 0,
            issued_at         TEXT NOT NULL,
            expires_at        TEXT NOT NULL,
            server_signature  TEXT NOT NULL,
            status            TEXT NOT NULL DEFAULT 'pending',
            completed_at      TEXT,
            ack_status        TEXT,
            ack_message       TEXT,
            execution_time_ms INTEGER,
            raw_ack           TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_commands_device_status
            ON device_commands(device_id, status);

        CREATE TABLE IF NOT EXISTS firmware_releases (
            firmware_id         TEXT PRIMARY KEY,
            version             TEXT NOT NULL,
            device_type         TEXT NOT NULL,
            bundle_url_template TEXT NOT NULL,
            checksum            TEXT NOT NULL,
            size_bytes          INTEGER NOT NULL,
            policy_id           TEXT,
            server_signature    TEXT NOT NULL,
            created_at          TEXT NOT NULL,
            deprecated_at       TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_firmware_type
            ON firmware_releases(device_type, created_at);

        CREATE TABLE IF NOT EXISTS device_firmware_status (
            device_id   TEXT PRIMARY KEY,
            firmware_id TEXT NOT NULL,
            status      TEXT NOT NULL,
            detail      TEXT,
            updated_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS audit_log (
            id         INTEGER PRIMARY KEY AUTOINCREMENT,
            company_id TEXT,
            device_id  TEXT,
            endpoint   TEXT NOT NULL,
            inbound    TEXT NOT NULL,
            response   TEXT NOT NULL,
            status     TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_audit_device ON audit_log(device_id, created_at);

        CREATE TABLE IF NOT EXISTS rate_limits (
            device_id    TEXT NOT NULL,
            endpoint     TEXT NOT NULL,
            window_start INTEGER NOT NULL,
            count        INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (device_id, endpoint, window_start)
        );

        CREATE TABLE IF NOT EXISTS reports (
            report_id    TEXT PRIMARY KEY,
            company_id   TEXT NOT NULL,
            kind         TEXT NOT NULL,
            period_start TEXT NOT NULL,
            period_end   TEXT NOT NULL,
            format       TEXT NOT NULL,
            row_count    INTEGER,
            file_path    TEXT,
            status       TEXT NOT NULL,
            created_at   TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_reports_company ON reports(company_id, created_at);

        CREATE TABLE IF NOT EXISTS device_logs (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            device_id   TEXT NOT NULL,
            level       TEXT,
            message     TEXT NOT NULL,
            logged_at   TEXT,
            received_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_device_logs ON device_logs(device_id, received_at);
        "#,
    )?;

    conn.execute(&format!("PRAGMA user_version = {SCHEMA_VERSION}"), [])?;
    Ok(())
}
