// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use rusqlite::Connection;

use super::*;
use crate::store::schema;

fn test_conn() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    schema::init(&conn).unwrap();
    conn
}

pub(crate) fn sample(device_id: &str) -> DeviceRecord {
    DeviceRecord {
        device_id: device_id.to_owned(),
        company_id: "default".to_owned(),
        device_type: "KIOSK".to_owned(),
        public_key_pem: "-----BEGIN PUBLIC KEY-----\nAAAA\n-----END PUBLIC KEY-----\n".to_owned(),
        capabilities: "FACE;LIVENESS".to_owned(),
        firmware_version: Some("1.0.0".to_owned()),
        status: "active".to_owned(),
        policy_id: None,
        battery_pct: None,
        queue_depth: None,
        storage_free_mb: None,
        app_version: None,
        registered_at: "2025-01-01T00:00:00Z".to_owned(),
        last_seen_at: None,
    }
}

#[test]
fn register_then_get() {
    let conn = test_conn();
    upsert_registration(&conn, &sample("dev_1")).unwrap();

    let rec = get(&conn, "dev_1").unwrap().unwrap();
    assert_eq!(rec.device_type, "KIOSK");
    assert_eq!(rec.status, "active");
    assert_eq!(rec.last_seen_at.as_deref(), Some("2025-01-01T00:00:00Z"));
}

#[test]
fn re_registration_refreshes_but_keeps_identity() {
    let conn = test_conn();
    upsert_registration(&conn, &sample("dev_1")).unwrap();

    let mut updated = sample("dev_1");
    updated.device_type = "MOBILE".to_owned();
    updated.firmware_version = None;
    updated.registered_at = "2025-01-02T00:00:00Z".to_owned();
    upsert_registration(&conn, &updated).unwrap();

    let rec = get(&conn, "dev_1").unwrap().unwrap();
    assert_eq!(rec.device_type, "MOBILE");
    // COALESCE keeps the known firmware when re-registration omits it.
    assert_eq!(rec.firmware_version.as_deref(), Some("1.0.0"));
    assert_eq!(rec.last_seen_at.as_deref(), Some("2025-01-02T00:00:00Z"));
}

#[test]
fn revoke_is_terminal_and_idempotent() {
    let conn = test_conn();
    upsert_registration(&conn, &sample("dev_1")).unwrap();

    assert!(revoke(&conn, "dev_1", "default").unwrap());
    assert!(!revoke(&conn, "dev_1", "default").unwrap());
    assert!(get(&conn, "dev_1").unwrap().unwrap().is_revoked());
}

#[test]
fn revoke_respects_tenant_scope() {
    let conn = test_conn();
    upsert_registration(&conn, &sample("dev_1")).unwrap();

    assert!(!revoke(&conn, "dev_1", "other-company").unwrap());
    assert!(!get(&conn, "dev_1").unwrap().unwrap().is_revoked());
}

#[test]
fn heartbeat_telemetry_is_sticky() {
    let conn = test_conn();
    upsert_registration(&conn, &sample("dev_1")).unwrap();

    let telemetry = Telemetry {
        battery_pct: Some(88),
        queue_depth: Some(3),
        ..Telemetry::default()
    };
    record_heartbeat(&conn, "dev_1", "2025-01-03T00:00:00Z", &telemetry).unwrap();
    // A later heartbeat without battery keeps the previous reading.
    record_heartbeat(&conn, "dev_1", "2025-01-03T01:00:00Z", &Telemetry::default()).unwrap();

    let rec = get(&conn, "dev_1").unwrap().unwrap();
    assert_eq!(rec.battery_pct, Some(88));
    assert_eq!(rec.queue_depth, Some(3));
    assert_eq!(rec.last_seen_at.as_deref(), Some("2025-01-03T01:00:00Z"));
}

#[test]
fn missing_device_is_none() {
    let conn = test_conn();
    assert!(get(&conn, "ghost").unwrap().is_none());
}
