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

pub(crate) fn sample(employee_id: &str) -> EmployeeRecord {
    EmployeeRecord {
        employee_id: employee_id.to_owned(),
        company_id: "default".to_owned(),
        full_name: "Alex Doe".to_owned(),
        department: Some("Warehouse".to_owned()),
        active: true,
        enrolled_at: "2025-01-01T00:00:00Z".to_owned(),
        updated_at: None,
    }
}

#[test]
fn enroll_then_lookup() {
    let conn = test_conn();
    enroll(&conn, &sample("emp_1")).unwrap();

    let rec = get(&conn, "default", "emp_1").unwrap().unwrap();
    assert_eq!(rec.full_name, "Alex Doe");
    assert!(rec.active);
    assert!(is_known_active(&conn, "default", "emp_1").unwrap());
}

#[test]
fn lookup_is_tenant_scoped() {
    let conn = test_conn();
    enroll(&conn, &sample("emp_1")).unwrap();
    assert!(get(&conn, "other", "emp_1").unwrap().is_none());
    assert!(!is_known_active(&conn, "other", "emp_1").unwrap());
}

#[test]
fn update_patches_only_provided_fields() {
    let conn = test_conn();
    enroll(&conn, &sample("emp_1")).unwrap();

    assert!(update(&conn, "default", "emp_1", None, Some("Dispatch"), "2025-02-01T00:00:00Z")
        .unwrap());
    let rec = get(&conn, "default", "emp_1").unwrap().unwrap();
    assert_eq!(rec.full_name, "Alex Doe");
    assert_eq!(rec.department.as_deref(), Some("Dispatch"));

    assert!(!update(&conn, "default", "ghost", Some("X"), None, "2025-02-01T00:00:00Z").unwrap());
}

#[test]
fn deactivate_is_soft_and_idempotent() {
    let conn = test_conn();
    enroll(&conn, &sample("emp_1")).unwrap();

    assert!(deactivate(&conn, "default", "emp_1", "2025-02-01T00:00:00Z").unwrap());
    assert!(!deactivate(&conn, "default", "emp_1", "2025-02-01T00:00:00Z").unwrap());

    // The row survives for historical events; it is just inactive.
    let rec = get(&conn, "default", "emp_1").unwrap().unwrap();
    assert!(!rec.active);
    assert!(!is_known_active(&conn, "default", "emp_1").unwrap());
}

#[test]
fn re_enrollment_reactivates() {
    let conn = test_conn();
    enroll(&conn, &sample("emp_1")).unwrap();
    deactivate(&conn, "default", "emp_1", "2025-02-01T00:00:00Z").unwrap();

    enroll(&conn, &sample("emp_1")).unwrap();
    assert!(is_known_active(&conn, "default", "emp_1").unwrap());
}
