// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use rusqlite::{params, Connection, OptionalExtension, Row};

/// One row of `employees`.
#[derive(Debug, Clone)]
pub struct EmployeeRecord {
    pub employee_id: String,
    pub company_id: String,
    pub full_name: String,
    pub department: Option<String>,
    pub active: bool,
    pub enrolled_at: String,
    pub updated_at: Option<String>,
}

const ALL_COLUMNS: &str =
    "employee_id, company_id, full_name, department, active, enrolled_at, updated_at";

fn from_row(row: &Row<'_>) -> rusqlite::Result<EmployeeRecord> {
    Ok(EmployeeRecord {
        employee_id: row.get(0)?,
        company_id: row.get(1)?,
        full_name: row.get(2)?,
        department: row.get(3)?,
        active: row.get(4)?,
        enrolled_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

pub fn enroll(conn: &Connection, rec: &EmployeeRecord) -> rusqlite::Result<()> {
    conn.execute(
        r#"
        INSERT INTO employees (employee_id, company_id, full_name, department, active, enrolled_at)
        VALUES (?1, ?2, ?3, ?4, 1, ?5)
        ON CONFLICT(employee_id) DO UPDATE SET
            full_name = ?3,
            department = ?4,
            active = 1,
            updated_at = ?5
        "#,
        params![
            &rec.employee_id,
            &rec.company_id,
            &rec.full_name,
            &rec.department,
            &rec.enrolled_at,
        ],
    )?;
    Ok(())
}

pub fn get(
    conn: &Connection,
    company_id: &str,
    employee_id: &str,
) -> rusqlite::Result<Option<EmployeeRecord>> {
    conn.query_row(
        &format!("SELECT {ALL_COLUMNS} FROM employees WHERE employee_id = ?1 AND company_id = ?2"),
        params![employee_id, company_id],
        |row| from_row(row),
    )
    .optional()
}

/// Update name/department; returns false for an unknown employee.
pub fn update(
    conn: &Connection,
    company_id: &str,
    employee_id: &str,
    full_name: Option<&str>,
    department: Option<&str>,
    at: &str,
) -> rusqlite::Result<bool> {
    let n = conn.execute(
        r#"
        UPDATE employees SET
            full_name = COALESCE(?3, full_name),
            department = COALESCE(?4, department),
            updated_at = ?5
        WHERE employee_id = ?1 AND company_id = ?2
        "#,
        params![employee_id, company_id, full_name, department, at],
    )?;
    Ok(n == 1)
}

/// Soft delete: events keep referring to the id, so rows are deactivated
/// rather than removed.
pub fn deactivate(
    conn: &Connection,
    company_id: &str,
    employee_id: &str,
    at: &str,
) -> rusqlite::Result<bool> {
    let n = conn.execute(
        "UPDATE employees SET active = 0, updated_at = ?3 \
         WHERE employee_id = ?1 AND company_id = ?2 AND active = 1",
        params![employee_id, company_id, at],
    )?;
    Ok(n == 1)
}

pub fn list_for_company(
    conn: &Connection,
    company_id: &str,
) -> rusqlite::Result<Vec<EmployeeRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ALL_COLUMNS} FROM employees WHERE company_id = ?1 ORDER BY employee_id"
    ))?;
    let rows = stmt.query_map([company_id], |row| from_row(row))?;
    rows.collect()
}

/// Active employees only — the set ingestion validates against.
pub fn is_known_active(
    conn: &Connection,
    company_id: &str,
    employee_id: &str,
) -> rusqlite::Result<bool> {
    let n: i64 = conn.query_row(
        "SELECT COUNT(*) FROM employees \
         WHERE employee_id = ?1 AND company_id = ?2 AND active = 1",
        params![employee_id, company_id],
        |row| row.get(0),
    )?;
    Ok(n > 0)
}

#[cfg(test)]
#[path = "employees_tests.rs"]
mod tests;
