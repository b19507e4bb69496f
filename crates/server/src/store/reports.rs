// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use rusqlite::{params, Connection, OptionalExtension, Row};

/// Metadata row for a generated report file.
#[derive(Debug, Clone)]
pub struct ReportRecord {
    pub report_id: String,
    pub company_id: String,
    pub kind: String,
    pub period_start: String,
    pub period_end: String,
    pub format: String,
    pub row_count: Option<i64>,
    pub file_path: Option<String>,
    pub status: String,
    pub created_at: String,
}

const ALL_COLUMNS: &str = "report_id, company_id, kind, period_start, period_end, format, \
     row_count, file_path, status, created_at";

fn from_row(row: &Row<'_>) -> rusqlite::Result<ReportRecord> {
    Ok(ReportRecord {
        report_id: row.get(0)?,
        company_id: row.get(1)?,
        kind: row.get(2)?,
        period_start: row.get(3)?,
        period_end: row.get(4)?,
        format: row.get(5)?,
        row_count: row.get(6)?,
        file_path: row.get(7)?,
        status: row.get(8)?,
        created_at: row.get(9)?,
    })
}

pub fn insert(conn: &Connection, rec: &ReportRecord) -> rusqlite::Result<()> {
    conn.execute(
        r#"
        INSERT INTO reports (report_id, company_id, kind, period_start, period_end,
                             format, row_count, file_path, status, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
        params![
            &rec.report_id,
            &rec.company_id,
            &rec.kind,
            &rec.period_start,
            &rec.period_end,
            &rec.format,
            rec.row_count,
            &rec.file_path,
            &rec.status,
            &rec.created_at,
        ],
    )?;
    Ok(())
}

pub fn get(
    conn: &Connection,
    company_id: &str,
    report_id: &str,
) -> rusqlite::Result<Option<ReportRecord>> {
    conn.query_row(
        &format!("SELECT {ALL_COLUMNS} FROM reports WHERE report_id = ?1 AND company_id = ?2"),
        params![report_id, company_id],
        |row| from_row(row),
    )
    .optional()
}

pub fn delete(conn: &Connection, company_id: &str, report_id: &str) -> rusqlite::Result<bool> {
    let n = conn.execute(
        "DELETE FROM reports WHERE report_id = ?1 AND company_id = ?2",
        params![report_id, company_id],
    )?;
    Ok(n == 1)
}
