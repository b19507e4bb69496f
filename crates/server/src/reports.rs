// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Attendance report files and summary rollups.
//!
//! Reports are rendered to CSV on disk under the configured report
//! directory; the database keeps the metadata row that the download and
//! delete endpoints check against.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde_json::{json, Value};
use toon_wire::Payload;

use crate::error::ErrorKind;
use crate::hooks::HookEvent;
use crate::state::Deps;
use crate::store::events::{self, EventRecord};
use crate::store::reports::{self, ReportRecord};

#[derive(Debug, serde::Serialize)]
struct CsvRow<'a> {
    event_id: &'a str,
    employee_id: &'a str,
    event_type: &'a str,
    timestamp: &'a str,
    device_id: &'a str,
    status: &'a str,
}

/// Generate an attendance CSV for the period and persist its metadata.
pub async fn generate_attendance(
    deps: &Deps,
    company_id: &str,
    period_start: &str,
    period_end: &str,
) -> Result<ReportRecord, ErrorKind> {
    let (company, from, to) = (company_id.to_owned(), period_start.to_owned(), period_end.to_owned());
    let rows = deps
        .db
        .call(move |conn| events::for_company_range(conn, &company, &from, &to))
        .await?;

    let report_id = uuid::Uuid::new_v4().to_string();
    let file_path = deps.config.report_dir.join(format!("{report_id}.csv"));
    let row_count = rows.len() as i64;

    write_csv(file_path.clone(), rows).await?;

    let record = ReportRecord {
        report_id: report_id.clone(),
        company_id: company_id.to_owned(),
        kind: "attendance".to_owned(),
        period_start: period_start.to_owned(),
        period_end: period_end.to_owned(),
        format: "csv".to_owned(),
        row_count: Some(row_count),
        file_path: Some(file_path.to_string_lossy().into_owned()),
        status: "ready".to_owned(),
        created_at: deps.now_wire(),
    };
    let stored = record.clone();
    deps.db.call(move |conn| reports::insert(conn, &stored)).await?;

    deps.hooks
        .emit(HookEvent::ReportGenerated {
            report_id,
            company_id: company_id.to_owned(),
        })
        .await;
    tracing::info!(report = %record.report_id, rows = row_count, "attendance report generated");
    Ok(record)
}

async fn write_csv(path: PathBuf, rows: Vec<EventRecord>) -> Result<(), ErrorKind> {
    let result = tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut writer = csv::Writer::from_path(&path)?;
        for row in &rows {
            writer.serialize(CsvRow {
                event_id: &row.event_id,
                employee_id: &row.employee_id,
                event_type: &row.event_type,
                timestamp: &row.ts,
                device_id: &row.device_id,
                status: &row.status,
            })?;
        }
        writer.flush()?;
        Ok(())
    })
    .await;

    match result {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => {
            tracing::error!(err = %err, "report file write failed");
            Err(ErrorKind::Internal("report write failed".to_owned()))
        }
        Err(join_err) => {
            tracing::error!(err = %join_err, "report writer task failed");
            Err(ErrorKind::Internal("report write failed".to_owned()))
        }
    }
}

/// Per-employee presence rollup, rendered for the typed dialect.
pub async fn summary_payload(
    deps: &Deps,
    company_id: &str,
    period_start: &str,
    period_end: &str,
) -> Result<Payload, ErrorKind> {
    let (company, from, to) = (company_id.to_owned(), period_start.to_owned(), period_end.to_owned());
    let rows = deps
        .db
        .call(move |conn| events::for_company_range(conn, &company, &from, &to))
        .await?;

    let mut per_employee: BTreeMap<String, EmployeeRollup> = BTreeMap::new();
    for row in &rows {
        let rollup = per_employee.entry(row.employee_id.clone()).or_default();
        rollup.events += 1;
        match row.event_type.as_str() {
            "IN" if rollup.first_in.is_none() => rollup.first_in = Some(row.ts.clone()),
            "OUT" => rollup.last_out = Some(row.ts.clone()),
            _ => {}
        }
    }

    let employees: Vec<Value> = per_employee
        .into_iter()
        .map(|(employee_id, rollup)| {
            json!({
                "E1": employee_id,
                "events": rollup.events,
                "first_in": rollup.first_in,
                "last_out": rollup.last_out,
            })
        })
        .collect();

    Ok(toon_wire::payload([
        ("S1", json!("ok")),
        ("RANGE1", json!(period_start)),
        ("RANGE2", json!(period_end)),
        ("EMP_COUNT", json!(employees.len())),
        ("EMP", Value::Array(employees)),
        ("TS", json!(deps.now_wire())),
    ]))
}

#[derive(Debug, Default)]
struct EmployeeRollup {
    events: i64,
    first_in: Option<String>,
    last_out: Option<String>,
}

/// Load a ready report's metadata and file bytes.
pub async fn load(
    deps: &Deps,
    company_id: &str,
    report_id: &str,
) -> Result<(ReportRecord, Vec<u8>), ErrorKind> {
    let (company, id) = (company_id.to_owned(), report_id.to_owned());
    let record = deps
        .db
        .call(move |conn| reports::get(conn, &company, &id))
        .await?
        .ok_or(ErrorKind::ReportNotFound)?;

    if record.status != "ready" {
        return Err(ErrorKind::ReportNotReady);
    }
    let Some(path) = record.file_path.clone() else {
        return Err(ErrorKind::ReportNotReady);
    };
    match tokio::fs::read(&path).await {
        Ok(bytes) => Ok((record, bytes)),
        Err(err) => {
            tracing::error!(err = %err, report = %record.report_id, "report file unreadable");
            Err(ErrorKind::Internal("report file unreadable".to_owned()))
        }
    }
}

/// Delete the metadata row and (best-effort) the file behind it.
pub async fn delete(deps: &Deps, company_id: &str, report_id: &str) -> Result<(), ErrorKind> {
    let (company, id) = (company_id.to_owned(), report_id.to_owned());
    let record = deps
        .db
        .call(move |conn| reports::get(conn, &company, &id))
        .await?
        .ok_or(ErrorKind::ReportNotFound)?;

    let (company, id) = (company_id.to_owned(), report_id.to_owned());
    deps.db.call(move |conn| reports::delete(conn, &company, &id)).await?;

    if let Some(path) = record.file_path {
        if let Err(err) = tokio::fs::remove_file(&path).await {
            tracing::warn!(err = %err, report = %report_id, "report file already gone");
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "reports_tests.rs"]
mod tests;
