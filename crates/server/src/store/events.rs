// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::store::is_unique_violation;

/// One row of `attendance_events`. Immutable once written.
#[derive(Debug, Clone)]
pub struct EventRecord {
    pub event_id: String,
    pub company_id: String,
    pub employee_id: String,
    pub event_type: String,
    pub ts: String,
    pub device_id: String,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub accuracy: Option<f64>,
    pub face_score: Option<f64>,
    pub fingerprint_score: Option<f64>,
    pub liveness_score: Option<f64>,
    pub quality_score: Option<f64>,
    pub break_type: Option<String>,
    pub break_duration_mins: Option<i64>,
    pub over_break: Option<bool>,
    pub consent_token: Option<String>,
    pub device_signature: Option<String>,
    pub raw_toon: String,
    pub status: String,
    pub reject_reason: Option<String>,
    pub received_at: String,
}

/// Outcome of an insert attempt against the global `event_id` constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    Duplicate,
}

/// Insert an event; a unique-constraint hit on `event_id` is the
/// *duplicate* outcome, not an error, and leaves the original row intact.
pub fn insert(conn: &Connection, rec: &EventRecord) -> rusqlite::Result<InsertOutcome> {
    let result = conn.execute(
        r#"
        INSERT INTO attendance_events (
            event_id, company_id, employee_id, event_type, ts, device_id,
            lat, lng, accuracy,
            face_score, fingerprint_score, liveness_score, quality_score,
            break_type, break_duration_mins, over_break, consent_token,
            device_signature, raw_toon, status, reject_reason, received_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13,
                  ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22)
        "#,
        params![
            &rec.event_id,
            &rec.company_id,
            &rec.employee_id,
            &rec.event_type,
            &rec.ts,
            &rec.device_id,
            rec.lat,
            rec.lng,
            rec.accuracy,
            rec.face_score,
            rec.fingerprint_score,
            rec.liveness_score,
            rec.quality_score,
            &rec.break_type,
            rec.break_duration_mins,
            rec.over_break,
            &rec.consent_token,
            &rec.device_signature,
            &rec.raw_toon,
            &rec.status,
            &rec.reject_reason,
            &rec.received_at,
        ],
    );
    match result {
        Ok(_) => Ok(InsertOutcome::Inserted),
        Err(err) if is_unique_violation(&err) => Ok(InsertOutcome::Duplicate),
        Err(err) => Err(err),
    }
}

pub fn exists(conn: &Connection, event_id: &str) -> rusqlite::Result<bool> {
    let n: i64 = conn.query_row(
        "SELECT COUNT(*) FROM attendance_events WHERE event_id = ?1",
        [event_id],
        |row| row.get(0),
    )?;
    Ok(n > 0)
}

pub fn get(conn: &Connection, event_id: &str) -> rusqlite::Result<Option<EventRecord>> {
    conn.query_row(
        &format!("SELECT {ALL_COLUMNS} FROM attendance_events WHERE event_id = ?1"),
        [event_id],
        |row| from_row(row),
    )
    .optional()
}

/// All of a company's events in a range, ordered by employee then time —
/// the shape report generation walks.
pub fn for_company_range(
    conn: &Connection,
    company_id: &str,
    from: &str,
    to: &str,
) -> rusqlite::Result<Vec<EventRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ALL_COLUMNS} FROM attendance_events \
         WHERE company_id = ?1 AND ts >= ?2 AND ts <= ?3 \
         ORDER BY employee_id, ts"
    ))?;
    let rows = stmt.query_map(params![company_id, from, to], |row| from_row(row))?;
    rows.collect()
}

const ALL_COLUMNS: &str = "event_id, company_id, employee_id, event_type, ts, device_id, \
     lat, lng, accuracy, face_score, fingerprint_score, liveness_score, quality_score, \
     break_type, break_duration_mins, over_break, consent_token, device_signature, \
     raw_toon, status, reject_reason, received_at";

fn from_row(row: &Row<'_>) -> rusqlite::Result<EventRecord> {
    Ok(EventRecord {
        event_id: row.get(0)?,
        company_id: row.get(1)?,
        employee_id: row.get(2)?,
        event_type: row.get(3)?,
        ts: row.get(4)?,
        device_id: row.get(5)?,
        lat: row.get(6)?,
        lng: row.get(7)?,
        accuracy: row.get(8)?,
        face_score: row.get(9)?,
        fingerprint_score: row.get(10)?,
        liveness_score: row.get(11)?,
        quality_score: row.get(12)?,
        break_type: row.get(13)?,
        break_duration_mins: row.get(14)?,
        over_break: row.get(15)?,
        consent_token: row.get(16)?,
        device_signature: row.get(17)?,
        raw_toon: row.get(18)?,
        status: row.get(19)?,
        reject_reason: row.get(20)?,
        received_at: row.get(21)?,
    })
}

#[cfg(test)]
#[path = "events_tests.rs"]
mod tests;
