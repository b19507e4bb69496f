// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operator-facing handlers. Everything here speaks the typed dialect and
//! runs behind the bearer-token layer; reads and writes are scoped to the
//! token's company.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::Response;
use bytes::Bytes;
use serde_json::{json, Value};
use toon_wire::Payload;

use crate::attest::token_str;
use crate::command::{self, IssueRequest};
use crate::error::ErrorKind;
use crate::firmware::{self, PublishRequest};
use crate::hooks::HookEvent;
use crate::reports;
use crate::state::Deps;
use crate::store::commands as commands_store;
use crate::store::devices::{self, DeviceRecord};
use crate::store::employees::{self, EmployeeRecord};
use crate::store::firmware as firmware_store;
use crate::transport::body::{self, typed_error, typed_ok};
use crate::types::DeviceType;

/// Decode an operator request body (typed dialect).
fn read_typed(headers: &HeaderMap, raw: &Bytes) -> Result<Payload, ErrorKind> {
    let text = body::read_toon_body(headers, raw)?;
    if text.trim().is_empty() {
        return Err(ErrorKind::EmptyPayload);
    }
    Ok(toon_wire::decode(&text)?)
}

fn require(tokens: &Payload, keys: &[&str]) -> Result<(), ErrorKind> {
    let missing: Vec<String> = keys
        .iter()
        .filter(|key| !tokens.contains_key(**key))
        .map(|key| (*key).to_owned())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ErrorKind::MissingTokens(missing))
    }
}

// -- Employees ----------------------------------------------------------------

/// `GET /employees/list`
pub async fn employees_list(State(deps): State<Arc<Deps>>) -> Response {
    let company = deps.config.company_id.clone();
    match deps.db.call(move |conn| employees::list_for_company(conn, &company)).await {
        Ok(list) => {
            let rows: Vec<Value> = list
                .iter()
                .map(|e| {
                    json!({
                        "E1": e.employee_id,
                        "name": e.full_name,
                        "department": e.department,
                        "active": e.active,
                    })
                })
                .collect();
            typed_ok(&toon_wire::payload([
                ("S1", json!("ok")),
                ("EMP_COUNT", json!(rows.len())),
                ("EMP", Value::Array(rows)),
                ("TS", json!(deps.now_wire())),
            ]))
        }
        Err(kind) => typed_error(&kind, &deps.now_wire()),
    }
}

/// `POST /employees/enroll`
pub async fn employees_enroll(
    State(deps): State<Arc<Deps>>,
    headers: HeaderMap,
    raw: Bytes,
) -> Response {
    let tokens = match read_typed(&headers, &raw) {
        Ok(tokens) => tokens,
        Err(kind) => return typed_error(&kind, &deps.now_wire()),
    };
    if let Err(kind) = require(&tokens, &["E1", "NAME"]) {
        return typed_error(&kind, &deps.now_wire());
    }

    let record = EmployeeRecord {
        employee_id: token_str(&tokens, "E1").unwrap_or_default(),
        company_id: deps.config.company_id.clone(),
        full_name: token_str(&tokens, "NAME").unwrap_or_default(),
        department: token_str(&tokens, "DEPT"),
        active: true,
        enrolled_at: deps.now_wire(),
        updated_at: None,
    };
    let employee_id = record.employee_id.clone();
    match deps.db.call(move |conn| employees::enroll(conn, &record)).await {
        Ok(()) => {
            tracing::info!(employee = %employee_id, "employee enrolled");
            typed_ok(&toon_wire::payload([
                ("S1", json!("ok")),
                ("E1", json!(employee_id)),
                ("TS", json!(deps.now_wire())),
            ]))
        }
        Err(kind) => typed_error(&kind, &deps.now_wire()),
    }
}

/// `POST /employees/update`
pub async fn employees_update(
    State(deps): State<Arc<Deps>>,
    headers: HeaderMap,
    raw: Bytes,
) -> Response {
    let tokens = match read_typed(&headers, &raw) {
        Ok(tokens) => tokens,
        Err(kind) => return typed_error(&kind, &deps.now_wire()),
    };
    if let Err(kind) = require(&tokens, &["E1"]) {
        return typed_error(&kind, &deps.now_wire());
    }

    let employee_id = token_str(&tokens, "E1").unwrap_or_default();
    let (company, id, name, dept, now) = (
        deps.config.company_id.clone(),
        employee_id.clone(),
        token_str(&tokens, "NAME"),
        token_str(&tokens, "DEPT"),
        deps.now_wire(),
    );
    let updated = deps
        .db
        .call(move |conn| {
            employees::update(conn, &company, &id, name.as_deref(), dept.as_deref(), &now)
        })
        .await;

    match updated {
        Ok(true) => typed_ok(&toon_wire::payload([
            ("S1", json!("ok")),
            ("E1", json!(employee_id)),
            ("TS", json!(deps.now_wire())),
        ])),
        Ok(false) => typed_error(&ErrorKind::UnknownEmployee(employee_id), &deps.now_wire()),
        Err(kind) => typed_error(&kind, &deps.now_wire()),
    }
}

/// `POST /employees/delete` — soft delete.
pub async fn employees_delete(
    State(deps): State<Arc<Deps>>,
    headers: HeaderMap,
    raw: Bytes,
) -> Response {
    let tokens = match read_typed(&headers, &raw) {
        Ok(tokens) => tokens,
        Err(kind) => return typed_error(&kind, &deps.now_wire()),
    };
    if let Err(kind) = require(&tokens, &["E1"]) {
        return typed_error(&kind, &deps.now_wire());
    }

    let employee_id = token_str(&tokens, "E1").unwrap_or_default();
    let (company, id, now) =
        (deps.config.company_id.clone(), employee_id.clone(), deps.now_wire());
    match deps.db.call(move |conn| employees::deactivate(conn, &company, &id, &now)).await {
        Ok(true) => typed_ok(&toon_wire::payload([
            ("S1", json!("ok")),
            ("E1", json!(employee_id)),
            ("TS", json!(deps.now_wire())),
        ])),
        Ok(false) => typed_error(&ErrorKind::UnknownEmployee(employee_id), &deps.now_wire()),
        Err(kind) => typed_error(&kind, &deps.now_wire()),
    }
}

// -- Reports ------------------------------------------------------------------

/// `POST /reports/attendance` — returns the CSV with a TOON header.
pub async fn reports_attendance(
    State(deps): State<Arc<Deps>>,
    headers: HeaderMap,
    raw: Bytes,
) -> Response {
    let tokens = match read_typed(&headers, &raw) {
        Ok(tokens) => tokens,
        Err(kind) => return typed_error(&kind, &deps.now_wire()),
    };
    if let Err(kind) = require(&tokens, &["RANGE1", "RANGE2"]) {
        return typed_error(&kind, &deps.now_wire());
    }

    let from = token_str(&tokens, "RANGE1").unwrap_or_default();
    let to = token_str(&tokens, "RANGE2").unwrap_or_default();
    let record = match reports::generate_attendance(&deps, &deps.config.company_id, &from, &to)
        .await
    {
        Ok(record) => record,
        Err(kind) => return typed_error(&kind, &deps.now_wire()),
    };
    let (record, bytes) = match reports::load(&deps, &deps.config.company_id, &record.report_id)
        .await
    {
        Ok(loaded) => loaded,
        Err(kind) => return typed_error(&kind, &deps.now_wire()),
    };

    let summary = toon_wire::payload([
        ("S1", json!("ok")),
        ("REP1", json!(record.report_id)),
        ("ROWS", json!(record.row_count)),
        ("TS", json!(deps.now_wire())),
    ]);
    body::binary_with_toon("text/csv", &summary, bytes)
}

/// `POST /reports/summary`
pub async fn reports_summary(
    State(deps): State<Arc<Deps>>,
    headers: HeaderMap,
    raw: Bytes,
) -> Response {
    let tokens = match read_typed(&headers, &raw) {
        Ok(tokens) => tokens,
        Err(kind) => return typed_error(&kind, &deps.now_wire()),
    };
    if let Err(kind) = require(&tokens, &["RANGE1", "RANGE2"]) {
        return typed_error(&kind, &deps.now_wire());
    }

    let from = token_str(&tokens, "RANGE1").unwrap_or_default();
    let to = token_str(&tokens, "RANGE2").unwrap_or_default();
    match reports::summary_payload(&deps, &deps.config.company_id, &from, &to).await {
        Ok(payload) => typed_ok(&payload),
        Err(kind) => typed_error(&kind, &deps.now_wire()),
    }
}

/// `GET /reports/{id}/download`
pub async fn reports_download(
    State(deps): State<Arc<Deps>>,
    Path(report_id): Path<String>,
) -> Response {
    match reports::load(&deps, &deps.config.company_id, &report_id).await {
        Ok((record, bytes)) => {
            let summary = toon_wire::payload([
                ("S1", json!("ok")),
                ("REP1", json!(record.report_id)),
                ("ROWS", json!(record.row_count)),
                ("TS", json!(deps.now_wire())),
            ]);
            body::binary_with_toon("text/csv", &summary, bytes)
        }
        Err(kind) => typed_error(&kind, &deps.now_wire()),
    }
}

/// `DELETE /reports/{id}`
pub async fn reports_delete(
    State(deps): State<Arc<Deps>>,
    Path(report_id): Path<String>,
) -> Response {
    match reports::delete(&deps, &deps.config.company_id, &report_id).await {
        Ok(()) => typed_ok(&toon_wire::payload([
            ("S1", json!("ok")),
            ("REP1", json!(report_id)),
            ("TS", json!(deps.now_wire())),
        ])),
        Err(kind) => typed_error(&kind, &deps.now_wire()),
    }
}

// -- Devices ------------------------------------------------------------------

fn device_row(device: &DeviceRecord) -> Value {
    json!({
        "D1": device.device_id,
        "D2": device.device_type,
        "status": device.status,
        "firmware": device.firmware_version,
        "last_seen": device.last_seen_at,
    })
}

/// `GET /devices`
pub async fn devices_list(State(deps): State<Arc<Deps>>) -> Response {
    let company = deps.config.company_id.clone();
    match deps.db.call(move |conn| devices::list_for_company(conn, &company)).await {
        Ok(list) => {
            let rows: Vec<Value> = list.iter().map(device_row).collect();
            typed_ok(&toon_wire::payload([
                ("S1", json!("ok")),
                ("DEV_COUNT", json!(rows.len())),
                ("DEV", Value::Array(rows)),
                ("TS", json!(deps.now_wire())),
            ]))
        }
        Err(kind) => typed_error(&kind, &deps.now_wire()),
    }
}

/// `GET /devices/{id}`
pub async fn devices_detail(
    State(deps): State<Arc<Deps>>,
    Path(device_id): Path<String>,
) -> Response {
    let device = match fetch_company_device(&deps, &device_id).await {
        Ok(device) => device,
        Err(kind) => return typed_error(&kind, &deps.now_wire()),
    };

    typed_ok(&toon_wire::payload([
        ("S1", json!("ok")),
        ("D1", json!(device.device_id)),
        ("D2", json!(device.device_type)),
        ("D3", json!(device.capabilities)),
        ("status", json!(device.status)),
        ("policy", json!(device.policy_id)),
        ("firmware", json!(device.firmware_version)),
        ("battery", json!(device.battery_pct)),
        ("queue", json!(device.queue_depth)),
        ("storage", json!(device.storage_free_mb)),
        ("app", json!(device.app_version)),
        ("registered", json!(device.registered_at)),
        ("last_seen", json!(device.last_seen_at)),
        ("TS", json!(deps.now_wire())),
    ]))
}

async fn fetch_company_device(deps: &Deps, device_id: &str) -> Result<DeviceRecord, ErrorKind> {
    let id = device_id.to_owned();
    let device = deps
        .db
        .call(move |conn| devices::get(conn, &id))
        .await?
        .ok_or(ErrorKind::DeviceNotFound)?;
    if device.company_id != deps.config.company_id {
        return Err(ErrorKind::DeviceNotFound);
    }
    Ok(device)
}

/// `POST /devices/command` — issue a signed command.
pub async fn devices_command(
    State(deps): State<Arc<Deps>>,
    headers: HeaderMap,
    raw: Bytes,
) -> Response {
    let tokens = match read_typed(&headers, &raw) {
        Ok(tokens) => tokens,
        Err(kind) => return typed_error(&kind, &deps.now_wire()),
    };
    if let Err(kind) = require(&tokens, &["D1", "CMD2"]) {
        return typed_error(&kind, &deps.now_wire());
    }

    let device_id = token_str(&tokens, "D1").unwrap_or_default();
    let device = match fetch_company_device(&deps, &device_id).await {
        Ok(device) => device,
        Err(kind) => return typed_error(&kind, &deps.now_wire()),
    };
    if device.is_revoked() {
        return typed_error(&ErrorKind::DeviceRevoked, &deps.now_wire());
    }

    let request = IssueRequest {
        device_id,
        name: token_str(&tokens, "CMD2").unwrap_or_default(),
        payload: tokens.get("CMD3").cloned().unwrap_or(Value::Object(Default::default())),
        priority: tokens.get("CMD4").and_then(Value::as_i64).unwrap_or(0),
        ttl_secs: tokens.get("CMD5").and_then(Value::as_i64),
    };
    match command::issue(&deps, &deps.config.company_id, request).await {
        Ok(cmd) => typed_ok(&toon_wire::payload([
            ("S1", json!("ok")),
            ("CMD1", json!(cmd.command_id)),
            ("SIG_SERV", json!(cmd.server_signature)),
            ("CMD5", json!(cmd.expires_at)),
            ("TS", json!(deps.now_wire())),
        ])),
        Err(kind) => typed_error(&kind, &deps.now_wire()),
    }
}

/// Revoke one device and expire its queue, atomically.
async fn revoke_device(deps: &Deps, device_id: &str) -> Result<(bool, usize), ErrorKind> {
    let (company, id) = (deps.config.company_id.clone(), device_id.to_owned());
    let outcome = deps
        .db
        .call(move |conn| {
            let tx = conn.transaction()?;
            let revoked = devices::revoke(&tx, &id, &company)?;
            let expired = if revoked { commands_store::expire_for_device(&tx, &id)? } else { 0 };
            tx.commit()?;
            Ok((revoked, expired))
        })
        .await?;

    if outcome.0 {
        deps.hooks.emit(HookEvent::DeviceRevoked { device_id: device_id.to_owned() }).await;
        tracing::info!(device = %device_id, expired_commands = outcome.1, "device revoked");
    }
    Ok(outcome)
}

/// `POST /devices/revoke`
pub async fn devices_revoke(
    State(deps): State<Arc<Deps>>,
    headers: HeaderMap,
    raw: Bytes,
) -> Response {
    let tokens = match read_typed(&headers, &raw) {
        Ok(tokens) => tokens,
        Err(kind) => return typed_error(&kind, &deps.now_wire()),
    };
    if let Err(kind) = require(&tokens, &["D1"]) {
        return typed_error(&kind, &deps.now_wire());
    }

    let device_id = token_str(&tokens, "D1").unwrap_or_default();
    if let Err(kind) = fetch_company_device(&deps, &device_id).await {
        return typed_error(&kind, &deps.now_wire());
    }
    match revoke_device(&deps, &device_id).await {
        Ok((revoked, expired)) => typed_ok(&toon_wire::payload([
            ("S1", json!("ok")),
            ("D1", json!(device_id)),
            ("REVOKED", json!(revoked)),
            ("CMDS_EXPIRED", json!(expired)),
            ("TS", json!(deps.now_wire())),
        ])),
        Err(kind) => typed_error(&kind, &deps.now_wire()),
    }
}

/// `POST /devices/bulk-revoke`
pub async fn devices_bulk_revoke(
    State(deps): State<Arc<Deps>>,
    headers: HeaderMap,
    raw: Bytes,
) -> Response {
    let tokens = match read_typed(&headers, &raw) {
        Ok(tokens) => tokens,
        Err(kind) => return typed_error(&kind, &deps.now_wire()),
    };
    let Some(Value::Array(ids)) = tokens.get("IDS") else {
        return typed_error(
            &ErrorKind::MissingTokens(vec!["IDS".to_owned()]),
            &deps.now_wire(),
        );
    };

    let mut revoked = 0usize;
    let mut skipped = Vec::new();
    for id in ids.iter().filter_map(Value::as_str) {
        match fetch_company_device(&deps, id).await {
            Ok(_) => match revoke_device(&deps, id).await {
                Ok((true, _)) => revoked += 1,
                Ok((false, _)) => skipped.push(id.to_owned()),
                Err(kind) => return typed_error(&kind, &deps.now_wire()),
            },
            Err(_) => skipped.push(id.to_owned()),
        }
    }

    typed_ok(&toon_wire::payload([
        ("S1", json!("ok")),
        ("REVOKED", json!(revoked)),
        ("SKIPPED", json!(skipped)),
        ("TS", json!(deps.now_wire())),
    ]))
}

/// `GET /devices/export` — fleet CSV.
pub async fn devices_export(State(deps): State<Arc<Deps>>) -> Response {
    #[derive(serde::Serialize)]
    struct Row<'a> {
        device_id: &'a str,
        device_type: &'a str,
        status: &'a str,
        capabilities: &'a str,
        firmware_version: Option<&'a str>,
        registered_at: &'a str,
        last_seen_at: Option<&'a str>,
    }

    let company = deps.config.company_id.clone();
    let list = match deps.db.call(move |conn| devices::list_for_company(conn, &company)).await {
        Ok(list) => list,
        Err(kind) => return typed_error(&kind, &deps.now_wire()),
    };

    let mut writer = csv::Writer::from_writer(Vec::new());
    for device in &list {
        let row = Row {
            device_id: &device.device_id,
            device_type: &device.device_type,
            status: &device.status,
            capabilities: &device.capabilities,
            firmware_version: device.firmware_version.as_deref(),
            registered_at: &device.registered_at,
            last_seen_at: device.last_seen_at.as_deref(),
        };
        if let Err(err) = writer.serialize(row) {
            tracing::error!(err = %err, "device export row failed");
            return typed_error(
                &ErrorKind::Internal("export failed".to_owned()),
                &deps.now_wire(),
            );
        }
    }
    let bytes = match writer.into_inner() {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::error!(err = %err, "device export flush failed");
            return typed_error(
                &ErrorKind::Internal("export failed".to_owned()),
                &deps.now_wire(),
            );
        }
    };

    let summary = toon_wire::payload([
        ("S1", json!("ok")),
        ("DEV_COUNT", json!(list.len())),
        ("TS", json!(deps.now_wire())),
    ]);
    body::binary_with_toon("text/csv", &summary, bytes)
}

// -- Firmware -----------------------------------------------------------------

/// `POST /firmware/publish`
pub async fn firmware_publish(
    State(deps): State<Arc<Deps>>,
    headers: HeaderMap,
    raw: Bytes,
) -> Response {
    let tokens = match read_typed(&headers, &raw) {
        Ok(tokens) => tokens,
        Err(kind) => return typed_error(&kind, &deps.now_wire()),
    };
    if let Err(kind) = require(&tokens, &["FW2", "FW3", "FW4", "FW5", "FW6"]) {
        return typed_error(&kind, &deps.now_wire());
    }

    let device_type_raw = token_str(&tokens, "FW6").unwrap_or_default();
    if DeviceType::parse(&device_type_raw).is_none() {
        return typed_error(&ErrorKind::InvalidDeviceType(device_type_raw), &deps.now_wire());
    }

    let request = PublishRequest {
        version: token_str(&tokens, "FW2").unwrap_or_default(),
        checksum: token_str(&tokens, "FW3").unwrap_or_default(),
        size_bytes: tokens.get("FW4").and_then(Value::as_i64).unwrap_or(0),
        bundle_url_template: token_str(&tokens, "FW5").unwrap_or_default(),
        device_type: device_type_raw,
        policy_id: token_str(&tokens, "FW7"),
    };
    match firmware::publish(&deps, request).await {
        Ok(release) => typed_ok(&toon_wire::payload([
            ("S1", json!("ok")),
            ("FW1", json!(release.firmware_id)),
            ("FW_SIG", json!(release.server_signature)),
            ("TS", json!(deps.now_wire())),
        ])),
        Err(kind) => typed_error(&kind, &deps.now_wire()),
    }
}

/// `POST /firmware/deprecate`
pub async fn firmware_deprecate(
    State(deps): State<Arc<Deps>>,
    headers: HeaderMap,
    raw: Bytes,
) -> Response {
    let tokens = match read_typed(&headers, &raw) {
        Ok(tokens) => tokens,
        Err(kind) => return typed_error(&kind, &deps.now_wire()),
    };
    if let Err(kind) = require(&tokens, &["FW1"]) {
        return typed_error(&kind, &deps.now_wire());
    }

    let firmware_id = token_str(&tokens, "FW1").unwrap_or_default();
    let (id, now) = (firmware_id.clone(), deps.now_wire());
    match deps.db.call(move |conn| firmware_store::deprecate(conn, &id, &now)).await {
        Ok(true) => typed_ok(&toon_wire::payload([
            ("S1", json!("ok")),
            ("FW1", json!(firmware_id)),
            ("TS", json!(deps.now_wire())),
        ])),
        Ok(false) => typed_error(&ErrorKind::FirmwareNotFound, &deps.now_wire()),
        Err(kind) => typed_error(&kind, &deps.now_wire()),
    }
}
