// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-device command queue: operator issue, device poll, verified ack,
//! and the expiry scan.
//!
//! Every command is signed by the server over the canonical form of its
//! fields; devices verify `SIG_SERV` before executing anything.

use serde_json::{json, Value};
use toon_wire::{canonical, legacy};

use crate::error::ErrorKind;
use crate::hooks::HookEvent;
use crate::state::Deps;
use crate::store::commands::{self, Ack, AckOutcome, CommandRecord};
use crate::store::devices::DeviceRecord;

/// Commands expire a day after issue unless the operator says otherwise.
const DEFAULT_TTL_SECS: i64 = 86_400;

/// Operator-supplied fields for a new command.
#[derive(Debug, Clone)]
pub struct IssueRequest {
    pub device_id: String,
    pub name: String,
    pub payload: Value,
    pub priority: i64,
    pub ttl_secs: Option<i64>,
}

/// Canonical form of the signed command fields, `SIG_SERV` excluded.
pub fn command_canonical(cmd: &CommandRecord) -> String {
    let payload_value: Value =
        serde_json::from_str(&cmd.payload).unwrap_or(Value::String(cmd.payload.clone()));
    let tokens = toon_wire::payload([
        ("CMD1", json!(cmd.command_id)),
        ("CMD2", json!(cmd.name)),
        ("CMD3", payload_value),
        ("CMD4", json!(cmd.priority)),
        ("CMD5", json!(cmd.expires_at)),
        ("D1", json!(cmd.device_id)),
    ]);
    canonical::canonical_string(&tokens)
}

/// Create a pending command: compute `SIG_SERV`, store, and announce.
pub async fn issue(
    deps: &Deps,
    company_id: &str,
    req: IssueRequest,
) -> Result<CommandRecord, ErrorKind> {
    let now = deps.clock.now();
    let ttl = req.ttl_secs.unwrap_or(DEFAULT_TTL_SECS);
    let mut record = CommandRecord {
        command_id: uuid::Uuid::new_v4().to_string(),
        company_id: company_id.to_owned(),
        device_id: req.device_id,
        name: req.name,
        payload: req.payload.to_string(),
        priority: req.priority,
        issued_at: crate::clock::to_wire(now),
        expires_at: crate::clock::to_wire(now + chrono::Duration::seconds(ttl)),
        server_signature: String::new(),
        status: "pending".to_owned(),
        completed_at: None,
        ack_status: None,
        ack_message: None,
        execution_time_ms: None,
        raw_ack: None,
    };
    record.server_signature = deps.signer.sign_b64(&command_canonical(&record));

    let stored = record.clone();
    deps.db.call(move |conn| commands::insert(conn, &stored)).await?;

    deps.hooks
        .emit(HookEvent::DeviceCommand {
            command_id: record.command_id.clone(),
            device_id: record.device_id.clone(),
        })
        .await;

    tracing::info!(
        command = %record.command_id,
        device = %record.device_id,
        name = %record.name,
        "command issued"
    );
    Ok(record)
}

/// Render the poll response for a device's pending queue.
///
/// Commands come out as `CMD[i].*` path tokens so existing legacy parsers
/// can rebuild the list; an empty queue is `S1:no_commands`.
pub async fn poll_body(deps: &Deps, device: &DeviceRecord) -> Result<String, ErrorKind> {
    let device_id = device.device_id.clone();
    let pending =
        deps.db.call(move |conn| commands::pending_for_device(conn, &device_id)).await?;
    let ts = deps.now_wire();

    if pending.is_empty() {
        return Ok(format!("S1:no_commands|TS:{ts}"));
    }

    let mut body = format!("CMD_COUNT:{}", pending.len());
    for (i, cmd) in pending.iter().enumerate() {
        let payload_value: Value =
            serde_json::from_str(&cmd.payload).unwrap_or(Value::String(cmd.payload.clone()));
        body.push_str(&format!("|CMD[{i}].CMD1:{}", cmd.command_id));
        body.push_str(&format!("|CMD[{i}].CMD2:{}", cmd.name));
        body.push_str(&format!("|CMD[{i}].CMD3:{}", legacy::encode_value(&payload_value)));
        body.push_str(&format!("|CMD[{i}].CMD4:{}", cmd.priority));
        body.push_str(&format!("|CMD[{i}].CMD5:{}", cmd.expires_at));
        body.push_str(&format!("|CMD[{i}].SIG_SERV:{}", cmd.server_signature));
    }
    body.push_str(&format!("|TS:{ts}"));
    Ok(body)
}

/// Acknowledgement fields captured from a device.
#[derive(Debug, Clone)]
pub struct AckRequest {
    pub command_id: String,
    pub status: String,
    pub message: Option<String>,
    pub execution_time_ms: Option<i64>,
    pub raw: String,
}

/// Settle an ack. The first verified ack for a pending command performs
/// the single pending → completed transition; anything after that is
/// idempotent and changes nothing.
pub async fn acknowledge(
    deps: &Deps,
    device: &DeviceRecord,
    req: AckRequest,
) -> Result<AckOutcome, ErrorKind> {
    let ack = Ack {
        status: req.status.clone(),
        message: req.message,
        execution_time_ms: req.execution_time_ms,
        raw: req.raw,
        completed_at: deps.now_wire(),
    };
    let (command_id, device_id) = (req.command_id.clone(), device.device_id.clone());
    let outcome = deps
        .db
        .call(move |conn| commands::complete(conn, &command_id, &device_id, &ack))
        .await?;

    match outcome {
        AckOutcome::Completed => {
            deps.hooks
                .emit(HookEvent::CommandAcknowledged {
                    command_id: req.command_id,
                    device_id: device.device_id.clone(),
                    status: req.status,
                })
                .await;
        }
        AckOutcome::AlreadySettled => {
            tracing::debug!(command = %req.command_id, "repeat ack ignored");
        }
        AckOutcome::NotFound => {
            tracing::warn!(
                command = %req.command_id,
                device = %device.device_id,
                "ack for unknown command"
            );
        }
    }
    Ok(outcome)
}

/// Flip overdue pending commands to expired. Runs from the background scan.
pub async fn expire_due(deps: &Deps) -> Result<usize, ErrorKind> {
    let now = deps.now_wire();
    let expired = deps.db.call(move |conn| commands::expire_due(conn, &now)).await?;
    if expired > 0 {
        tracing::info!(count = expired, "expired overdue commands");
    }
    Ok(expired)
}

#[cfg(test)]
#[path = "command_tests.rs"]
mod tests;
