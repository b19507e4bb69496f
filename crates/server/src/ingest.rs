// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ingestion engine for batched attendance events.
//!
//! Each fragment of the batch is processed on its own: schema check,
//! dedupe against the global `event_id` constraint, insert with the
//! verbatim raw fragment, audit, hook emission. One bad event never takes
//! the batch down, and the response preserves input order.

use serde_json::Value;
use toon_wire::token::BATCH_SEP;
use toon_wire::Payload;

use crate::attest::token_str;
use crate::clock::parse_wire;
use crate::hooks::HookEvent;
use crate::state::Deps;
use crate::store::audit::{self, AuditEntry};
use crate::store::devices::{self, DeviceRecord};
use crate::store::events::{self, EventRecord, InsertOutcome};
use crate::store::employees;
use crate::types::{EventStatus, EventType};

/// Tokens every event fragment must carry.
const REQUIRED: &[&str] = &["E1", "A1", "A2", "A3", "D1"];

const ENDPOINT: &str = "/devices/events";

/// Result of one batch: per-event response fragments in input order.
#[derive(Debug)]
pub struct BatchResult {
    pub fragments: Vec<String>,
    pub statuses: Vec<EventStatus>,
}

impl BatchResult {
    /// The response body: fragment per event, batch-joined.
    pub fn body(&self) -> String {
        self.fragments.join(BATCH_SEP)
    }

    pub fn accepted(&self) -> usize {
        self.statuses.iter().filter(|s| **s == EventStatus::Processed).count()
    }
}

/// Why one event was turned away. Rendered into the `ERR4` reason slot.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Reject {
    Corrupted,
    Missing(Vec<String>),
    BadEventType(String),
    BadTimestamp(String),
    BadLocation,
    DeviceMismatch(String),
    UnknownEmployee(String),
    Internal,
}

impl Reject {
    fn render(&self) -> String {
        match self {
            Self::Corrupted => "payload_corrupted".to_owned(),
            Self::Missing(keys) => format!("missing_token:{}", keys.join(",")),
            Self::BadEventType(got) => format!("invalid_event_type:{got}"),
            Self::BadTimestamp(got) => format!("invalid_timestamp_format:{got}"),
            Self::BadLocation => "invalid_location_format".to_owned(),
            Self::DeviceMismatch(got) => format!("device_mismatch:{got}"),
            Self::UnknownEmployee(id) => format!("unknown_employee:{id}"),
            Self::Internal => "internal_error".to_owned(),
        }
    }
}

/// Run the whole batch. `raw` is the request body after the attestation
/// envelope has been verified; envelope-only fragments are skipped.
pub async fn ingest_batch(deps: &Deps, device: &DeviceRecord, raw: &str) -> BatchResult {
    let mut fragments = Vec::new();
    let mut statuses = Vec::new();

    for frag in raw.split(BATCH_SEP).filter(|f| !f.is_empty()) {
        if is_envelope(frag) {
            continue;
        }
        let (response, status) = process_event(deps, device, frag).await;
        fragments.push(response);
        statuses.push(status);
    }

    BatchResult { fragments, statuses }
}

/// The attestation envelope carries `SIG1` but no event id; anything with
/// an `A1` is an event, signed or not.
fn is_envelope(frag: &str) -> bool {
    frag.split('|').any(|t| t.starts_with("SIG1:")) && !frag.split('|').any(|t| t.starts_with("A1:"))
}

async fn process_event(deps: &Deps, device: &DeviceRecord, frag: &str) -> (String, EventStatus) {
    let tokens = match toon_wire::decode(frag) {
        Ok(tokens) => tokens,
        Err(err) => {
            tracing::debug!(err = %err, "event fragment failed to decode");
            return reject(deps, device, frag, Reject::Corrupted).await;
        }
    };

    let record = match validate(deps, device, &tokens, frag).await {
        Ok(record) => record,
        Err(kind) => return reject(deps, device, frag, kind).await,
    };

    match persist(deps, device, frag, &record).await {
        Ok(InsertOutcome::Inserted) => {
            deps.hooks
                .emit(HookEvent::EventIngested {
                    event_id: record.event_id.clone(),
                    device_id: device.device_id.clone(),
                    employee_id: record.employee_id.clone(),
                })
                .await;
            (format!("A1:{}|S1:accepted", record.event_id), EventStatus::Processed)
        }
        Ok(InsertOutcome::Duplicate) => {
            deps.hooks
                .emit(HookEvent::DuplicateEvent {
                    event_id: record.event_id.clone(),
                    device_id: device.device_id.clone(),
                })
                .await;
            (format!("A1:{}|S1:duplicate", record.event_id), EventStatus::Duplicate)
        }
        Err(err) => {
            tracing::error!(err = %err, event = %record.event_id, "event insert failed");
            reject(deps, device, frag, Reject::Internal).await
        }
    }
}

/// Schema and tenant checks, in order. Rejection here is structural; the
/// server never re-scores biometrics.
async fn validate(
    deps: &Deps,
    device: &DeviceRecord,
    tokens: &Payload,
    frag: &str,
) -> Result<EventRecord, Reject> {
    let missing: Vec<String> = REQUIRED
        .iter()
        .filter(|key| !tokens.contains_key(**key))
        .map(|key| (*key).to_owned())
        .collect();
    if !missing.is_empty() {
        return Err(Reject::Missing(missing));
    }

    let event_type_raw = token_str(tokens, "A2").unwrap_or_default();
    let event_type =
        EventType::parse(&event_type_raw).ok_or(Reject::BadEventType(event_type_raw))?;

    let ts_raw = token_str(tokens, "A3").unwrap_or_default();
    if parse_wire(&ts_raw).is_none() {
        return Err(Reject::BadTimestamp(ts_raw));
    }

    let event_device = token_str(tokens, "D1").unwrap_or_default();
    if event_device != device.device_id {
        return Err(Reject::DeviceMismatch(event_device));
    }

    // Geolocation is optional, but a location object must be complete.
    let (lat, lng, accuracy) = match tokens.get("L1") {
        Some(Value::Object(map)) => {
            let lat = map.get("lat").and_then(Value::as_f64);
            let lng = map.get("lng").and_then(Value::as_f64);
            if lat.is_none() || lng.is_none() {
                return Err(Reject::BadLocation);
            }
            (lat, lng, map.get("acc").and_then(Value::as_f64))
        }
        _ => (None, None, None),
    };

    let employee_id = token_str(tokens, "E1").unwrap_or_default();
    let (company, employee) = (device.company_id.clone(), employee_id.clone());
    let known = deps
        .db
        .call(move |conn| employees::is_known_active(conn, &company, &employee))
        .await
        .map_err(|_| Reject::Internal)?;
    if !known {
        return Err(Reject::UnknownEmployee(employee_id));
    }

    let event_id = token_str(tokens, "A1").unwrap_or_default();
    Ok(EventRecord {
        event_id,
        company_id: device.company_id.clone(),
        employee_id,
        event_type: event_type.as_str().to_owned(),
        ts: ts_raw,
        device_id: device.device_id.clone(),
        lat,
        lng,
        accuracy,
        face_score: tokens.get("SC1").and_then(Value::as_f64),
        fingerprint_score: tokens.get("SC2").and_then(Value::as_f64),
        liveness_score: tokens.get("SC3").and_then(Value::as_f64),
        quality_score: tokens.get("SC4").and_then(Value::as_f64),
        break_type: token_str(tokens, "BR1"),
        break_duration_mins: tokens.get("BR2").and_then(Value::as_i64),
        over_break: tokens.get("BR3").and_then(Value::as_bool),
        consent_token: token_str(tokens, "C1"),
        device_signature: token_str(tokens, "SIG1"),
        raw_toon: frag.to_owned(),
        status: EventStatus::Processed.as_str().to_owned(),
        reject_reason: None,
        received_at: deps.now_wire(),
    })
}

/// Insert, device touch, and audit in one transaction. The duplicate path
/// writes its audit row and nothing else.
async fn persist(
    deps: &Deps,
    device: &DeviceRecord,
    frag: &str,
    record: &EventRecord,
) -> Result<InsertOutcome, crate::error::ErrorKind> {
    let record = record.clone();
    let device_id = device.device_id.clone();
    let company_id = device.company_id.clone();
    let frag = frag.to_owned();
    let now = deps.now_wire();

    deps.db
        .call(move |conn| {
            let tx = conn.transaction()?;
            let outcome = events::insert(&tx, &record)?;
            let (response, status) = match outcome {
                InsertOutcome::Inserted => {
                    devices::touch_last_seen(&tx, &device_id, &now)?;
                    (format!("A1:{}|S1:accepted", record.event_id), EventStatus::Processed)
                }
                InsertOutcome::Duplicate => {
                    (format!("A1:{}|S1:duplicate", record.event_id), EventStatus::Duplicate)
                }
            };
            audit::append(
                &tx,
                &AuditEntry {
                    company_id: Some(company_id),
                    device_id: Some(device_id.clone()),
                    endpoint: ENDPOINT.to_owned(),
                    inbound: frag,
                    response,
                    status: status.as_str().to_owned(),
                    created_at: now.clone(),
                },
            )?;
            tx.commit()?;
            Ok(outcome)
        })
        .await
}

/// Audit + hook + response fragment for one rejected event.
///
/// Rejection fragments never echo `A1`: the wire contract for a turned-away
/// event is exactly `S1:error|ERR4:<reason>`, and callers correlate by
/// position (the response preserves input order).
async fn reject(
    deps: &Deps,
    device: &DeviceRecord,
    frag: &str,
    why: Reject,
) -> (String, EventStatus) {
    let reason = why.render();
    let response = format!("S1:error|ERR4:{reason}");

    let entry = AuditEntry {
        company_id: Some(device.company_id.clone()),
        device_id: Some(device.device_id.clone()),
        endpoint: ENDPOINT.to_owned(),
        inbound: frag.to_owned(),
        response: response.clone(),
        status: EventStatus::Rejected.as_str().to_owned(),
        created_at: deps.now_wire(),
    };
    if let Err(err) = deps.db.call(move |conn| audit::append(conn, &entry)).await {
        tracing::error!(err = %err, "failed to audit rejected event");
    }

    deps.hooks
        .emit(HookEvent::InvalidEvent { device_id: device.device_id.clone(), reason })
        .await;

    (response, EventStatus::Rejected)
}

#[cfg(test)]
#[path = "ingest_tests.rs"]
mod tests;
