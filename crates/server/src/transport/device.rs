// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Device-facing handlers. Everything here speaks the legacy dialect and
//! runs behind the attestation pipeline; the firmware download endpoint is
//! the one exception, gated by its signed token instead.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, Query, RawQuery, State};
use axum::http::HeaderMap;
use axum::response::Response;
use bytes::Bytes;
use serde_json::json;
use toon_wire::{canonical, legacy, Payload};

use crate::attest::{self, token_str};
use crate::clock::parse_wire;
use crate::command::{self, AckRequest};
use crate::crypto;
use crate::error::ErrorKind;
use crate::firmware::{self, CheckOutcome};
use crate::hooks::HookEvent;
use crate::ingest;
use crate::nonce::NonceOutcome;
use crate::ratelimit;
use crate::respond;
use crate::state::Deps;
use crate::store::audit::{self, AuditEntry};
use crate::store::devices::{self, DeviceRecord, Telemetry};
use crate::store::{firmware as firmware_store, logs};
use crate::transport::body::{self, device_error, device_raw};
use crate::types::{capabilities_from_str, capabilities_to_str, Capability, DeviceType};

/// Write the audit row for one handled device request.
async fn audit_request(
    deps: &Deps,
    endpoint: &str,
    device: &DeviceRecord,
    inbound: &str,
    response: &str,
    status: &str,
) {
    let entry = AuditEntry {
        company_id: Some(device.company_id.clone()),
        device_id: Some(device.device_id.clone()),
        endpoint: endpoint.to_owned(),
        inbound: inbound.to_owned(),
        response: response.to_owned(),
        status: status.to_owned(),
        created_at: deps.now_wire(),
    };
    if let Err(err) = deps.db.call(move |conn| audit::append(conn, &entry)).await {
        tracing::error!(err = %err, "failed to audit request");
    }
}

// -- Registration -------------------------------------------------------------

/// `POST /devices/register`
///
/// The one endpoint that cannot use the stored-key pipeline: the request is
/// self-signed with the key it carries in `D4`. The remaining steps run in
/// the same order as the middleware.
pub async fn register(
    State(deps): State<Arc<Deps>>,
    headers: HeaderMap,
    raw_body: Bytes,
) -> Response {
    const ENDPOINT: &str = "/devices/register";
    let raw = match body::read_toon_body(&headers, &raw_body) {
        Ok(raw) => raw,
        Err(kind) => return device_error(&kind, &deps.now_wire()),
    };

    match register_pipeline(&deps, &raw).await {
        Ok(response) => response,
        Err(kind) => {
            let entry = AuditEntry {
                company_id: None,
                device_id: None,
                endpoint: ENDPOINT.to_owned(),
                inbound: raw,
                response: respond::render_device(&respond::error_payload(&kind, &deps.now_wire())),
                status: kind.as_str().to_owned(),
                created_at: deps.now_wire(),
            };
            if let Err(err) = deps.db.call(move |conn| audit::append(conn, &entry)).await {
                tracing::error!(err = %err, "failed to audit rejected registration");
            }
            device_error(&kind, &deps.now_wire())
        }
    }
}

async fn register_pipeline(deps: &Deps, raw: &str) -> Result<Response, ErrorKind> {
    const ENDPOINT: &str = "/devices/register";
    if raw.trim().is_empty() {
        return Err(ErrorKind::EmptyPayload);
    }
    let tokens = legacy::decode(raw)?;

    let missing: Vec<String> = ["D1", "D2", "D4", "TS", "NONCE", "SIG1"]
        .iter()
        .filter(|key| !tokens.contains_key(**key))
        .map(|key| (*key).to_owned())
        .collect();
    if !missing.is_empty() {
        return Err(ErrorKind::MissingTokens(missing));
    }

    let ts_raw = token_str(&tokens, "TS").ok_or(ErrorKind::TimestampSkew)?;
    let ts = parse_wire(&ts_raw).ok_or(ErrorKind::TimestampSkew)?;
    if (deps.clock.now() - ts).num_seconds().abs() > deps.config.max_skew_secs {
        return Err(ErrorKind::TimestampSkew);
    }

    let device_id = token_str(&tokens, "D1").ok_or(ErrorKind::DeviceNotFound)?;
    let lookup_id = device_id.clone();
    let existing = deps.db.call(move |conn| devices::get(conn, &lookup_id)).await?;
    if existing.as_ref().is_some_and(DeviceRecord::is_revoked) {
        return Err(ErrorKind::DeviceRevoked);
    }

    let nonce = token_str(&tokens, "NONCE").ok_or(ErrorKind::NonceReuse)?;
    if deps.nonces.check_and_mark(&device_id, &nonce, deps.clock.now()).await?
        == NonceOutcome::Reused
    {
        return Err(ErrorKind::NonceReuse);
    }

    let device_type_raw = token_str(&tokens, "D2").unwrap_or_default();
    let device_type =
        DeviceType::parse(&device_type_raw).ok_or(ErrorKind::InvalidDeviceType(device_type_raw))?;

    let key_raw = token_str(&tokens, "D4").ok_or(ErrorKind::SignatureInvalid)?;
    let public_key_pem = crypto::normalize_public_key(&key_raw).map_err(|err| {
        tracing::debug!(err = %err, "registration carried an unusable public key");
        ErrorKind::PayloadCorrupted
    })?;

    // Self-signed: the signature must verify against the key being enrolled.
    let sig = token_str(&tokens, "SIG1").ok_or(ErrorKind::SignatureInvalid)?;
    let canon = canonical::canonical_string(&tokens);
    if !crypto::verify_pem_b64(&public_key_pem, &canon, &sig) {
        return Err(ErrorKind::SignatureInvalid);
    }

    // `D3` may arrive as a `;` list (decoded to an array) or a lone name.
    let capabilities = match tokens.get("D3") {
        Some(serde_json::Value::Array(items)) => {
            let caps: Vec<Capability> = items
                .iter()
                .filter_map(serde_json::Value::as_str)
                .filter_map(Capability::parse)
                .collect();
            capabilities_to_str(&caps)
        }
        Some(serde_json::Value::String(raw)) => capabilities_to_str(&capabilities_from_str(raw)),
        _ => String::new(),
    };

    let record = DeviceRecord {
        device_id: device_id.clone(),
        company_id: deps.config.company_id.clone(),
        device_type: device_type.as_str().to_owned(),
        public_key_pem,
        capabilities,
        firmware_version: token_str(&tokens, "FW2"),
        status: "active".to_owned(),
        policy_id: token_str(&tokens, "P1"),
        battery_pct: None,
        queue_depth: None,
        storage_free_mb: None,
        app_version: None,
        registered_at: deps.now_wire(),
        last_seen_at: None,
    };
    let is_new = existing.is_none();
    let previous_seen = existing.and_then(|d| d.last_seen_at);
    let stored = record.clone();
    deps.db.call(move |conn| devices::upsert_registration(conn, &stored)).await?;

    deps.hooks.emit(HookEvent::DeviceRegistered { device_id: device_id.clone() }).await;
    tracing::info!(device = %device_id, device_type = %device_type, new = is_new, "device registered");

    let mut payload = toon_wire::payload([
        ("S1", json!("ok")),
        ("D1", json!(device_id)),
        ("D2", json!(device_type.as_str())),
        ("D4", json!(crypto::raw_b64_from_public_pem(&record.public_key_pem).unwrap_or_default())),
        ("REG", json!(if is_new { "registered" } else { "updated" })),
    ]);
    if let Some(last) = previous_seen {
        payload.insert("LAST".to_owned(), json!(last));
    }
    payload.insert("TS".to_owned(), json!(deps.now_wire()));

    let rendered = respond::render_device(&payload);
    let lookup_id = record.device_id.clone();
    if let Ok(Some(device)) = deps.db.call(move |conn| devices::get(conn, &lookup_id)).await {
        audit_request(deps, ENDPOINT, &device, raw, &rendered, "ok").await;
    }
    Ok(device_raw(rendered))
}

// -- Ingestion ----------------------------------------------------------------

/// `POST /devices/events` — attested batch ingestion.
pub async fn ingest_events(
    State(deps): State<Arc<Deps>>,
    headers: HeaderMap,
    raw_body: Bytes,
) -> Response {
    const ENDPOINT: &str = "/devices/events";
    let raw = match body::read_toon_body(&headers, &raw_body) {
        Ok(raw) => raw,
        Err(kind) => return device_error(&kind, &deps.now_wire()),
    };

    // The envelope fragment carries the attestation tokens; each remaining
    // fragment is one event.
    let envelope = raw.split(toon_wire::token::BATCH_SEP).find(|f| !f.is_empty()).unwrap_or("");
    let attested = match attest::attest(&deps, ENDPOINT, envelope, &[]).await {
        Ok(attested) => attested,
        Err(kind) => return device_error(&kind, &deps.now_wire()),
    };

    let result = ingest::ingest_batch(&deps, &attested.device, &raw).await;
    device_raw(result.body())
}

// -- Heartbeat ----------------------------------------------------------------

/// `POST /devices/heartbeat`
pub async fn heartbeat(
    State(deps): State<Arc<Deps>>,
    headers: HeaderMap,
    raw_body: Bytes,
) -> Response {
    const ENDPOINT: &str = "/devices/heartbeat";
    let raw = match body::read_toon_body(&headers, &raw_body) {
        Ok(raw) => raw,
        Err(kind) => return device_error(&kind, &deps.now_wire()),
    };
    let attested = match attest::attest(&deps, ENDPOINT, &raw, &["HB1", "HB2"]).await {
        Ok(attested) => attested,
        Err(kind) => return device_error(&kind, &deps.now_wire()),
    };
    let device = &attested.device;

    if let Err(kind) =
        ratelimit::check(&deps, &device.device_id, ENDPOINT, deps.config.heartbeat_cap).await
    {
        let rendered = respond::render_device(&respond::error_payload(&kind, &deps.now_wire()));
        audit_request(&deps, ENDPOINT, device, &raw, &rendered, kind.as_str()).await;
        return device_error(&kind, &deps.now_wire());
    }

    let telemetry = Telemetry {
        battery_pct: attested.tokens.get("HB3").and_then(serde_json::Value::as_i64),
        queue_depth: attested.tokens.get("HB4").and_then(serde_json::Value::as_i64),
        storage_free_mb: attested.tokens.get("HB5").and_then(serde_json::Value::as_i64),
        app_version: token_str(&attested.tokens, "HB6"),
        firmware_version: token_str(&attested.tokens, "FW2"),
    };
    let (device_id, now) = (device.device_id.clone(), deps.now_wire());
    if let Err(kind) = deps
        .db
        .call(move |conn| devices::record_heartbeat(conn, &device_id, &now, &telemetry))
        .await
    {
        return device_error(&kind, &deps.now_wire());
    }

    let device_id = device.device_id.clone();
    let pending = match deps
        .db
        .call(move |conn| crate::store::commands::pending_for_device(conn, &device_id))
        .await
    {
        Ok(pending) => pending,
        Err(kind) => return device_error(&kind, &deps.now_wire()),
    };

    let current_version = token_str(&attested.tokens, "FW2")
        .or_else(|| device.firmware_version.clone())
        .unwrap_or_default();
    let (device_type, policy) = (device.device_type.clone(), device.policy_id.clone());
    let latest = deps
        .db
        .call(move |conn| firmware_store::latest_for(conn, &device_type, policy.as_deref()))
        .await
        .ok()
        .flatten();

    let mut payload = toon_wire::payload([
        ("S1", json!("ok")),
        ("RTO", json!(60)),
        ("TS", json!(deps.now_wire())),
        ("PENDING_CMDS", json!(pending.len())),
    ]);
    if !pending.is_empty() {
        let ids: Vec<&str> = pending.iter().map(|c| c.command_id.as_str()).collect();
        payload.insert("CMD_IDS".to_owned(), json!(ids.join(";")));
    }
    if let Some(latest) = latest {
        if latest.version != current_version {
            payload.insert("FW_AVAILABLE".to_owned(), json!(true));
            payload.insert("FW2".to_owned(), json!(latest.version));
        }
    }

    deps.hooks.emit(HookEvent::DeviceHeartbeat { device_id: device.device_id.clone() }).await;

    let rendered = respond::render_device(&payload);
    audit_request(&deps, ENDPOINT, device, &raw, &rendered, "ok").await;
    device_raw(rendered)
}

// -- Command loop -------------------------------------------------------------

/// `GET /devices/commands` — attestation tokens travel in the query string.
pub async fn poll_commands(
    State(deps): State<Arc<Deps>>,
    Query(params): Query<HashMap<String, String>>,
    RawQuery(raw_query): RawQuery,
) -> Response {
    const ENDPOINT: &str = "/devices/commands";
    let raw = raw_query.unwrap_or_default();

    let mut tokens = Payload::new();
    for (key, value) in &params {
        tokens.insert(key.clone(), legacy::parse_value(value));
    }

    let attested = match attest::attest_tokens(&deps, ENDPOINT, &raw, tokens, &[]).await {
        Ok(attested) => attested,
        Err(kind) => return device_error(&kind, &deps.now_wire()),
    };

    match command::poll_body(&deps, &attested.device).await {
        Ok(response) => {
            audit_request(&deps, ENDPOINT, &attested.device, &raw, &response, "ok").await;
            device_raw(response)
        }
        Err(kind) => device_error(&kind, &deps.now_wire()),
    }
}

/// `POST /devices/command-ack`
pub async fn command_ack(
    State(deps): State<Arc<Deps>>,
    headers: HeaderMap,
    raw_body: Bytes,
) -> Response {
    const ENDPOINT: &str = "/devices/command-ack";
    let raw = match body::read_toon_body(&headers, &raw_body) {
        Ok(raw) => raw,
        Err(kind) => return device_error(&kind, &deps.now_wire()),
    };
    let attested = match attest::attest(&deps, ENDPOINT, &raw, &["CMD1", "ACK1"]).await {
        Ok(attested) => attested,
        Err(kind) => return device_error(&kind, &deps.now_wire()),
    };

    let req = AckRequest {
        command_id: token_str(&attested.tokens, "CMD1").unwrap_or_default(),
        status: token_str(&attested.tokens, "ACK1").unwrap_or_default(),
        message: token_str(&attested.tokens, "ACK2"),
        execution_time_ms: attested.tokens.get("ACK3").and_then(serde_json::Value::as_i64),
        raw: raw.clone(),
    };
    if let Err(kind) = command::acknowledge(&deps, &attested.device, req).await {
        return device_error(&kind, &deps.now_wire());
    }

    let payload = respond::ok_payload(&deps.now_wire());
    let rendered = respond::render_device(&payload);
    audit_request(&deps, ENDPOINT, &attested.device, &raw, &rendered, "ok").await;
    device_raw(rendered)
}

// -- Firmware loop ------------------------------------------------------------

/// `POST /devices/firmware/check`
pub async fn firmware_check(
    State(deps): State<Arc<Deps>>,
    headers: HeaderMap,
    raw_body: Bytes,
) -> Response {
    const ENDPOINT: &str = "/devices/firmware/check";
    let raw = match body::read_toon_body(&headers, &raw_body) {
        Ok(raw) => raw,
        Err(kind) => return device_error(&kind, &deps.now_wire()),
    };
    let attested = match attest::attest(&deps, ENDPOINT, &raw, &["FW2"]).await {
        Ok(attested) => attested,
        Err(kind) => return device_error(&kind, &deps.now_wire()),
    };

    let current = token_str(&attested.tokens, "FW2").unwrap_or_default();
    let payload = match firmware::check(&deps, &attested.device, &current).await {
        Ok(CheckOutcome::Offer { release, url, token }) => toon_wire::payload([
            ("S1", json!("ok")),
            ("FW1", json!(release.firmware_id)),
            ("FW2", json!(release.version)),
            ("FW3", json!(release.checksum)),
            ("FW4", json!(release.size_bytes)),
            ("FW5", json!(url)),
            ("FW_SIG", json!(release.server_signature)),
            ("O1", json!(token)),
            ("TS", json!(deps.now_wire())),
        ]),
        Ok(CheckOutcome::UpToDate) => toon_wire::payload([
            ("S1", json!("no_update")),
            ("RTO", json!(3600)),
            ("TS", json!(deps.now_wire())),
        ]),
        Err(kind) => return device_error(&kind, &deps.now_wire()),
    };

    let rendered = respond::render_device(&payload);
    audit_request(&deps, ENDPOINT, &attested.device, &raw, &rendered, "ok").await;
    device_raw(rendered)
}

/// `POST /devices/firmware/ack`
pub async fn firmware_ack(
    State(deps): State<Arc<Deps>>,
    headers: HeaderMap,
    raw_body: Bytes,
) -> Response {
    const ENDPOINT: &str = "/devices/firmware/ack";
    let raw = match body::read_toon_body(&headers, &raw_body) {
        Ok(raw) => raw,
        Err(kind) => return device_error(&kind, &deps.now_wire()),
    };
    let attested = match attest::attest(&deps, ENDPOINT, &raw, &["FW1", "FW2", "ACK1"]).await {
        Ok(attested) => attested,
        Err(kind) => return device_error(&kind, &deps.now_wire()),
    };

    let firmware_id = token_str(&attested.tokens, "FW1").unwrap_or_default();
    let version = token_str(&attested.tokens, "FW2").unwrap_or_default();
    let ack_status = token_str(&attested.tokens, "ACK1").unwrap_or_default();
    let detail =
        token_str(&attested.tokens, "ACK2").or_else(|| token_str(&attested.tokens, "LOG1"));

    if let Err(kind) =
        firmware::acknowledge(&deps, &attested.device, &firmware_id, &version, &ack_status, detail)
            .await
    {
        return device_error(&kind, &deps.now_wire());
    }

    let payload = respond::ok_payload(&deps.now_wire());
    let rendered = respond::render_device(&payload);
    audit_request(&deps, ENDPOINT, &attested.device, &raw, &rendered, "ok").await;
    device_raw(rendered)
}

/// `GET /firmware/{id}/download?token=…` — token-gated bundle download.
pub async fn firmware_download(
    State(deps): State<Arc<Deps>>,
    Path(firmware_id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let Some(token) = params.get("token") else {
        return device_error(&ErrorKind::Unauthorized, &deps.now_wire());
    };
    let Some((token_fw, device_id)) = firmware::verify_download_token(&deps, token) else {
        return device_error(&ErrorKind::Unauthorized, &deps.now_wire());
    };
    if token_fw != firmware_id {
        return device_error(&ErrorKind::Unauthorized, &deps.now_wire());
    }

    let Some(dir) = deps.config.firmware_dir.clone() else {
        return device_error(&ErrorKind::FirmwareNotFound, &deps.now_wire());
    };
    let path = dir.join(format!("{firmware_id}.bin"));
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::warn!(err = %err, firmware = %firmware_id, "firmware bundle missing");
            return device_error(&ErrorKind::FirmwareNotFound, &deps.now_wire());
        }
    };

    let (dev, fw, now) = (device_id, firmware_id.clone(), deps.now_wire());
    if let Err(err) = deps
        .db
        .call(move |conn| {
            firmware_store::set_device_state(conn, &dev, &fw, "downloading", None, &now)
        })
        .await
    {
        tracing::error!(err = %err, "failed to record download state");
    }

    let summary = toon_wire::payload([
        ("S1", json!("ok")),
        ("FW1", json!(firmware_id)),
        ("TS", json!(deps.now_wire())),
    ]);
    body::binary_with_toon("application/octet-stream", &summary, bytes)
}

// -- Log upload ---------------------------------------------------------------

/// `POST /devices/logs`
pub async fn upload_logs(
    State(deps): State<Arc<Deps>>,
    headers: HeaderMap,
    raw_body: Bytes,
) -> Response {
    const ENDPOINT: &str = "/devices/logs";
    /// Upper bound on lines accepted per upload.
    const MAX_LINES: usize = 1000;

    let raw = match body::read_toon_body(&headers, &raw_body) {
        Ok(raw) => raw,
        Err(kind) => return device_error(&kind, &deps.now_wire()),
    };
    let attested = match attest::attest(&deps, ENDPOINT, &raw, &["LOG1", "LOG2"]).await {
        Ok(attested) => attested,
        Err(kind) => return device_error(&kind, &deps.now_wire()),
    };

    let upload_id = token_str(&attested.tokens, "LOG1").unwrap_or_default();
    let declared: usize = token_str(&attested.tokens, "LOG2")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);

    let mut entries = Vec::new();
    for i in 0..declared.min(MAX_LINES) {
        let Some(message) = token_str(&attested.tokens, &format!("LOG[{i}].MSG")) else {
            continue;
        };
        entries.push(logs::DeviceLogEntry {
            device_id: attested.device.device_id.clone(),
            level: token_str(&attested.tokens, &format!("LOG[{i}].LVL")),
            message,
            logged_at: token_str(&attested.tokens, &format!("LOG[{i}].TS")),
            received_at: deps.now_wire(),
        });
    }

    let stored = entries;
    if let Err(kind) = deps.db.call(move |conn| logs::append_batch(conn, &stored)).await {
        return device_error(&kind, &deps.now_wire());
    }

    let payload = toon_wire::payload([
        ("S1", json!("ok")),
        ("LOG1", json!(upload_id)),
        ("TS", json!(deps.now_wire())),
    ]);
    let rendered = respond::render_device(&payload);
    audit_request(&deps, ENDPOINT, &attested.device, &raw, &rendered, "ok").await;
    device_raw(rendered)
}

// -- Health -------------------------------------------------------------------

/// `GET /health` — no auth, no attestation.
pub async fn health(State(deps): State<Arc<Deps>>) -> Response {
    device_raw(format!("S1:ok|SYS:healthy|TS:{}", deps.now_wire()))
}
