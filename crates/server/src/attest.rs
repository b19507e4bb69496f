// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Attestation pipeline for device-originated requests.
//!
//! Order is fixed: decode → required tokens → clock skew → device lookup →
//! nonce → signature. Every rejection is written to the audit log with the
//! verbatim inbound payload and the response we sent back.

use serde_json::Value;
use toon_wire::{canonical, legacy, Payload};

use crate::clock::parse_wire;
use crate::crypto::verify_pem_b64;
use crate::error::ErrorKind;
use crate::nonce::NonceOutcome;
use crate::respond;
use crate::state::Deps;
use crate::store::audit::{self, AuditEntry};
use crate::store::devices::{self, DeviceRecord};

/// Tokens every attested request must carry, before route-specific ones.
pub const BASE_REQUIRED: &[&str] = &["D1", "TS", "NONCE", "SIG1"];

/// A request that survived the full pipeline.
#[derive(Debug)]
pub struct Attested {
    pub tokens: Payload,
    pub device: DeviceRecord,
    pub raw: String,
}

/// Read a token as its wire text. Legacy decoding may have typed a value
/// (a numeric nonce, say); the canonical renderer and the device agree on
/// the textual form either way.
pub fn token_str(tokens: &Payload, key: &str) -> Option<String> {
    match tokens.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Run the pipeline over a raw legacy-dialect body.
pub async fn attest(
    deps: &Deps,
    endpoint: &str,
    raw: &str,
    extra_required: &[&str],
) -> Result<Attested, ErrorKind> {
    let tokens = match decode_body(raw) {
        Ok(tokens) => tokens,
        Err(kind) => {
            record_rejection(deps, endpoint, raw, None, &kind).await;
            return Err(kind);
        }
    };
    attest_tokens(deps, endpoint, raw, tokens, extra_required).await
}

/// Run the pipeline over pre-decoded tokens (GET routes carry attestation
/// in the query string).
pub async fn attest_tokens(
    deps: &Deps,
    endpoint: &str,
    raw: &str,
    tokens: Payload,
    extra_required: &[&str],
) -> Result<Attested, ErrorKind> {
    match pipeline(deps, &tokens, extra_required).await {
        Ok(device) => Ok(Attested { tokens, device, raw: raw.to_owned() }),
        Err(kind) => {
            let device_id = token_str(&tokens, "D1");
            record_rejection(deps, endpoint, raw, device_id, &kind).await;
            Err(kind)
        }
    }
}

fn decode_body(raw: &str) -> Result<Payload, ErrorKind> {
    if raw.trim().is_empty() {
        return Err(ErrorKind::EmptyPayload);
    }
    Ok(legacy::decode(raw)?)
}

async fn pipeline(
    deps: &Deps,
    tokens: &Payload,
    extra_required: &[&str],
) -> Result<DeviceRecord, ErrorKind> {
    // Required tokens for the route.
    let missing: Vec<String> = BASE_REQUIRED
        .iter()
        .chain(extra_required)
        .filter(|key| !tokens.contains_key(**key))
        .map(|key| (*key).to_owned())
        .collect();
    if !missing.is_empty() {
        return Err(ErrorKind::MissingTokens(missing));
    }

    // Clock skew. An unparseable TS is treated the same as an out-of-window
    // one; both get the re-sync hint.
    let ts_raw = token_str(tokens, "TS").ok_or(ErrorKind::TimestampSkew)?;
    let ts = parse_wire(&ts_raw).ok_or(ErrorKind::TimestampSkew)?;
    let skew = (deps.clock.now() - ts).num_seconds().abs();
    if skew > deps.config.max_skew_secs {
        return Err(ErrorKind::TimestampSkew);
    }

    // Device identity and status.
    let device_id = token_str(tokens, "D1").ok_or(ErrorKind::DeviceNotFound)?;
    let lookup_id = device_id.clone();
    let device = deps
        .db
        .call(move |conn| devices::get(conn, &lookup_id))
        .await?
        .ok_or(ErrorKind::DeviceNotFound)?;
    if device.is_revoked() {
        return Err(ErrorKind::DeviceRevoked);
    }

    // Replay protection.
    let nonce = token_str(tokens, "NONCE").ok_or(ErrorKind::NonceReuse)?;
    let outcome = deps.nonces.check_and_mark(&device_id, &nonce, deps.clock.now()).await?;
    if outcome == NonceOutcome::Reused {
        return Err(ErrorKind::NonceReuse);
    }

    // Signature over the canonical token set.
    let sig = token_str(tokens, "SIG1").ok_or(ErrorKind::SignatureInvalid)?;
    let canon = canonical::canonical_string(tokens);
    if !verify_pem_b64(&device.public_key_pem, &canon, &sig) {
        return Err(ErrorKind::SignatureInvalid);
    }

    Ok(device)
}

/// Audit one rejected inbound payload together with the response body the
/// caller is about to send.
async fn record_rejection(
    deps: &Deps,
    endpoint: &str,
    raw: &str,
    device_id: Option<String>,
    kind: &ErrorKind,
) {
    let response = respond::render_device(&respond::error_payload(kind, &deps.now_wire()));
    let entry = AuditEntry {
        company_id: None,
        device_id,
        endpoint: endpoint.to_owned(),
        inbound: raw.to_owned(),
        response,
        status: kind.as_str().to_owned(),
        created_at: deps.now_wire(),
    };
    if let Err(err) = deps.db.call(move |conn| audit::append(conn, &entry)).await {
        tracing::error!(err = %err, "failed to audit rejected request");
    }
}

#[cfg(test)]
#[path = "attest_tests.rs"]
mod tests;
