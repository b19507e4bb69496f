// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Firmware distribution: publish signed releases, offer updates on check,
//! gate downloads behind short-lived signed tokens, track per-device
//! rollout state.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde_json::json;
use toon_wire::canonical;

use crate::error::ErrorKind;
use crate::hooks::HookEvent;
use crate::state::Deps;
use crate::store::devices::{self, DeviceRecord};
use crate::store::firmware::{self, FirmwareRecord};
use crate::types::FirmwareState;

/// Canonical form of the signed release fields, `server_signature` excluded.
pub fn release_canonical(rec: &FirmwareRecord) -> String {
    let tokens = toon_wire::payload([
        ("FW1", json!(rec.firmware_id)),
        ("FW2", json!(rec.version)),
        ("FW3", json!(rec.checksum)),
        ("FW4", json!(rec.size_bytes)),
        ("FW5", json!(rec.device_type)),
    ]);
    canonical::canonical_string(&tokens)
}

/// Operator-supplied fields for a new release.
#[derive(Debug, Clone)]
pub struct PublishRequest {
    pub version: String,
    pub device_type: String,
    pub bundle_url_template: String,
    pub checksum: String,
    pub size_bytes: i64,
    pub policy_id: Option<String>,
}

/// Store a new signed release.
pub async fn publish(deps: &Deps, req: PublishRequest) -> Result<FirmwareRecord, ErrorKind> {
    let mut record = FirmwareRecord {
        firmware_id: uuid::Uuid::new_v4().to_string(),
        version: req.version,
        device_type: req.device_type,
        bundle_url_template: req.bundle_url_template,
        checksum: req.checksum,
        size_bytes: req.size_bytes,
        policy_id: req.policy_id,
        server_signature: String::new(),
        created_at: deps.now_wire(),
        deprecated_at: None,
    };
    record.server_signature = deps.signer.sign_b64(&release_canonical(&record));

    let stored = record.clone();
    deps.db.call(move |conn| firmware::insert(conn, &stored)).await?;
    tracing::info!(
        firmware = %record.firmware_id,
        version = %record.version,
        device_type = %record.device_type,
        "firmware release published"
    );
    Ok(record)
}

/// What a check came back with.
#[derive(Debug, Clone)]
pub enum CheckOutcome {
    /// A newer release applies; the URL already carries the download token.
    Offer { release: FirmwareRecord, url: String, token: String },
    UpToDate,
}

/// Resolve the latest applicable release for a device and mint the
/// download token when it differs from what the device runs.
pub async fn check(
    deps: &Deps,
    device: &DeviceRecord,
    current_version: &str,
) -> Result<CheckOutcome, ErrorKind> {
    let (device_type, policy) = (device.device_type.clone(), device.policy_id.clone());
    let release = deps
        .db
        .call(move |conn| firmware::latest_for(conn, &device_type, policy.as_deref()))
        .await?;

    let Some(release) = release else {
        return Ok(CheckOutcome::UpToDate);
    };
    if release.version == current_version {
        return Ok(CheckOutcome::UpToDate);
    }

    let expires = deps.clock.now().timestamp() + deps.config.fw_token_ttl_secs;
    let token = mint_download_token(deps, &release.firmware_id, &device.device_id, expires);
    let url = format!(
        "{}?token={token}",
        release.bundle_url_template.replace("{id}", &release.firmware_id)
    );

    let (device_id, firmware_id, now) =
        (device.device_id.clone(), release.firmware_id.clone(), deps.now_wire());
    deps.db
        .call(move |conn| {
            firmware::set_device_state(
                conn,
                &device_id,
                &firmware_id,
                FirmwareState::Checking.as_str(),
                None,
                &now,
            )
        })
        .await?;

    Ok(CheckOutcome::Offer { release, url, token })
}

/// `firmware_id|device_id|expires_unix|signature`, base64url-encoded.
pub fn mint_download_token(
    deps: &Deps,
    firmware_id: &str,
    device_id: &str,
    expires_unix: i64,
) -> String {
    let message = format!("{firmware_id}|{device_id}|{expires_unix}");
    let sig = deps.signer.sign_b64(&message);
    URL_SAFE_NO_PAD.encode(format!("{message}|{sig}"))
}

/// Verify a download token: shape, expiry, then signature.
pub fn verify_download_token(deps: &Deps, token: &str) -> Option<(String, String)> {
    let decoded = URL_SAFE_NO_PAD.decode(token).ok()?;
    let text = String::from_utf8(decoded).ok()?;
    let mut parts = text.split('|');
    let firmware_id = parts.next()?;
    let device_id = parts.next()?;
    let expires: i64 = parts.next()?.parse().ok()?;
    let sig = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    if deps.clock.now().timestamp() > expires {
        return None;
    }
    let message = format!("{firmware_id}|{device_id}|{expires}");
    if !deps.signer.verify_own_b64(&message, sig) {
        return None;
    }
    Some((firmware_id.to_owned(), device_id.to_owned()))
}

/// Device-reported rollout progress.
pub async fn acknowledge(
    deps: &Deps,
    device: &DeviceRecord,
    firmware_id: &str,
    version: &str,
    ack_status: &str,
    detail: Option<String>,
) -> Result<FirmwareState, ErrorKind> {
    let state = match ack_status {
        "OK" | "SUCCESS" | "APPLIED" => FirmwareState::Applied,
        "DOWNLOADING" | "IN_PROGRESS" => FirmwareState::Downloading,
        _ => FirmwareState::Failed,
    };

    let (device_id, fw, now) = (device.device_id.clone(), firmware_id.to_owned(), deps.now_wire());
    let (state_str, detail_clone, version_owned) =
        (state.as_str(), detail.clone(), version.to_owned());
    deps.db
        .call(move |conn| {
            let tx = conn.transaction()?;
            firmware::set_device_state(
                &tx,
                &device_id,
                &fw,
                state_str,
                detail_clone.as_deref(),
                &now,
            )?;
            if state_str == "applied" {
                devices::set_firmware_version(&tx, &device_id, &version_owned)?;
            }
            tx.commit()?;
            Ok(())
        })
        .await?;

    if state == FirmwareState::Failed {
        deps.hooks
            .emit(HookEvent::FirmwareFailure {
                device_id: device.device_id.clone(),
                version: version.to_owned(),
                message: detail.unwrap_or_default(),
            })
            .await;
    }
    Ok(state)
}

#[cfg(test)]
#[path = "firmware_tests.rs"]
mod tests;
