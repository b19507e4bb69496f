// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end scenario tests against the real `toond` binary: event
//! ingestion, replay protection, clock skew, and the command lifecycle,
//! all with genuinely signed device traffic.

use std::time::Duration;

use chrono::Utc;
use serde_json::json;

use toond::clock::to_wire;
use toond::test_support::TestDevice;
use toond_specs::{ToondProcess, ADMIN_TOKEN};

const TIMEOUT: Duration = Duration::from_secs(15);

fn now_ts() -> String {
    to_wire(Utc::now())
}

async fn start() -> anyhow::Result<(ToondProcess, reqwest::Client)> {
    let toond = ToondProcess::start()?;
    toond.wait_healthy(TIMEOUT).await?;
    Ok((toond, reqwest::Client::new()))
}

/// Register a device over the real registration endpoint.
async fn register(
    client: &reqwest::Client,
    base: &str,
    device: &TestDevice,
) -> anyhow::Result<()> {
    let body = device.signed_body(
        &[("D2", "KIOSK"), ("D4", &device.public_raw_b64()), ("FW2", "1.0.0")],
        &now_ts(),
        &device.next_nonce(),
    );
    let resp = client.post(format!("{base}/devices/register")).body(body).send().await?;
    anyhow::ensure!(resp.status().is_success(), "registration failed: {}", resp.status());
    Ok(())
}

/// Enroll an employee through the operator surface.
async fn enroll(
    client: &reqwest::Client,
    base: &str,
    employee_id: &str,
) -> anyhow::Result<()> {
    let body = toon_wire::typed::encode(&toon_wire::payload([
        ("E1", json!(employee_id)),
        ("NAME", json!("Alex Doe")),
    ]));
    let resp = client
        .post(format!("{base}/employees/enroll"))
        .bearer_auth(ADMIN_TOKEN)
        .body(body)
        .send()
        .await?;
    anyhow::ensure!(resp.status().is_success(), "enrollment failed: {}", resp.status());
    Ok(())
}

fn event_fragment(event_id: &str, event_type: &str, ts: &str) -> String {
    format!("E1:emp_1|A1:{event_id}|A2:{event_type}|A3:{ts}|D1:dev_1")
}

/// Batch body: attestation envelope followed by event fragments.
fn batch_body(device: &TestDevice, events: &[String]) -> String {
    let envelope = device.signed_body(&[], &now_ts(), &device.next_nonce());
    let mut body = envelope;
    for event in events {
        body.push_str("||");
        body.push_str(event);
    }
    body
}

// -- S1/S2/S3: ingestion ------------------------------------------------------

#[tokio::test]
async fn s1_ingest_a_valid_batch_of_two_events() -> anyhow::Result<()> {
    let (toond, client) = start().await?;
    let base = toond.base_url();
    let device = TestDevice::new("dev_1");
    register(&client, &base, &device).await?;
    enroll(&client, &base, "emp_1").await?;

    let body = batch_body(
        &device,
        &[
            event_fragment("evt_a", "IN", "2025-01-01T09:00:00Z"),
            event_fragment("evt_b", "OUT", "2025-01-01T17:00:00Z"),
        ],
    );
    let resp = client.post(format!("{base}/devices/events")).body(body).send().await?;
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await?, "A1:evt_a|S1:accepted||A1:evt_b|S1:accepted");

    let db = toond.open_db()?;
    let rows: i64 =
        db.query_row("SELECT COUNT(*) FROM attendance_events", [], |r| r.get(0))?;
    assert_eq!(rows, 2);
    let last_seen: Option<String> = db.query_row(
        "SELECT last_seen_at FROM devices WHERE device_id = 'dev_1'",
        [],
        |r| r.get(0),
    )?;
    assert!(last_seen.is_some());
    Ok(())
}

#[tokio::test]
async fn s2_duplicate_event_is_reported_without_side_effects() -> anyhow::Result<()> {
    let (toond, client) = start().await?;
    let base = toond.base_url();
    let device = TestDevice::new("dev_1");
    register(&client, &base, &device).await?;
    enroll(&client, &base, "emp_1").await?;

    let fragment = event_fragment("evt_a", "IN", "2025-01-01T09:00:00Z");
    let body = batch_body(&device, &[fragment.clone()]);
    client.post(format!("{base}/devices/events")).body(body).send().await?;

    let body = batch_body(&device, &[fragment]);
    let resp = client.post(format!("{base}/devices/events")).body(body).send().await?;
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await?, "A1:evt_a|S1:duplicate");

    let db = toond.open_db()?;
    let rows: i64 =
        db.query_row("SELECT COUNT(*) FROM attendance_events", [], |r| r.get(0))?;
    assert_eq!(rows, 1);
    let duplicate_audits: i64 = db.query_row(
        "SELECT COUNT(*) FROM audit_log WHERE status = 'duplicate'",
        [],
        |r| r.get(0),
    )?;
    assert_eq!(duplicate_audits, 1);
    Ok(())
}

#[tokio::test]
async fn s3_missing_token_rejects_the_event_only() -> anyhow::Result<()> {
    let (toond, client) = start().await?;
    let base = toond.base_url();
    let device = TestDevice::new("dev_1");
    register(&client, &base, &device).await?;
    enroll(&client, &base, "emp_1").await?;

    // evt_c has no A3.
    let body = batch_body(&device, &["E1:emp_1|A1:evt_c|A2:IN|D1:dev_1".to_owned()]);
    let resp = client.post(format!("{base}/devices/events")).body(body).send().await?;
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await?, "S1:error|ERR4:missing_token:A3");

    let db = toond.open_db()?;
    let rows: i64 =
        db.query_row("SELECT COUNT(*) FROM attendance_events", [], |r| r.get(0))?;
    assert_eq!(rows, 0);
    Ok(())
}

// -- S4: nonce replay ---------------------------------------------------------

#[tokio::test]
async fn s4_concurrent_identical_heartbeats_accept_exactly_one() -> anyhow::Result<()> {
    let (toond, client) = start().await?;
    let base = toond.base_url();
    let device = TestDevice::new("dev_1");
    register(&client, &base, &device).await?;

    let body = device.signed_body(
        &[("HB1", "3600"), ("HB2", "healthy")],
        &now_ts(),
        &device.next_nonce(),
    );
    let url = format!("{base}/devices/heartbeat");
    let (first, second) = tokio::join!(
        client.post(&url).body(body.clone()).send(),
        client.post(&url).body(body.clone()).send(),
    );
    let (first, second) = (first?, second?);

    let mut statuses = [first.status().as_u16(), second.status().as_u16()];
    statuses.sort_unstable();
    assert_eq!(statuses, [200, 403]);

    let rejected = if first.status().as_u16() == 403 { first } else { second };
    let text = rejected.text().await?;
    assert!(text.contains("ERR1:NONCE_REUSE"), "got {text}");
    Ok(())
}

// -- S5: clock skew -----------------------------------------------------------

#[tokio::test]
async fn s5_stale_timestamp_is_rejected_without_mutation() -> anyhow::Result<()> {
    let (toond, client) = start().await?;
    let base = toond.base_url();
    let device = TestDevice::new("dev_1");
    register(&client, &base, &device).await?;

    let db = toond.open_db()?;
    let before: Option<String> = db.query_row(
        "SELECT last_seen_at FROM devices WHERE device_id = 'dev_1'",
        [],
        |r| r.get(0),
    )?;

    let stale = to_wire(Utc::now() - chrono::Duration::minutes(10));
    let body = device.signed_body(
        &[("HB1", "3600"), ("HB2", "healthy")],
        &stale,
        &device.next_nonce(),
    );
    let resp = client.post(format!("{base}/devices/heartbeat")).body(body).send().await?;
    assert_eq!(resp.status(), 400);
    let text = resp.text().await?;
    assert!(text.contains("ERR1:timestamp_invalid"), "got {text}");
    assert!(text.contains("RTO:60"), "got {text}");

    let after: Option<String> = db.query_row(
        "SELECT last_seen_at FROM devices WHERE device_id = 'dev_1'",
        [],
        |r| r.get(0),
    )?;
    assert_eq!(before, after);
    Ok(())
}

// -- S6: command lifecycle ----------------------------------------------------

#[tokio::test]
async fn s6_command_lifecycle_completes_exactly_once() -> anyhow::Result<()> {
    let (toond, client) = start().await?;
    let base = toond.base_url();
    let device = TestDevice::new("dev_1");
    register(&client, &base, &device).await?;

    // Operator issues cmd_x.
    let body = toon_wire::typed::encode(&toon_wire::payload([
        ("D1", json!("dev_1")),
        ("CMD2", json!("REBOOT")),
        ("CMD3", json!({"delay": 5})),
    ]));
    let resp = client
        .post(format!("{base}/devices/command"))
        .bearer_auth(ADMIN_TOKEN)
        .body(body)
        .send()
        .await?;
    assert_eq!(resp.status(), 200);
    let issued = toon_wire::typed::decode(&resp.text().await?)
        .map_err(|e| anyhow::anyhow!("bad issue response: {e}"))?;
    let command_id = issued["CMD1"].as_str().unwrap_or_default().to_owned();
    assert!(!command_id.is_empty());

    // Device polls and sees it, server-signed.
    let query = device.signed_query(&now_ts(), &device.next_nonce());
    let resp = client
        .get(format!("{base}/devices/commands"))
        .query(&query)
        .send()
        .await?;
    assert_eq!(resp.status(), 200);
    let text = resp.text().await?;
    assert!(text.contains(&format!("CMD[0].CMD1:{command_id}")), "got {text}");
    assert!(text.contains("CMD[0].SIG_SERV:"), "got {text}");

    // First ack completes the command.
    let body = device.signed_body(
        &[("CMD1", &command_id), ("ACK1", "OK"), ("ACK3", "250")],
        &now_ts(),
        &device.next_nonce(),
    );
    let resp = client.post(format!("{base}/devices/command-ack")).body(body).send().await?;
    assert_eq!(resp.status(), 200);
    assert!(resp.text().await?.contains("S1:ok"));

    let db = toond.open_db()?;
    let (status, completed_at): (String, Option<String>) = db.query_row(
        "SELECT status, completed_at FROM device_commands WHERE command_id = ?1",
        [&command_id],
        |r| Ok((r.get(0)?, r.get(1)?)),
    )?;
    assert_eq!(status, "completed");
    let first_completed_at = completed_at;

    // Re-ack: still ok, nothing moves.
    let body = device.signed_body(
        &[("CMD1", &command_id), ("ACK1", "OK")],
        &now_ts(),
        &device.next_nonce(),
    );
    let resp = client.post(format!("{base}/devices/command-ack")).body(body).send().await?;
    assert_eq!(resp.status(), 200);
    assert!(resp.text().await?.contains("S1:ok"));

    let (status, completed_at): (String, Option<String>) = db.query_row(
        "SELECT status, completed_at FROM device_commands WHERE command_id = ?1",
        [&command_id],
        |r| Ok((r.get(0)?, r.get(1)?)),
    )?;
    assert_eq!(status, "completed");
    assert_eq!(completed_at, first_completed_at);

    // The queue is empty again.
    let query = device.signed_query(&now_ts(), &device.next_nonce());
    let resp = client
        .get(format!("{base}/devices/commands"))
        .query(&query)
        .send()
        .await?;
    assert!(resp.text().await?.starts_with("S1:no_commands"));
    Ok(())
}

// -- Firmware loop ------------------------------------------------------------

#[tokio::test]
async fn firmware_check_offers_then_ack_applies() -> anyhow::Result<()> {
    let (toond, client) = start().await?;
    let base = toond.base_url();
    let device = TestDevice::new("dev_1");
    register(&client, &base, &device).await?;

    // Publish 1.1.0 for kiosks.
    let body = toon_wire::typed::encode(&toon_wire::payload([
        ("FW2", json!("1.1.0")),
        ("FW3", json!("deadbeef")),
        ("FW4", json!(1_048_576)),
        ("FW5", json!("/firmware/{id}/bundle")),
        ("FW6", json!("KIOSK")),
    ]));
    let resp = client
        .post(format!("{base}/firmware/publish"))
        .bearer_auth(ADMIN_TOKEN)
        .body(body)
        .send()
        .await?;
    assert_eq!(resp.status(), 200);
    let published = toon_wire::typed::decode(&resp.text().await?)
        .map_err(|e| anyhow::anyhow!("bad publish response: {e}"))?;
    let firmware_id = published["FW1"].as_str().unwrap_or_default().to_owned();

    // Device on 1.0.0 gets the offer with a download token.
    let body = device.signed_body(&[("FW2", "1.0.0")], &now_ts(), &device.next_nonce());
    let resp = client.post(format!("{base}/devices/firmware/check")).body(body).send().await?;
    assert_eq!(resp.status(), 200);
    let text = resp.text().await?;
    assert!(text.contains(&format!("FW1:{firmware_id}")), "got {text}");
    assert!(text.contains("O1:"), "got {text}");
    assert!(text.contains("token="), "got {text}");

    // Successful ack bumps the recorded firmware version.
    let body = device.signed_body(
        &[("FW1", &firmware_id), ("FW2", "1.1.0"), ("ACK1", "OK")],
        &now_ts(),
        &device.next_nonce(),
    );
    let resp = client.post(format!("{base}/devices/firmware/ack")).body(body).send().await?;
    assert_eq!(resp.status(), 200);

    let db = toond.open_db()?;
    let version: Option<String> = db.query_row(
        "SELECT firmware_version FROM devices WHERE device_id = 'dev_1'",
        [],
        |r| r.get(0),
    )?;
    assert_eq!(version.as_deref(), Some("1.1.0"));

    // A second check is now up to date.
    let body = device.signed_body(&[("FW2", "1.1.0")], &now_ts(), &device.next_nonce());
    let resp = client.post(format!("{base}/devices/firmware/check")).body(body).send().await?;
    let text = resp.text().await?;
    assert!(text.contains("S1:no_update"), "got {text}");
    assert!(text.contains("RTO:3600"), "got {text}");
    Ok(())
}
