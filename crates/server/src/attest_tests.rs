// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::clock::{to_wire, Clock};
use crate::error::ErrorKind;
use crate::store::audit;
use crate::test_support::{test_deps, TestDevice};

use super::attest;

const ENDPOINT: &str = "/devices/heartbeat";

#[tokio::test]
async fn valid_request_passes_the_full_pipeline() {
    let (deps, clock) = test_deps();
    let device = TestDevice::new("dev_1");
    device.insert(&deps, clock.now()).await;

    let body = device.signed_body(
        &[("HB1", "77"), ("HB2", "idle")],
        &to_wire(clock.now()),
        &device.next_nonce(),
    );
    let attested = attest(&deps, ENDPOINT, &body, &["HB1", "HB2"]).await.unwrap();
    assert_eq!(attested.device.device_id, "dev_1");
    assert_eq!(super::token_str(&attested.tokens, "HB1").as_deref(), Some("77"));
}

#[tokio::test]
async fn empty_body_is_rejected_before_anything_else() {
    let (deps, _clock) = test_deps();
    let err = attest(&deps, ENDPOINT, "  ", &[]).await.unwrap_err();
    assert_eq!(err, ErrorKind::EmptyPayload);
}

#[tokio::test]
async fn missing_tokens_are_listed() {
    let (deps, clock) = test_deps();
    let device = TestDevice::new("dev_1");
    device.insert(&deps, clock.now()).await;

    let err = attest(&deps, ENDPOINT, "D1:dev_1|HB1:77", &["HB1", "HB2"]).await.unwrap_err();
    match err {
        ErrorKind::MissingTokens(keys) => {
            assert_eq!(keys, vec!["TS", "NONCE", "SIG1", "HB2"]);
        }
        other => panic!("expected MissingTokens, got {other:?}"),
    }
}

#[tokio::test]
async fn stale_timestamp_is_rejected_without_nonce_burn() {
    let (deps, clock) = test_deps();
    let device = TestDevice::new("dev_1");
    device.insert(&deps, clock.now()).await;

    let stale = to_wire(clock.now() - chrono::Duration::minutes(10));
    let nonce = device.next_nonce();
    let body = device.signed_body(&[], &stale, &nonce);
    let err = attest(&deps, ENDPOINT, &body, &[]).await.unwrap_err();
    assert_eq!(err, ErrorKind::TimestampSkew);
    assert_eq!(err.retry_after(), Some(60));

    // The nonce was never consumed: a corrected retry with the same nonce
    // succeeds.
    let body = device.signed_body(&[], &to_wire(clock.now()), &nonce);
    assert!(attest(&deps, ENDPOINT, &body, &[]).await.is_ok());
}

#[tokio::test]
async fn future_timestamps_are_equally_invalid() {
    let (deps, clock) = test_deps();
    let device = TestDevice::new("dev_1");
    device.insert(&deps, clock.now()).await;

    let future = to_wire(clock.now() + chrono::Duration::minutes(6));
    let body = device.signed_body(&[], &future, &device.next_nonce());
    let err = attest(&deps, ENDPOINT, &body, &[]).await.unwrap_err();
    assert_eq!(err, ErrorKind::TimestampSkew);
}

#[tokio::test]
async fn unknown_device_is_rejected() {
    let (deps, clock) = test_deps();
    let device = TestDevice::new("dev_ghost");

    let body = device.signed_body(&[], &to_wire(clock.now()), &device.next_nonce());
    let err = attest(&deps, ENDPOINT, &body, &[]).await.unwrap_err();
    assert_eq!(err, ErrorKind::DeviceNotFound);
}

#[tokio::test]
async fn revoked_device_is_rejected() {
    let (deps, clock) = test_deps();
    let device = TestDevice::new("dev_1");
    device.insert(&deps, clock.now()).await;
    deps.db
        .call(|conn| crate::store::devices::revoke(conn, "dev_1", "default"))
        .await
        .unwrap();

    let body = device.signed_body(&[], &to_wire(clock.now()), &device.next_nonce());
    let err = attest(&deps, ENDPOINT, &body, &[]).await.unwrap_err();
    assert_eq!(err, ErrorKind::DeviceRevoked);
}

#[tokio::test]
async fn replayed_nonce_is_rejected() {
    let (deps, clock) = test_deps();
    let device = TestDevice::new("dev_1");
    device.insert(&deps, clock.now()).await;

    let nonce = device.next_nonce();
    let body = device.signed_body(&[], &to_wire(clock.now()), &nonce);
    assert!(attest(&deps, ENDPOINT, &body, &[]).await.is_ok());

    let replay = device.signed_body(&[], &to_wire(clock.now()), &nonce);
    let err = attest(&deps, ENDPOINT, &replay, &[]).await.unwrap_err();
    assert_eq!(err, ErrorKind::NonceReuse);
}

#[tokio::test]
async fn tampered_token_fails_the_signature() {
    let (deps, clock) = test_deps();
    let device = TestDevice::new("dev_1");
    device.insert(&deps, clock.now()).await;

    let body = device.signed_body(&[("HB1", "77")], &to_wire(clock.now()), &device.next_nonce());
    let tampered = body.replace("HB1:77", "HB1:99");
    let err = attest(&deps, ENDPOINT, &tampered, &["HB1"]).await.unwrap_err();
    assert_eq!(err, ErrorKind::SignatureInvalid);
}

#[tokio::test]
async fn signature_from_another_device_key_fails() {
    let (deps, clock) = test_deps();
    let device = TestDevice::new("dev_1");
    device.insert(&deps, clock.now()).await;

    let imposter = TestDevice::new("dev_1");
    let body = imposter.signed_body(&[], &to_wire(clock.now()), &imposter.next_nonce());
    let err = attest(&deps, ENDPOINT, &body, &[]).await.unwrap_err();
    assert_eq!(err, ErrorKind::SignatureInvalid);
}

#[tokio::test]
async fn rejections_are_audited_with_the_verbatim_payload() {
    let (deps, clock) = test_deps();
    let device = TestDevice::new("dev_1");
    device.insert(&deps, clock.now()).await;

    let stale = to_wire(clock.now() - chrono::Duration::minutes(10));
    let body = device.signed_body(&[], &stale, &device.next_nonce());
    let _ = attest(&deps, ENDPOINT, &body, &[]).await;

    let entries = deps
        .db
        .call(|conn| audit::recent_for_device(conn, "dev_1", 10))
        .await
        .unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].inbound, body);
    assert_eq!(entries[0].status, "timestamp_invalid");
    assert!(entries[0].response.contains("ERR1:timestamp_invalid"));
    assert!(entries[0].response.contains("RTO:60"));
}

#[tokio::test]
async fn successful_requests_are_not_audited_by_the_pipeline() {
    let (deps, clock) = test_deps();
    let device = TestDevice::new("dev_1");
    device.insert(&deps, clock.now()).await;

    let body = device.signed_body(&[], &to_wire(clock.now()), &device.next_nonce());
    attest(&deps, ENDPOINT, &body, &[]).await.unwrap();

    let n = deps.db.call(|conn| audit::count_for_device(conn, "dev_1")).await.unwrap();
    assert_eq!(n, 0);
}
