// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::clock::Clock;
use crate::store::devices;
use crate::test_support::{test_deps, TestDevice};
use crate::types::FirmwareState;

use super::{
    acknowledge, check, publish, release_canonical, verify_download_token, CheckOutcome,
    PublishRequest,
};

fn release(version: &str) -> PublishRequest {
    PublishRequest {
        version: version.to_owned(),
        device_type: "KIOSK".to_owned(),
        bundle_url_template: "/firmware/{id}/bundle".to_owned(),
        checksum: "deadbeef".to_owned(),
        size_bytes: 1_048_576,
        policy_id: None,
    }
}

async fn setup() -> (crate::state::SharedState, std::sync::Arc<crate::clock::FixedClock>, devices::DeviceRecord)
{
    let (deps, clock) = test_deps();
    let device = TestDevice::new("dev_1");
    device.insert(&deps, clock.now()).await;
    let record = deps.db.call(|conn| devices::get(conn, "dev_1")).await.unwrap().unwrap();
    (deps, clock, record)
}

#[tokio::test]
async fn published_release_is_signed() {
    let (deps, _clock, _device) = setup().await;
    let rec = publish(&deps, release("1.1.0")).await.unwrap();
    assert!(deps.signer.verify_own_b64(&release_canonical(&rec), &rec.server_signature));
}

#[tokio::test]
async fn check_offers_newer_release_with_valid_token() {
    let (deps, _clock, device) = setup().await;
    let rec = publish(&deps, release("1.1.0")).await.unwrap();

    // Device runs 1.0.0 (see TestDevice::insert).
    let outcome = check(&deps, &device, "1.0.0").await.unwrap();
    let CheckOutcome::Offer { release, url, token } = outcome else {
        panic!("expected an offer");
    };
    assert_eq!(release.firmware_id, rec.firmware_id);
    assert!(url.contains(&rec.firmware_id));
    assert!(url.contains("token="));

    let (fw, dev) = verify_download_token(&deps, &token).unwrap();
    assert_eq!(fw, rec.firmware_id);
    assert_eq!(dev, "dev_1");

    // The check parked the device in `checking`.
    let state = deps
        .db
        .call(|conn| crate::store::firmware::device_state(conn, "dev_1"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(state.1, "checking");
}

#[tokio::test]
async fn same_version_means_no_update() {
    let (deps, _clock, device) = setup().await;
    publish(&deps, release("1.0.0")).await.unwrap();
    assert!(matches!(check(&deps, &device, "1.0.0").await.unwrap(), CheckOutcome::UpToDate));
}

#[tokio::test]
async fn no_release_means_no_update() {
    let (deps, _clock, device) = setup().await;
    assert!(matches!(check(&deps, &device, "1.0.0").await.unwrap(), CheckOutcome::UpToDate));
}

#[tokio::test]
async fn expired_download_token_is_rejected() {
    let (deps, clock, device) = setup().await;
    publish(&deps, release("1.1.0")).await.unwrap();

    let CheckOutcome::Offer { token, .. } = check(&deps, &device, "1.0.0").await.unwrap() else {
        panic!("expected an offer");
    };
    assert!(verify_download_token(&deps, &token).is_some());

    clock.advance(chrono::Duration::seconds(901));
    assert!(verify_download_token(&deps, &token).is_none());
}

#[tokio::test]
async fn forged_download_token_is_rejected() {
    let (deps, _clock, _device) = setup().await;
    use base64::Engine as _;
    let forged = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .encode("fw_1|dev_1|9999999999|bm90LWEtc2ln");
    assert!(verify_download_token(&deps, &forged).is_none());
}

#[tokio::test]
async fn successful_ack_applies_and_bumps_device_version() {
    let (deps, _clock, device) = setup().await;
    let rec = publish(&deps, release("1.1.0")).await.unwrap();

    let state =
        acknowledge(&deps, &device, &rec.firmware_id, "1.1.0", "OK", None).await.unwrap();
    assert_eq!(state, FirmwareState::Applied);

    let dev = deps.db.call(|conn| devices::get(conn, "dev_1")).await.unwrap().unwrap();
    assert_eq!(dev.firmware_version.as_deref(), Some("1.1.0"));
}

#[tokio::test]
async fn failed_ack_emits_firmware_failure() {
    let (deps, _clock, device) = setup().await;
    let rec = publish(&deps, release("1.1.0")).await.unwrap();

    let hits = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let clone = std::sync::Arc::clone(&hits);
    deps.hooks.subscribe(crate::hooks::HookKind::FirmwareFailure, move |_| {
        let clone = std::sync::Arc::clone(&clone);
        async move {
            clone.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(())
        }
    });

    let state = acknowledge(
        &deps,
        &device,
        &rec.firmware_id,
        "1.1.0",
        "FAILED",
        Some("checksum mismatch".to_owned()),
    )
    .await
    .unwrap();
    assert_eq!(state, FirmwareState::Failed);
    assert_eq!(hits.load(std::sync::atomic::Ordering::SeqCst), 1);

    // Version stays where it was.
    let dev = deps.db.call(|conn| devices::get(conn, "dev_1")).await.unwrap().unwrap();
    assert_eq!(dev.firmware_version.as_deref(), Some("1.0.0"));
}
