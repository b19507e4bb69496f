// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test infrastructure: a deterministic dependency record and a
//! device simulator that signs requests the way real firmware does.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use toon_wire::{canonical, legacy};

use crate::clock::{to_wire, FixedClock};
use crate::config::ServerConfig;
use crate::crypto::{public_pem_from_raw_b64, ServerSigner};
use crate::state::{Deps, SharedState};
use crate::store::devices::{self, DeviceRecord};
use crate::store::Db;

/// The instant most fixtures pin their clock to.
pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).single().unwrap_or(DateTime::UNIX_EPOCH)
}

/// Build a dependency record over an in-memory database and a fixed clock.
pub fn test_deps() -> (SharedState, Arc<FixedClock>) {
    test_deps_with(ServerConfig::for_tests())
}

pub fn test_deps_with(config: ServerConfig) -> (SharedState, Arc<FixedClock>) {
    let clock = Arc::new(FixedClock::at(epoch()));
    let db = match Db::open(&config.db_path, config.db_pool_size) {
        Ok(db) => db,
        Err(err) => unreachable!("in-memory database must open: {err}"),
    };
    let deps = Deps::new(
        config,
        db,
        ServerSigner::generate(),
        Arc::clone(&clock) as Arc<dyn crate::clock::Clock>,
        CancellationToken::new(),
    );
    (Arc::new(deps), clock)
}

/// A simulated edge device: an Ed25519 identity plus request assembly.
pub struct TestDevice {
    pub device_id: String,
    key: ServerSigner,
    nonce_counter: std::sync::atomic::AtomicU64,
}

impl TestDevice {
    pub fn new(device_id: &str) -> Self {
        Self {
            device_id: device_id.to_owned(),
            key: ServerSigner::generate(),
            nonce_counter: std::sync::atomic::AtomicU64::new(0),
        }
    }

    pub fn public_raw_b64(&self) -> String {
        self.key.public_raw_b64()
    }

    pub fn public_pem(&self) -> String {
        public_pem_from_raw_b64(&self.key.public_raw_b64()).unwrap_or_default()
    }

    /// Insert this device straight into the store, bypassing registration.
    pub async fn insert(&self, deps: &Deps, at: DateTime<Utc>) {
        let rec = DeviceRecord {
            device_id: self.device_id.clone(),
            company_id: deps.config.company_id.clone(),
            device_type: "KIOSK".to_owned(),
            public_key_pem: self.public_pem(),
            capabilities: "FACE".to_owned(),
            firmware_version: Some("1.0.0".to_owned()),
            status: "active".to_owned(),
            policy_id: None,
            battery_pct: None,
            queue_depth: None,
            storage_free_mb: None,
            app_version: None,
            registered_at: to_wire(at),
            last_seen_at: None,
        };
        let result = deps.db.call(move |conn| devices::upsert_registration(conn, &rec)).await;
        assert!(result.is_ok(), "device insert failed: {result:?}");
    }

    /// A nonce that is unique per call for this device.
    pub fn next_nonce(&self) -> String {
        let n = self.nonce_counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        format!("nonce-{}-{n}", self.device_id)
    }

    /// Assemble a signed legacy-dialect request body.
    ///
    /// Token values are written verbatim (`KEY:VALUE` joined with `|`, the
    /// way firmware does it), so values may carry colons; the signature is
    /// computed over the canonical form of the decoded token set.
    pub fn signed_body(&self, tokens: &[(&str, &str)], ts: &str, nonce: &str) -> String {
        let mut wire = String::new();
        for (key, value) in tokens {
            push_token(&mut wire, key, value);
        }
        push_token(&mut wire, "D1", &self.device_id);
        push_token(&mut wire, "TS", ts);
        push_token(&mut wire, "NONCE", nonce);

        let sig = self.sign_wire(&wire);
        push_token(&mut wire, "SIG1", &sig);
        wire
    }

    /// Sign the canonical form of an assembled wire string.
    pub fn sign_wire(&self, wire: &str) -> String {
        let tokens = match legacy::decode(wire) {
            Ok(tokens) => tokens,
            Err(err) => unreachable!("test body must decode: {err}"),
        };
        self.key.sign_b64(&canonical::canonical_string(&tokens))
    }

    /// Signed attestation tokens for GET-style requests (query string form).
    pub fn signed_query(&self, ts: &str, nonce: &str) -> Vec<(String, String)> {
        let wire = {
            let mut w = String::new();
            push_token(&mut w, "D1", &self.device_id);
            push_token(&mut w, "TS", ts);
            push_token(&mut w, "NONCE", nonce);
            w
        };
        let sig = self.sign_wire(&wire);
        vec![
            ("D1".to_owned(), self.device_id.clone()),
            ("TS".to_owned(), ts.to_owned()),
            ("NONCE".to_owned(), nonce.to_owned()),
            ("SIG1".to_owned(), sig),
        ]
    }
}

fn push_token(wire: &mut String, key: &str, value: &str) {
    if !wire.is_empty() {
        wire.push('|');
    }
    wire.push_str(key);
    wire.push(':');
    wire.push_str(value);
}

/// Decode a device-facing response body into a token map.
pub fn decode_response(body: &str) -> toon_wire::Payload {
    match legacy::decode(body) {
        Ok(p) => p,
        Err(err) => unreachable!("response must decode: {err} ({body})"),
    }
}

/// Read a response token as text.
pub fn token(payload: &toon_wire::Payload, key: &str) -> String {
    match payload.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}
