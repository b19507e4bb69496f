// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Canonical string: the deterministic textual form of a token set that
//! devices and the server sign.
//!
//! The rule is dialect-independent and stable under token reordering:
//! signature-carrying keys are dropped, remaining keys are sorted by code
//! point, each renders as `KEY:VALUE`, and pairs join with `|`. The result
//! is a byte string for Ed25519, not a parseable payload.

use serde_json::Value;

use crate::Payload;

/// Keys never included in the signed form.
pub const SIGNATURE_KEYS: &[&str] = &["SIG1", "SIG_SERV", "raw_toon"];

/// Render the canonical string for a payload.
pub fn canonical_string(payload: &Payload) -> String {
    let mut keys: Vec<&str> = payload
        .keys()
        .map(String::as_str)
        .filter(|k| !SIGNATURE_KEYS.contains(k))
        .collect();
    keys.sort_unstable();

    let pairs: Vec<String> = keys
        .iter()
        .map(|k| format!("{k}:{}", render(&payload[*k])))
        .collect();
    pairs.join("|")
}

fn render(value: &Value) -> String {
    match value {
        Value::Null => "null".to_owned(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().map(render).collect();
            parts.join("|")
        }
        Value::Object(map) => {
            // serde_json maps iterate in sorted key order, which is exactly
            // the determinism the signed form needs.
            let parts: Vec<String> =
                map.iter().map(|(k, v)| format!("{k}={}", render(v))).collect();
            parts.join(",")
        }
    }
}

#[cfg(test)]
#[path = "canonical_tests.rs"]
mod tests;
