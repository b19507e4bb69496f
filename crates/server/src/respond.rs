// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Response payload assembly shared by handlers and the audit trail.

use serde_json::json;
use toon_wire::Payload;

use crate::error::ErrorKind;

/// Universal success shape: `S1:ok` plus the server timestamp.
pub fn ok_payload(ts: &str) -> Payload {
    toon_wire::payload([("S1", json!("ok")), ("TS", json!(ts))])
}

/// Universal error shape: `ERR1` (+ `ERR2`/`RTO`) plus the server timestamp.
pub fn error_payload(kind: &ErrorKind, ts: &str) -> Payload {
    let mut out = kind.to_toon();
    out.insert("TS".to_owned(), json!(ts));
    out
}

/// Render a device-facing response payload.
///
/// Responses are templates, not round-trip values: `TS:2025-01-01T09:00:00Z`
/// must keep its colons (only the first colon in a token separates key from
/// value), so this renderer escapes the characters that would derail the
/// legacy heuristics — `|`, `;`, `,`, `=` — and nothing else.
pub fn render_device(payload: &Payload) -> String {
    let tokens: Vec<String> =
        payload.iter().map(|(k, v)| format!("{k}:{}", render_value(v))).collect();
    tokens.join("|")
}

fn render_value(value: &serde_json::Value) -> String {
    use serde_json::Value;
    match value {
        Value::Null => "null".to_owned(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => escape_template(s),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().map(render_value).collect();
            parts.join(";")
        }
        Value::Object(map) => {
            let parts: Vec<String> =
                map.iter().map(|(k, v)| format!("{k}={}", render_value(v))).collect();
            parts.join(",")
        }
    }
}

fn escape_template(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '|' | ';' | ',' | '=' => '_',
            c => c,
        })
        .collect()
}
