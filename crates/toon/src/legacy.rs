// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Legacy untyped dialect: `KEY:VALUE|KEY:VALUE|...`.
//!
//! Values are parsed heuristically: null/boolean/number literals, then
//! `;`-separated arrays, then `,`-separated `k=v` objects, otherwise string.
//! Encoding replaces delimiter characters in strings with `_`, which is
//! lossy by contract; fields that must round-trip exactly use the typed
//! dialect instead.

use serde_json::{Map, Number, Value};

use crate::error::ToonError;
use crate::token::{fragments, FIELD_SEP, TOKEN_SEP};
use crate::Payload;

/// Decode a legacy payload into a key/value map.
pub fn decode(input: &str) -> Result<Payload, ToonError> {
    let mut out = Payload::new();
    for frag in fragments(input) {
        let (key, raw) = frag
            .split_once(FIELD_SEP)
            .ok_or_else(|| ToonError::MalformedToken(frag.to_owned()))?;
        if key.is_empty() {
            return Err(ToonError::MalformedToken(frag.to_owned()));
        }
        out.insert(key.to_owned(), parse_value(raw));
    }
    Ok(out)
}

/// Encode a payload in the legacy dialect.
pub fn encode(payload: &Payload) -> String {
    let tokens: Vec<String> =
        payload.iter().map(|(k, v)| format!("{k}{FIELD_SEP}{}", encode_value(v))).collect();
    tokens.join(&TOKEN_SEP.to_string())
}

/// Heuristic value parse, applied recursively to array elements and object
/// member values.
pub fn parse_value(raw: &str) -> Value {
    match raw {
        "null" => return Value::Null,
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    if is_number(raw) {
        return parse_number(raw);
    }
    if raw.contains(';') {
        let items: Vec<Value> =
            raw.split(';').filter(|e| !e.is_empty()).map(parse_value).collect();
        return Value::Array(items);
    }
    if looks_like_object(raw) {
        let mut map = Map::new();
        for pair in raw.split(',') {
            if let Some((k, v)) = pair.split_once('=') {
                map.insert(k.to_owned(), parse_value(v));
            }
        }
        return Value::Object(map);
    }
    Value::String(strip_quotes(raw).to_owned())
}

/// Encode one value as legacy text. Exposed for callers that assemble
/// template responses token by token.
pub fn encode_value(value: &Value) -> String {
    match value {
        Value::Null => "null".to_owned(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => escape(s),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().map(encode_value).collect();
            parts.join(";")
        }
        Value::Object(map) => {
            let parts: Vec<String> =
                map.iter().map(|(k, v)| format!("{}={}", escape(k), encode_value(v))).collect();
            parts.join(",")
        }
    }
}

/// `^-?\d+(\.\d+)?$` without a regex: optional sign, digits, optional
/// fraction with at least one digit.
fn is_number(s: &str) -> bool {
    let digits = s.strip_prefix('-').unwrap_or(s);
    let (int, frac) = match digits.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (digits, None),
    };
    let all_digits = |p: &str| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit());
    all_digits(int) && frac.is_none_or(all_digits)
}

fn parse_number(raw: &str) -> Value {
    if !raw.contains('.') {
        if let Ok(n) = raw.parse::<i64>() {
            return Value::Number(Number::from(n));
        }
    }
    raw.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        // Out-of-range literals keep their textual form rather than lose digits.
        .unwrap_or_else(|| Value::String(raw.to_owned()))
}

/// Object form: every comma-separated fragment is a non-empty `k=v` pair.
fn looks_like_object(raw: &str) -> bool {
    !raw.is_empty()
        && raw.contains('=')
        && raw.split(',').all(|p| p.split_once('=').is_some_and(|(k, _)| !k.is_empty()))
}

/// Strip one layer of matching outer single or double quotes.
fn strip_quotes(raw: &str) -> &str {
    let bytes = raw.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if first == last && (first == b'"' || first == b'\'') {
            return &raw[1..raw.len() - 1];
        }
    }
    raw
}

/// Delimiter characters cannot survive the legacy dialect; they become `_`.
fn escape(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '|' | ':' | ';' | ',' | '=' => '_',
            c => c,
        })
        .collect()
}

#[cfg(test)]
#[path = "legacy_tests.rs"]
mod tests;
