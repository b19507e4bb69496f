// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde_json::{json, Value};

use super::{decode, encode, parse_value};
use crate::payload;

#[test]
fn decodes_flat_event_tokens() {
    let map = decode("E1:emp_1|A1:evt_a|A2:IN|A3:2025-01-01T09:00:00Z|D1:dev_1").unwrap();
    assert_eq!(map["E1"], json!("emp_1"));
    assert_eq!(map["A2"], json!("IN"));
    assert_eq!(map["A3"], json!("2025-01-01T09:00:00Z"));
    assert_eq!(map.len(), 5);
}

#[yare::parameterized(
    null_literal    = { "null", json!(null) },
    true_literal    = { "true", json!(true) },
    false_literal   = { "false", json!(false) },
    integer         = { "42", json!(42) },
    negative        = { "-7", json!(-7) },
    decimal         = { "3.25", json!(3.25) },
    plain_string    = { "hello", json!("hello") },
    iso_timestamp   = { "2025-01-01T09:00:00Z", json!("2025-01-01T09:00:00Z") },
    quoted_string   = { "\"spaced out\"", json!("spaced out") },
    single_quoted   = { "'kiosk 7'", json!("kiosk 7") },
    version_string  = { "1.2.3", json!("1.2.3") },
    leading_zero_ok = { "007", json!(7) },
)]
fn scalar_heuristics(raw: &str, expected: Value) {
    assert_eq!(parse_value(raw), expected);
}

#[test]
fn semicolons_make_arrays() {
    assert_eq!(parse_value("a;b;c"), json!(["a", "b", "c"]));
    assert_eq!(parse_value("1;2;3"), json!([1, 2, 3]));
    // Empty elements are dropped, not kept as empty strings.
    assert_eq!(parse_value("a;;b"), json!(["a", "b"]));
}

#[test]
fn key_value_pairs_make_objects() {
    assert_eq!(parse_value("lat=52.1,lng=4.3"), json!({"lat": 52.1, "lng": 4.3}));
    assert_eq!(parse_value("ok=true"), json!({"ok": true}));
}

#[test]
fn pair_without_key_stays_string() {
    assert_eq!(parse_value("=v"), json!("=v"));
    assert_eq!(parse_value("a=1,broken"), json!("a=1,broken"));
}

#[test]
fn empty_fragments_are_ignored() {
    let map = decode("A1:x||B1:y|").unwrap();
    assert_eq!(map.len(), 2);
}

#[test]
fn token_without_separator_is_malformed() {
    assert!(decode("A1:x|garbage").is_err());
    assert!(decode(":novalue").is_err());
}

#[test]
fn encode_inverts_decode_for_scalars() {
    let p = payload([
        ("A1", json!("evt_a")),
        ("N1", json!(42)),
        ("B1", json!(true)),
        ("Z1", json!(null)),
    ]);
    let wire = encode(&p);
    assert_eq!(wire, "A1:evt_a|N1:42|B1:true|Z1:null");
    assert_eq!(decode(&wire).unwrap(), p);
}

#[test]
fn encode_escapes_delimiters_lossily() {
    let p = payload([("M1", json!("a|b:c;d,e=f"))]);
    assert_eq!(encode(&p), "M1:a_b_c_d_e_f");
}

#[test]
fn arrays_and_objects_round_trip() {
    let p = payload([
        ("CAPS", json!(["FACE", "FINGERPRINT"])),
        ("L1", json!({"lat": 52.1, "lng": 4.3})),
    ]);
    let wire = encode(&p);
    assert_eq!(wire, "CAPS:FACE;FINGERPRINT|L1:lat=52.1,lng=4.3");
    assert_eq!(decode(&wire).unwrap(), p);
}

#[test]
fn oversized_integer_keeps_textual_form() {
    // Larger than i64: heuristics fall back to f64, and a non-finite parse
    // would keep the string. 20 digits fits f64 loosely; make sure we do not
    // panic and produce *something* stable.
    let v = parse_value("99999999999999999999");
    assert!(v.is_number() || v.is_string());
}
