// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde_json::json;

use super::{decode, encode};
use crate::token::Dialect;
use crate::payload;

#[test]
fn splits_on_double_pipe() {
    let batch = decode("E1:emp_1|A1:evt_a||E1:emp_1|A1:evt_b").unwrap();
    assert_eq!(batch.len(), 2);
    assert_eq!(batch[0]["A1"], json!("evt_a"));
    assert_eq!(batch[1]["A1"], json!("evt_b"));
}

#[test]
fn empty_fragments_are_dropped() {
    let batch = decode("A1:x||||A1:y||").unwrap();
    assert_eq!(batch.len(), 2);
}

#[test]
fn empty_input_is_an_empty_batch() {
    assert!(decode("").unwrap().is_empty());
}

#[test]
fn one_corrupt_payload_fails_the_whole_decode() {
    assert!(decode("A1:x||garbage-without-colon").is_err());
}

#[test]
fn encode_round_trips() {
    let payloads = vec![
        payload([("A1", json!("evt_a")), ("S1", json!("accepted"))]),
        payload([("A1", json!("evt_b")), ("S1", json!("duplicate"))]),
    ];
    let wire = encode(&payloads, Dialect::Legacy);
    assert_eq!(wire, "A1:evt_a|S1:accepted||A1:evt_b|S1:duplicate");
    assert_eq!(decode(&wire).unwrap(), payloads);
}
