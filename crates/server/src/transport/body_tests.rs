// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use axum::http::HeaderMap;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bytes::Bytes;

use crate::error::ErrorKind;

use super::read_toon_body;

#[test]
fn plain_utf8_passes_through() {
    let body = Bytes::from_static(b"D1:dev_1|HB1:77");
    let text = read_toon_body(&HeaderMap::new(), &body).unwrap();
    assert_eq!(text, "D1:dev_1|HB1:77");
}

#[test]
fn base64_tagged_bodies_are_decoded() {
    let mut headers = HeaderMap::new();
    headers.insert("content-transfer-encoding", "base64".parse().unwrap());
    let body = Bytes::from(STANDARD.encode("D1:dev_1|HB1:77"));

    let text = read_toon_body(&headers, &body).unwrap();
    assert_eq!(text, "D1:dev_1|HB1:77");
}

#[test]
fn base64_with_line_wrapping_is_accepted() {
    let mut headers = HeaderMap::new();
    headers.insert("content-transfer-encoding", "BASE64".parse().unwrap());
    let encoded = STANDARD.encode("D1:dev_1|HB1:77");
    let wrapped = format!("{}\r\n{}", &encoded[..8], &encoded[8..]);

    let text = read_toon_body(&headers, &Bytes::from(wrapped)).unwrap();
    assert_eq!(text, "D1:dev_1|HB1:77");
}

#[test]
fn invalid_base64_is_corrupted() {
    let mut headers = HeaderMap::new();
    headers.insert("content-transfer-encoding", "base64".parse().unwrap());
    let err = read_toon_body(&headers, &Bytes::from_static(b"!!!")).unwrap_err();
    assert_eq!(err, ErrorKind::PayloadCorrupted);
}

#[test]
fn invalid_utf8_is_corrupted() {
    let err = read_toon_body(&HeaderMap::new(), &Bytes::from_static(&[0xff, 0xfe])).unwrap_err();
    assert_eq!(err, ErrorKind::PayloadCorrupted);
}
