// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! TOON request/response body plumbing.
//!
//! Bodies are always TOON text (`application/toon` or `text/plain`); binary
//! transports may wrap them with `Content-Transfer-Encoding: base64`.

use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bytes::Bytes;
use toon_wire::{typed, Payload};

use crate::error::ErrorKind;
use crate::respond;

pub const CONTENT_TYPE_TOON: &str = "application/toon";

/// Header carrying the TOON summary next to binary report bodies.
pub const X_TOON_RESP: &str = "x-toon-resp";

/// Decode the request body to TOON text, honouring the base64 tag.
pub fn read_toon_body(headers: &HeaderMap, body: &Bytes) -> Result<String, ErrorKind> {
    let bytes: Vec<u8> = match headers.get("content-transfer-encoding") {
        Some(value) if value.as_bytes().eq_ignore_ascii_case(b"base64") => {
            let raw: Vec<u8> =
                body.iter().copied().filter(|b| !b.is_ascii_whitespace()).collect();
            STANDARD.decode(raw).map_err(|_| ErrorKind::PayloadCorrupted)?
        }
        _ => body.to_vec(),
    };
    String::from_utf8(bytes).map_err(|_| ErrorKind::PayloadCorrupted)
}

fn toon_response(status: StatusCode, body: String) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE_TOON))],
        body,
    )
        .into_response()
}

/// 200 with a raw pre-assembled body (batch responses, poll queues).
pub fn device_raw(body: String) -> Response {
    toon_response(StatusCode::OK, body)
}

/// Error response in the legacy template (device-facing).
pub fn device_error(kind: &ErrorKind, ts: &str) -> Response {
    let status =
        StatusCode::from_u16(kind.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    toon_response(status, respond::render_device(&respond::error_payload(kind, ts)))
}

/// 200 with a typed-dialect body (operator-facing).
pub fn typed_ok(payload: &Payload) -> Response {
    toon_response(StatusCode::OK, typed::encode(payload))
}

/// Error response in the typed dialect (operator-facing).
pub fn typed_error(kind: &ErrorKind, ts: &str) -> Response {
    let status =
        StatusCode::from_u16(kind.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    toon_response(status, typed::encode(&respond::error_payload(kind, ts)))
}

/// Binary download with the TOON summary in `X-TOON-RESP`.
pub fn binary_with_toon(
    content_type: &'static str,
    summary: &Payload,
    bytes: Vec<u8>,
) -> Response {
    let header_value = HeaderValue::from_str(&typed::encode(summary))
        .unwrap_or_else(|_| HeaderValue::from_static("string:S1:ok"));
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(content_type)),
            (header::HeaderName::from_static(X_TOON_RESP), header_value),
        ],
        bytes,
    )
        .into_response()
}

#[cfg(test)]
#[path = "body_tests.rs"]
mod tests;
