// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt;

use serde_json::json;
use toon_wire::Payload;

/// Classified request/processing failures, carrying their propagation
/// context: wire code, HTTP status, detail, and retry hint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    EmptyPayload,
    PayloadCorrupted,
    MissingTokens(Vec<String>),
    InvalidEventType(String),
    InvalidTimestampFormat(String),
    InvalidLocationFormat,
    InvalidDeviceType(String),
    DeviceNotFound,
    DeviceRevoked,
    /// Device timestamp outside the accepted skew window.
    TimestampSkew,
    NonceReuse,
    SignatureInvalid,
    /// Fixed-window cap exceeded; retry after the given seconds.
    RateLimited(u64),
    DuplicateEvent,
    UnknownEmployee(String),
    Unauthorized,
    ReportNotFound,
    ReportNotReady,
    FirmwareNotFound,
    Internal(String),
}

impl ErrorKind {
    /// Wire code carried in the `ERR1` token.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EmptyPayload => "empty_payload",
            Self::PayloadCorrupted => "payload_corrupted",
            Self::MissingTokens(_) => "missing_tokens",
            Self::InvalidEventType(_) => "invalid_event_type",
            Self::InvalidTimestampFormat(_) => "invalid_timestamp_format",
            Self::InvalidLocationFormat => "invalid_location_format",
            Self::InvalidDeviceType(_) => "invalid_device_type",
            Self::DeviceNotFound => "device_not_found",
            Self::DeviceRevoked => "device_revoked",
            Self::TimestampSkew => "timestamp_invalid",
            Self::NonceReuse => "NONCE_REUSE",
            Self::SignatureInvalid => "SIG_INVALID",
            Self::RateLimited(_) => "RATE_LIMIT",
            Self::DuplicateEvent => "duplicate",
            Self::UnknownEmployee(_) => "unknown_employee",
            Self::Unauthorized => "unauthorized",
            Self::ReportNotFound => "report_not_found",
            Self::ReportNotReady => "report_not_ready",
            Self::FirmwareNotFound => "firmware_not_found",
            Self::Internal(_) => "internal_error",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            Self::EmptyPayload
            | Self::PayloadCorrupted
            | Self::MissingTokens(_)
            | Self::InvalidEventType(_)
            | Self::InvalidTimestampFormat(_)
            | Self::InvalidLocationFormat
            | Self::InvalidDeviceType(_)
            | Self::UnknownEmployee(_)
            | Self::TimestampSkew => 400,
            Self::DeviceNotFound | Self::SignatureInvalid | Self::Unauthorized => 401,
            Self::DeviceRevoked | Self::NonceReuse => 403,
            Self::ReportNotFound | Self::FirmwareNotFound => 404,
            Self::DuplicateEvent | Self::ReportNotReady => 409,
            Self::RateLimited(_) => 429,
            Self::Internal(_) => 500,
        }
    }

    /// Retry hint in seconds, rendered as the `RTO` token where present.
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            Self::TimestampSkew => Some(60),
            Self::RateLimited(secs) => Some(*secs),
            _ => None,
        }
    }

    /// Human-readable detail carried in `ERR2`. Never includes internals.
    pub fn detail(&self) -> Option<String> {
        match self {
            Self::MissingTokens(keys) => Some(keys.join(",")),
            Self::InvalidEventType(got) => Some(got.clone()),
            Self::InvalidTimestampFormat(got) => Some(got.clone()),
            Self::InvalidDeviceType(got) => Some(got.clone()),
            Self::UnknownEmployee(id) => Some(id.clone()),
            _ => None,
        }
    }

    /// Render as a TOON error payload: `ERR1`, optional `ERR2`/`RTO`.
    pub fn to_toon(&self) -> Payload {
        let mut out = toon_wire::payload([("ERR1", json!(self.as_str()))]);
        if let Some(detail) = self.detail() {
            out.insert("ERR2".to_owned(), json!(detail));
        }
        if let Some(secs) = self.retry_after() {
            out.insert("RTO".to_owned(), json!(secs));
        }
        out
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.detail() {
            Some(detail) => write!(f, "{}: {detail}", self.as_str()),
            None => f.write_str(self.as_str()),
        }
    }
}

impl std::error::Error for ErrorKind {}

impl From<toon_wire::ToonError> for ErrorKind {
    fn from(err: toon_wire::ToonError) -> Self {
        tracing::debug!(err = %err, "payload decode failed");
        Self::PayloadCorrupted
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
