// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! TOON wire format: plain-text, typed, order-independent key/value tokens.
//!
//! Two dialects share one lexer. The legacy dialect (`KEY:VALUE|...`) infers
//! value types heuristically and is the compatibility contract for deployed
//! edge devices. The typed dialect (`TYPE:KEY:VALUE|...`) carries an explicit
//! type tag per token and reconstructs nested graphs from dotted/bracketed
//! key paths. [`decode`] auto-detects which dialect a payload is written in.
//!
//! The [`canonical`] module renders the deterministic byte string over a
//! token set that device and server sign.

pub mod batch;
pub mod canonical;
pub mod error;
pub mod legacy;
pub mod token;
pub mod typed;

pub use error::ToonError;
pub use token::{detect, Dialect, ToonType};

use indexmap::IndexMap;
use serde_json::Value;

/// One decoded payload: root keys to values, insertion-ordered.
///
/// Semantic interpretation never depends on the order, but preserving it
/// keeps encode/decode stable and responses readable in transcripts.
pub type Payload = IndexMap<String, Value>;

/// Decode a single payload, auto-detecting the dialect.
pub fn decode(input: &str) -> Result<Payload, ToonError> {
    match token::detect(input) {
        Dialect::Typed => typed::decode(input),
        Dialect::Legacy => legacy::decode(input),
    }
}

/// Encode a payload in the given dialect.
pub fn encode(payload: &Payload, dialect: Dialect) -> String {
    match dialect {
        Dialect::Typed => typed::encode(payload),
        Dialect::Legacy => legacy::encode(payload),
    }
}

/// Convenience constructor for building payloads in handler code.
pub fn payload<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Payload
where
    K: Into<String>,
    V: Into<Value>,
{
    entries.into_iter().map(|(k, v)| (k.into(), v.into())).collect()
}
