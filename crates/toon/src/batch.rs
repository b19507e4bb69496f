// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Batch framing: independent payloads concatenated with `||`.

use crate::error::ToonError;
use crate::token::{Dialect, BATCH_SEP};
use crate::Payload;

/// Decode a batch into its payloads, dropping empty fragments.
///
/// Dialect detection runs per payload; a batch may in principle mix
/// dialects, though no deployed client does.
pub fn decode(input: &str) -> Result<Vec<Payload>, ToonError> {
    input
        .split(BATCH_SEP)
        .filter(|frag| !frag.is_empty())
        .map(crate::decode)
        .filter(|r| !matches!(r, Ok(p) if p.is_empty()))
        .collect()
}

/// Encode payloads as a batch in the given dialect.
pub fn encode(payloads: &[Payload], dialect: Dialect) -> String {
    let parts: Vec<String> = payloads.iter().map(|p| crate::encode(p, dialect)).collect();
    parts.join(BATCH_SEP)
}

#[cfg(test)]
#[path = "batch_tests.rs"]
mod tests;
