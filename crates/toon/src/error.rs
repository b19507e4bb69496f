// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

/// Errors produced while decoding TOON payloads.
///
/// All variants surface on the wire as `payload_corrupted`; the distinctions
/// exist for logs and tests. Decoding never returns partial results.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ToonError {
    /// A token was structurally malformed for its dialect.
    #[error("malformed token: {0}")]
    MalformedToken(String),

    /// The type slot of a typed token named an unknown type.
    #[error("unknown token type: {0}")]
    UnknownType(String),

    /// A `number` token's value slot did not parse.
    #[error("invalid number: {0}")]
    InvalidNumber(String),

    /// A `boolean` token's value slot was neither `true` nor `false`.
    #[error("invalid boolean: {0}")]
    InvalidBoolean(String),

    /// A key path (`A.b`, `A[0].c`) failed to parse or contradicted the
    /// shape already built from earlier tokens.
    #[error("invalid key path: {0}")]
    InvalidPath(String),
}
