// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bearer-token authentication for the operator surface.
//!
//! Tokens are opaque: the identity provider that mints them is out of
//! scope. The server only compares against its configured admin token.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, Request};
use axum::middleware::Next;
use axum::response::Response;

use crate::error::ErrorKind;
use crate::state::Deps;
use crate::transport::body;

/// Compare a presented secret against the configured one without
/// short-circuiting on the first differing byte; only the length check is
/// allowed to exit early.
fn secrets_match(expected: &str, presented: &str) -> bool {
    expected.len() == presented.len()
        && expected
            .bytes()
            .zip(presented.bytes())
            .fold(0u8, |diff, (a, b)| diff | (a ^ b))
            == 0
}

/// Validate a Bearer token from HTTP headers. A server without a
/// configured admin token refuses the whole operator surface.
pub fn validate_bearer(headers: &HeaderMap, expected: Option<&str>) -> Result<(), ErrorKind> {
    let Some(expected) = expected else {
        return Err(ErrorKind::Unauthorized);
    };

    let presented = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    match presented {
        Some(token) if secrets_match(expected, token) => Ok(()),
        _ => Err(ErrorKind::Unauthorized),
    }
}

/// Axum middleware guarding operator routes.
pub async fn operator_layer(
    State(deps): State<Arc<Deps>>,
    req: Request<axum::body::Body>,
    next: Next,
) -> Response {
    if let Err(kind) = validate_bearer(req.headers(), deps.config.admin_token.as_deref()) {
        return body::typed_error(&kind, &deps.now_wire());
    }
    next.run(req).await
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;
