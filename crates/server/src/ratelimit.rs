// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fixed-window rate limiting per `(device, endpoint)`.
//!
//! Counters live in the `rate_limits` table so a restart does not grant a
//! fresh window.

use crate::error::ErrorKind;
use crate::state::Deps;
use crate::store::ratelimit;

/// Count this request against the device's window; rejects with
/// `RATE_LIMIT` and a retry hint once the cap is exceeded.
pub async fn check(
    deps: &Deps,
    device_id: &str,
    endpoint: &str,
    cap: u32,
) -> Result<(), ErrorKind> {
    let window = deps.config.rate_window_secs.max(1);
    let now = deps.clock.now().timestamp();
    let window_start = now - now.rem_euclid(window);

    let (device, path) = (device_id.to_owned(), endpoint.to_owned());
    let count = deps
        .db
        .call(move |conn| ratelimit::increment(conn, &device, &path, window_start))
        .await?;

    if count > i64::from(cap) {
        let retry = (window_start + window - now).max(1) as u64;
        return Err(ErrorKind::RateLimited(retry));
    }
    Ok(())
}

/// Drop windows older than the previous one; called from the sweep loop.
pub async fn prune(deps: &Deps) -> Result<usize, ErrorKind> {
    let window = deps.config.rate_window_secs.max(1);
    let now = deps.clock.now().timestamp();
    let oldest = now - now.rem_euclid(window) - window;
    deps.db.call(move |conn| ratelimit::prune(conn, oldest)).await
}

#[cfg(test)]
#[path = "ratelimit_tests.rs"]
mod tests;
