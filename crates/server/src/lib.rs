// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! toond: TOON protocol server for biometric attendance fleets.
//!
//! Edge devices submit signed attendance events and heartbeats over the
//! legacy TOON dialect; operators drive the fleet over the typed dialect.
//! Everything device-originated passes the attestation pipeline (clock
//! skew, nonce, Ed25519 signature) before it touches state.

pub mod attest;
pub mod clock;
pub mod command;
pub mod config;
pub mod crypto;
pub mod error;
pub mod firmware;
pub mod hooks;
pub mod ingest;
pub mod nonce;
pub mod ratelimit;
pub mod reports;
pub mod respond;
pub mod state;
pub mod store;
pub mod test_support;
pub mod transport;
pub mod types;

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::clock::SystemClock;
use crate::config::ServerConfig;
use crate::crypto::ServerSigner;
use crate::state::{Deps, SharedState};
use crate::store::Db;

/// Run the server until shutdown.
pub async fn run(config: ServerConfig) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let shutdown = CancellationToken::new();

    let signer = load_signer(&config)?;
    let db = Db::open(&config.db_path, config.db_pool_size)
        .with_context(|| format!("failed to open database at {}", config.db_path))?;

    let deps: SharedState = Arc::new(Deps::new(
        config,
        db,
        signer,
        Arc::new(SystemClock),
        shutdown.clone(),
    ));
    tracing::info!(
        public_key = %deps.signer.public_raw_b64(),
        company = %deps.config.company_id,
        "server signing identity loaded"
    );

    spawn_maintenance(Arc::clone(&deps));
    spawn_signal_handler(shutdown.clone());

    let router = transport::build_router(Arc::clone(&deps));
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("toond listening on {addr}");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;

    Ok(())
}

/// Key precedence: raw seed env, then PEM file, then an ephemeral key.
fn load_signer(config: &ServerConfig) -> anyhow::Result<ServerSigner> {
    if let Some(ref seed) = config.server_key_b64 {
        return ServerSigner::from_seed_b64(seed);
    }
    if let Some(ref path) = config.server_key {
        let pem = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read server key at {}", path.display()))?;
        return ServerSigner::from_pem(&pem);
    }
    let signer = ServerSigner::generate();
    tracing::warn!(
        public_key = %signer.public_raw_b64(),
        "no server key configured; generated an ephemeral one (commands signed \
         with it will not verify after restart)"
    );
    Ok(signer)
}

/// Background sweeps: nonce purge, command expiry, rate-limit pruning.
/// Correctness never depends on these; they bound table growth and flip
/// overdue commands.
fn spawn_maintenance(deps: SharedState) {
    let nonce_deps = Arc::clone(&deps);
    tokio::spawn(async move {
        let interval = nonce_deps.config.nonce_sweep_interval();
        loop {
            tokio::select! {
                _ = nonce_deps.shutdown.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
            match nonce_deps.nonces.purge_expired(nonce_deps.clock.now()).await {
                Ok(purged) if purged > 0 => {
                    tracing::debug!(purged, "nonce sweep");
                }
                Ok(_) => {}
                Err(err) => tracing::warn!(err = %err, "nonce sweep failed"),
            }
            if let Err(err) = ratelimit::prune(&nonce_deps).await {
                tracing::warn!(err = %err, "rate-limit prune failed");
            }
        }
    });

    tokio::spawn(async move {
        let interval = deps.config.command_scan_interval();
        loop {
            tokio::select! {
                _ = deps.shutdown.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
            if let Err(err) = command::expire_due(&deps).await {
                tracing::warn!(err = %err, "command expiry scan failed");
            }
        }
    });
}

fn spawn_signal_handler(shutdown: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown requested");
            shutdown.cancel();
        }
    });
}
