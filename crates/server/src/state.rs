// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::clock::{self, Clock};
use crate::config::ServerConfig;
use crate::crypto::ServerSigner;
use crate::hooks::HookBus;
use crate::nonce::NonceStore;
use crate::store::Db;

/// Explicit dependency record handed to every handler. There are no
/// process-wide singletons; tests build one of these with a pinned clock
/// and an in-memory database.
pub struct Deps {
    pub config: ServerConfig,
    pub db: Db,
    pub hooks: HookBus,
    pub nonces: NonceStore,
    pub signer: ServerSigner,
    pub clock: Arc<dyn Clock>,
    pub shutdown: CancellationToken,
}

pub type SharedState = Arc<Deps>;

impl Deps {
    pub fn new(
        config: ServerConfig,
        db: Db,
        signer: ServerSigner,
        clock: Arc<dyn Clock>,
        shutdown: CancellationToken,
    ) -> Self {
        let nonces = NonceStore::new(db.clone(), config.nonce_ttl_secs);
        Self { config, db, hooks: HookBus::new(), nonces, signer, clock, shutdown }
    }

    /// Current server time in wire form.
    pub fn now_wire(&self) -> String {
        clock::to_wire(self.clock.now())
    }
}

impl std::fmt::Debug for Deps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deps").field("company", &self.config.company_id).finish()
    }
}
