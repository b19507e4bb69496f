// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persistence layer: a bounded SQLite connection pool plus one module per
//! table family. Multi-step invariants run inside explicit transactions on
//! a single pooled connection.

pub mod audit;
pub mod commands;
pub mod devices;
pub mod employees;
pub mod events;
pub mod firmware;
pub mod logs;
pub mod nonces;
pub mod ratelimit;
pub mod reports;
pub mod schema;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use rusqlite::Connection;
use tokio::sync::Semaphore;

use crate::error::ErrorKind;

/// Bounded connection pool. Connections are checked out under a semaphore
/// and every closure runs on the blocking pool, so async handlers never
/// hold a SQLite handle across an await point.
#[derive(Clone)]
pub struct Db {
    inner: Arc<DbInner>,
}

struct DbInner {
    connections: Mutex<Vec<Connection>>,
    permits: Arc<Semaphore>,
}

impl Db {
    /// Open (and migrate) the database at `path` with `pool_size`
    /// connections. `:memory:` is pinned to a single connection — separate
    /// in-memory connections would be separate databases.
    pub fn open(path: &str, pool_size: usize) -> anyhow::Result<Self> {
        let size = if path == ":memory:" { 1 } else { pool_size.max(1) };
        let mut connections = Vec::with_capacity(size);
        for i in 0..size {
            let conn = Connection::open(path)?;
            conn.busy_timeout(Duration::from_secs(5))?;
            conn.pragma_update(None, "journal_mode", "WAL")?;
            conn.pragma_update(None, "foreign_keys", "ON")?;
            if i == 0 {
                schema::init(&conn)?;
            }
            connections.push(conn);
        }
        Ok(Self {
            inner: Arc::new(DbInner {
                connections: Mutex::new(connections),
                permits: Arc::new(Semaphore::new(size)),
            }),
        })
    }

    /// Run `f` against a pooled connection on the blocking pool.
    ///
    /// Store-level errors are internal by definition; domain outcomes such
    /// as "duplicate" are encoded in the closure's `Ok` type, never as
    /// errors crossing this boundary.
    pub async fn call<T, F>(&self, f: F) -> Result<T, ErrorKind>
    where
        F: FnOnce(&mut Connection) -> rusqlite::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let permit = Arc::clone(&self.inner.permits)
            .acquire_owned()
            .await
            .map_err(|_| ErrorKind::Internal("connection pool closed".to_owned()))?;

        let mut conn = {
            let mut pool = self
                .inner
                .connections
                .lock()
                .map_err(|_| ErrorKind::Internal("connection pool poisoned".to_owned()))?;
            match pool.pop() {
                Some(conn) => conn,
                None => {
                    permit.forget();
                    return Err(ErrorKind::Internal("connection pool drained".to_owned()));
                }
            }
        };

        let joined = tokio::task::spawn_blocking(move || {
            let result = f(&mut conn);
            (conn, result)
        })
        .await;

        match joined {
            Ok((conn, result)) => {
                if let Ok(mut pool) = self.inner.connections.lock() {
                    pool.push(conn);
                }
                drop(permit);
                result.map_err(|err| {
                    tracing::error!(err = %err, "database call failed");
                    ErrorKind::Internal("database error".to_owned())
                })
            }
            Err(join_err) => {
                // The connection died with the task; shrink capacity to match.
                permit.forget();
                tracing::error!(err = %join_err, "database task panicked");
                Err(ErrorKind::Internal("database task failed".to_owned()))
            }
        }
    }
}

impl std::fmt::Debug for Db {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Db").field("available", &self.inner.permits.available_permits()).finish()
    }
}

/// True when `err` is a unique/primary-key constraint violation; callers
/// translate those into domain outcomes (`duplicate`, `NONCE_REUSE`).
pub fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
