// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test harness for end-to-end scenario tests.
//!
//! Spawns the real `toond` binary against a throwaway SQLite database and
//! exercises it over HTTP with signed device requests.

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::Duration;

/// Bearer token the harness configures for the operator surface.
pub const ADMIN_TOKEN: &str = "spec-token";

/// Resolve the path to the compiled `toond` binary.
pub fn toond_binary() -> PathBuf {
    let manifest = Path::new(env!("CARGO_MANIFEST_DIR"));
    // tests/specs → tests → workspace root
    let workspace = manifest.parent().and_then(|p| p.parent()).unwrap_or(manifest);
    workspace.join("target").join("debug").join("toond")
}

/// Find a free TCP port by binding to :0 then releasing.
pub fn free_port() -> anyhow::Result<u16> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

/// A running `toond` process that is killed on drop.
pub struct ToondProcess {
    child: Child,
    port: u16,
    db_path: PathBuf,
    _dir: tempfile::TempDir,
}

impl ToondProcess {
    /// Spawn toond on a free port with a fresh database.
    pub fn start() -> anyhow::Result<Self> {
        let binary = toond_binary();
        anyhow::ensure!(binary.exists(), "toond binary not found at {}", binary.display());

        let dir = tempfile::tempdir()?;
        let port = free_port()?;
        let db_path = dir.path().join("toond.db");

        let child = Command::new(&binary)
            .args([
                "--host",
                "127.0.0.1",
                "--port",
                &port.to_string(),
                "--db-path",
                &db_path.to_string_lossy(),
                "--admin-token",
                ADMIN_TOKEN,
                "--report-dir",
                &dir.path().join("reports").to_string_lossy(),
            ])
            .env("RUST_LOG", "warn")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        Ok(Self { child, port, db_path, _dir: dir })
    }

    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    /// Open the server's database for row-level assertions. WAL mode lets
    /// this second connection read while the server keeps writing.
    pub fn open_db(&self) -> anyhow::Result<rusqlite::Connection> {
        let conn = rusqlite::Connection::open(&self.db_path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Ok(conn)
    }

    /// Poll `/health` until the server answers.
    pub async fn wait_healthy(&self, timeout: Duration) -> anyhow::Result<()> {
        let client = reqwest::Client::new();
        let url = format!("{}/health", self.base_url());
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if tokio::time::Instant::now() > deadline {
                anyhow::bail!("toond did not become healthy within {timeout:?}");
            }
            if let Ok(resp) = client.get(&url).send().await {
                if resp.status().is_success() {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
}

impl Drop for ToondProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
