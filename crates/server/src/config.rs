// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the toond protocol server.
#[derive(Debug, Clone, clap::Args)]
pub struct ServerConfig {
    /// Host to bind on.
    #[arg(long, default_value = "127.0.0.1", env = "TOOND_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 9700, env = "TOOND_PORT")]
    pub port: u16,

    /// SQLite database path. `:memory:` keeps everything in-process.
    #[arg(long, default_value = "toond.db", env = "TOOND_DB")]
    pub db_path: String,

    /// Database connection pool size.
    #[arg(long, default_value_t = 4, env = "TOOND_DB_POOL")]
    pub db_pool_size: usize,

    /// Path to the server Ed25519 signing key (PKCS#8 PEM). If unset, an
    /// ephemeral key is generated at startup and its public half logged.
    #[arg(long, env = "TOOND_SERVER_KEY")]
    pub server_key: Option<PathBuf>,

    /// Server signing key as base64 of the raw 32-byte seed. Takes
    /// precedence over `--server-key`.
    #[arg(long, env = "TOOND_SERVER_KEY_B64")]
    pub server_key_b64: Option<String>,

    /// Bearer token for the operator API. If unset, operator routes reject
    /// every request.
    #[arg(long, env = "TOOND_ADMIN_TOKEN")]
    pub admin_token: Option<String>,

    /// Company (tenant) that self-registering devices are assigned to.
    #[arg(long, default_value = "default", env = "TOOND_COMPANY")]
    pub company_id: String,

    /// Directory where generated report files are written.
    #[arg(long, default_value = "reports", env = "TOOND_REPORT_DIR")]
    pub report_dir: PathBuf,

    /// Directory served for firmware bundle downloads.
    #[arg(long, env = "TOOND_FIRMWARE_DIR")]
    pub firmware_dir: Option<PathBuf>,

    /// Accepted clock skew between device and server, in seconds.
    #[arg(long, default_value_t = 300, env = "TOOND_MAX_SKEW_SECS")]
    pub max_skew_secs: i64,

    /// Nonce time-to-live in seconds.
    #[arg(long, default_value_t = 86_400, env = "TOOND_NONCE_TTL_SECS")]
    pub nonce_ttl_secs: i64,

    /// Nonce purge sweep interval in milliseconds.
    #[arg(long, default_value_t = 60_000, env = "TOOND_NONCE_SWEEP_MS")]
    pub nonce_sweep_ms: u64,

    /// Command expiry scan interval in milliseconds.
    #[arg(long, default_value_t = 30_000, env = "TOOND_COMMAND_SCAN_MS")]
    pub command_scan_ms: u64,

    /// Heartbeat rate-limit cap per device per window.
    #[arg(long, default_value_t = 100, env = "TOOND_HEARTBEAT_CAP")]
    pub heartbeat_cap: u32,

    /// Rate-limit window length in seconds.
    #[arg(long, default_value_t = 3_600, env = "TOOND_RATE_WINDOW_SECS")]
    pub rate_window_secs: i64,

    /// Firmware download token lifetime in seconds.
    #[arg(long, default_value_t = 900, env = "TOOND_FW_TOKEN_TTL_SECS")]
    pub fw_token_ttl_secs: i64,
}

impl ServerConfig {
    pub fn nonce_sweep_interval(&self) -> Duration {
        Duration::from_millis(self.nonce_sweep_ms)
    }

    pub fn command_scan_interval(&self) -> Duration {
        Duration::from_millis(self.command_scan_ms)
    }

    /// Defaults suitable for tests: in-memory DB, fast sweeps, no auth.
    pub fn for_tests() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 0,
            db_path: ":memory:".to_owned(),
            db_pool_size: 1,
            server_key: None,
            server_key_b64: None,
            admin_token: None,
            company_id: "default".to_owned(),
            report_dir: std::env::temp_dir().join("toond-reports"),
            firmware_dir: None,
            max_skew_secs: 300,
            nonce_ttl_secs: 86_400,
            nonce_sweep_ms: 60_000,
            command_scan_ms: 60_000,
            heartbeat_cap: 100,
            rate_window_secs: 3_600,
            fw_token_ttl_secs: 900,
        }
    }
}
