// SPDX-FileCopyrightText: 2026 Siteflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Siteflow sync engine.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level Siteflow configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SiteflowConfig {
    /// Process-level settings (logging).
    #[serde(default)]
    pub worker: WorkerConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Paginated source client settings.
    #[serde(default)]
    pub source: SourceConfig,

    /// Periodic sync settings.
    #[serde(default)]
    pub sync: SyncConfig,

    /// Retry and timeout policy for orchestrated runs.
    #[serde(default)]
    pub workflow: WorkflowConfig,
}

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Text,
}

/// Process-level configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WorkerConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Structured JSON lines or human-readable text.
    #[serde(default = "default_log_format")]
    pub log_format: LogFormat,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("siteflow").join("siteflow.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("siteflow.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// Upper bound the source accepts for `page_size`.
pub const MAX_PAGE_SIZE: u32 = 10;

/// HTTP client configuration for the paginated source.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SourceConfig {
    /// Per-request timeout for page fetches.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Timeout for the credential check performed at registration.
    #[serde(default = "default_verify_timeout_secs")]
    pub verify_timeout_secs: u64,

    /// Items requested per page (1..=10).
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
            verify_timeout_secs: default_verify_timeout_secs(),
            page_size: default_page_size(),
        }
    }
}

impl SourceConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn verify_timeout(&self) -> Duration {
        Duration::from_secs(self.verify_timeout_secs)
    }
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_verify_timeout_secs() -> u64 {
    8
}

fn default_page_size() -> u32 {
    MAX_PAGE_SIZE
}

/// Periodic sync (AutoSync) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SyncConfig {
    /// Dispatch a run for every registered site on an interval.
    #[serde(default = "default_autosync_enabled")]
    pub autosync_enabled: bool,

    /// Seconds between AutoSync cycles.
    #[serde(default = "default_autosync_interval_secs")]
    pub autosync_interval_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            autosync_enabled: default_autosync_enabled(),
            autosync_interval_secs: default_autosync_interval_secs(),
        }
    }
}

fn default_autosync_enabled() -> bool {
    true
}

fn default_autosync_interval_secs() -> u64 {
    60
}

/// Retry, backoff, and timeout policy for orchestrated runs.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WorkflowConfig {
    /// Timeout applied to each attempt of an entity-kind activity.
    #[serde(default = "default_activity_timeout_secs")]
    pub activity_timeout_secs: u64,

    /// Attempts per activity, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Backoff before the second attempt.
    #[serde(default = "default_initial_interval_ms")]
    pub initial_interval_ms: u64,

    /// Multiplier applied to the backoff after each failed attempt.
    #[serde(default = "default_backoff_coefficient")]
    pub backoff_coefficient: f64,

    /// Cap on any single backoff.
    #[serde(default = "default_max_interval_ms")]
    pub max_interval_ms: u64,

    /// Overall bound on one run, across all kinds and retries.
    #[serde(default = "default_run_timeout_secs")]
    pub run_timeout_secs: u64,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            activity_timeout_secs: default_activity_timeout_secs(),
            max_attempts: default_max_attempts(),
            initial_interval_ms: default_initial_interval_ms(),
            backoff_coefficient: default_backoff_coefficient(),
            max_interval_ms: default_max_interval_ms(),
            run_timeout_secs: default_run_timeout_secs(),
        }
    }
}

fn default_activity_timeout_secs() -> u64 {
    300
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_interval_ms() -> u64 {
    1_000
}

fn default_backoff_coefficient() -> f64 {
    2.0
}

fn default_max_interval_ms() -> u64 {
    30_000
}

fn default_run_timeout_secs() -> u64 {
    1_800
}
