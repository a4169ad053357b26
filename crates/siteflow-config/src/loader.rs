// SPDX-FileCopyrightText: 2026 Siteflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./siteflow.toml` > `~/.config/siteflow/siteflow.toml` >
//! `/etc/siteflow/siteflow.toml` with environment variable overrides via `SITEFLOW_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::SiteflowConfig;

/// Config sections addressable from environment variables.
const SECTIONS: &[&str] = &["worker", "storage", "source", "sync", "workflow"];

pub(crate) const SYSTEM_CONFIG: &str = "/etc/siteflow/siteflow.toml";
pub(crate) const LOCAL_CONFIG: &str = "siteflow.toml";

pub(crate) fn user_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("siteflow/siteflow.toml"))
        .unwrap_or_default()
}

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/siteflow/siteflow.toml` (system-wide)
/// 3. `~/.config/siteflow/siteflow.toml` (user XDG config)
/// 4. `./siteflow.toml` (local directory)
/// 5. `SITEFLOW_*` environment variables
pub fn load_config() -> Result<SiteflowConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<SiteflowConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(SiteflowConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<SiteflowConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(SiteflowConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used for XDG config loading, before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(SiteflowConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG))
        .merge(Toml::file(user_config_path()))
        .merge(Toml::file(LOCAL_CONFIG))
        .merge(env_provider())
}

/// Environment provider mapping `SITEFLOW_<SECTION>_<KEY>` to `<section>.<key>`.
///
/// Uses `Env::map()` rather than `Env::split("_")` so keys containing
/// underscores survive: `SITEFLOW_SYNC_AUTOSYNC_INTERVAL_SECS` maps to
/// `sync.autosync_interval_secs`.
fn env_provider() -> Env {
    Env::prefixed("SITEFLOW_").map(|key| map_env_key(key.as_str()).into())
}

/// Env keys keep the case they were set with; sections match lowercase.
pub(crate) fn map_env_key(key: &str) -> String {
    let key = key.to_ascii_lowercase();
    for section in SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|r| r.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_keys_map_to_sections() {
        assert_eq!(map_env_key("storage_database_path"), "storage.database_path");
        assert_eq!(
            map_env_key("sync_autosync_interval_secs"),
            "sync.autosync_interval_secs"
        );
        assert_eq!(map_env_key("workflow_max_attempts"), "workflow.max_attempts");
        assert_eq!(map_env_key("worker_log_format"), "worker.log_format");
        assert_eq!(map_env_key("unrelated"), "unrelated");
    }

    #[test]
    fn uppercase_env_keys_map_to_sections() {
        assert_eq!(map_env_key("WORKFLOW_MAX_ATTEMPTS"), "workflow.max_attempts");
        assert_eq!(
            map_env_key("SYNC_AUTOSYNC_INTERVAL_SECS"),
            "sync.autosync_interval_secs"
        );
    }
}
