// SPDX-FileCopyrightText: 2026 Siteflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.

use crate::diagnostic::ConfigError;
use crate::model::{MAX_PAGE_SIZE, SiteflowConfig};

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects every violation instead of failing fast.
pub fn validate_config(config: &SiteflowConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut invalid = |message: String| errors.push(ConfigError::Validation { message });

    if !LOG_LEVELS.contains(&config.worker.log_level.to_ascii_lowercase().as_str()) {
        invalid(format!(
            "worker.log_level must be one of {}, got `{}`",
            LOG_LEVELS.join(", "),
            config.worker.log_level
        ));
    }

    if config.storage.database_path.trim().is_empty() {
        invalid("storage.database_path must not be empty".to_string());
    }

    if config.source.page_size == 0 || config.source.page_size > MAX_PAGE_SIZE {
        invalid(format!(
            "source.page_size must be between 1 and {MAX_PAGE_SIZE}, got {}",
            config.source.page_size
        ));
    }

    if config.source.request_timeout_secs == 0 {
        invalid("source.request_timeout_secs must be greater than 0".to_string());
    }

    if config.source.verify_timeout_secs == 0 {
        invalid("source.verify_timeout_secs must be greater than 0".to_string());
    }

    if config.sync.autosync_interval_secs == 0 {
        invalid("sync.autosync_interval_secs must be greater than 0".to_string());
    }

    let workflow = &config.workflow;
    if workflow.max_attempts == 0 {
        invalid("workflow.max_attempts must be at least 1".to_string());
    }

    if workflow.activity_timeout_secs == 0 {
        invalid("workflow.activity_timeout_secs must be greater than 0".to_string());
    }

    if workflow.run_timeout_secs == 0 {
        invalid("workflow.run_timeout_secs must be greater than 0".to_string());
    }

    if !(workflow.backoff_coefficient >= 1.0 && workflow.backoff_coefficient.is_finite()) {
        invalid(format!(
            "workflow.backoff_coefficient must be a finite number >= 1.0, got {}",
            workflow.backoff_coefficient
        ));
    }

    if workflow.max_interval_ms < workflow.initial_interval_ms {
        invalid(format!(
            "workflow.max_interval_ms ({}) must not be less than workflow.initial_interval_ms ({})",
            workflow.max_interval_ms, workflow.initial_interval_ms
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn messages(config: &SiteflowConfig) -> Vec<String> {
        validate_config(config)
            .unwrap_err()
            .into_iter()
            .map(|e| e.to_string())
            .collect()
    }

    #[test]
    fn default_config_validates() {
        assert!(validate_config(&SiteflowConfig::default()).is_ok());
    }

    #[test]
    fn oversized_page_fails_validation() {
        let mut config = SiteflowConfig::default();
        config.source.page_size = 25;
        assert!(messages(&config).iter().any(|m| m.contains("source.page_size")));
    }

    #[test]
    fn zero_attempts_and_bad_backoff_are_both_reported() {
        let mut config = SiteflowConfig::default();
        config.workflow.max_attempts = 0;
        config.workflow.backoff_coefficient = 0.5;
        let msgs = messages(&config);
        assert!(msgs.iter().any(|m| m.contains("max_attempts")));
        assert!(msgs.iter().any(|m| m.contains("backoff_coefficient")));
    }

    #[test]
    fn inverted_backoff_bounds_fail() {
        let mut config = SiteflowConfig::default();
        config.workflow.initial_interval_ms = 5_000;
        config.workflow.max_interval_ms = 1_000;
        assert!(messages(&config).iter().any(|m| m.contains("max_interval_ms")));
    }

    #[test]
    fn unknown_log_level_fails() {
        let mut config = SiteflowConfig::default();
        config.worker.log_level = "loud".into();
        assert!(messages(&config).iter().any(|m| m.contains("worker.log_level")));
    }
}
