// SPDX-FileCopyrightText: 2026 Siteflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Siteflow configuration system.

use serial_test::serial;
use siteflow_config::diagnostic::ConfigError;
use siteflow_config::model::{LogFormat, SiteflowConfig};
use siteflow_config::{load_and_validate_path, load_and_validate_str, load_config_from_str};

#[test]
fn valid_toml_deserializes_into_config() {
    let toml = r#"
[worker]
log_level = "debug"
log_format = "text"

[storage]
database_path = "/tmp/siteflow-test.db"
wal_mode = false

[source]
request_timeout_secs = 4
page_size = 5

[sync]
autosync_enabled = false
autosync_interval_secs = 15

[workflow]
max_attempts = 3
initial_interval_ms = 200
backoff_coefficient = 1.5
max_interval_ms = 900
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.worker.log_level, "debug");
    assert_eq!(config.worker.log_format, LogFormat::Text);
    assert_eq!(config.storage.database_path, "/tmp/siteflow-test.db");
    assert!(!config.storage.wal_mode);
    assert_eq!(config.source.request_timeout_secs, 4);
    assert_eq!(config.source.page_size, 5);
    assert!(!config.sync.autosync_enabled);
    assert_eq!(config.sync.autosync_interval_secs, 15);
    assert_eq!(config.workflow.max_attempts, 3);
    assert_eq!(config.workflow.initial_interval_ms, 200);
    assert_eq!(config.workflow.max_interval_ms, 900);
    // Untouched keys keep their defaults.
    assert_eq!(config.workflow.activity_timeout_secs, 300);
}

#[test]
fn missing_sections_use_defaults() {
    let config = load_config_from_str("").expect("empty TOML is valid");
    assert_eq!(config.worker.log_format, LogFormat::Json);
    assert_eq!(config.source.page_size, 10);
    assert_eq!(config.source.request_timeout_secs, 10);
    assert_eq!(config.sync.autosync_interval_secs, 60);
    assert_eq!(config.workflow.max_attempts, 5);
    assert_eq!(config.workflow.initial_interval_ms, 1_000);
    assert_eq!(config.workflow.max_interval_ms, 30_000);
    assert_eq!(config.workflow.run_timeout_secs, 1_800);
    assert!(config.storage.database_path.ends_with("siteflow.db"));
}

#[test]
fn unknown_key_gets_suggestion() {
    let toml = r#"
[source]
page_sise = 5
"#;

    let errors = load_and_validate_str(toml).expect_err("should produce errors");
    let hit = errors.iter().any(|e| {
        matches!(e, ConfigError::UnknownKey { key, suggestion, valid_keys, span, .. } if {
            key == "page_sise"
                && suggestion.as_deref() == Some("page_size")
                && valid_keys.contains("request_timeout_secs")
                && span.is_some()
        })
    });
    assert!(hit, "expected UnknownKey for page_sise, got: {errors:?}");
}

#[test]
fn unknown_top_level_section_is_rejected() {
    let errors = load_and_validate_str("[telemetry]\nenabled = true\n")
        .expect_err("unknown section should fail");
    assert!(
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::UnknownKey { key, .. } if key == "telemetry"))
    );
}

#[test]
fn invalid_type_is_reported_with_path() {
    let errors = load_and_validate_str("[workflow]\nmax_attempts = \"many\"\n")
        .expect_err("string for integer should fail");
    assert!(
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::InvalidType { key, .. } if key.contains("max_attempts"))),
        "got: {errors:?}"
    );
}

#[test]
fn semantic_validation_runs_after_parse() {
    let errors = load_and_validate_str("[source]\npage_size = 50\n")
        .expect_err("page size above the source limit should fail");
    assert!(errors.iter().any(|e| e.to_string().contains("source.page_size")));
}

#[test]
fn config_error_renders_with_miette() {
    use miette::{Diagnostic, GraphicalReportHandler};

    let error = ConfigError::Validation {
        message: "sync.autosync_interval_secs must be greater than 0".into(),
    };
    let code = error.code().map(|c| c.to_string());
    assert_eq!(code.as_deref(), Some("siteflow::config::validation"));

    let mut buf = String::new();
    GraphicalReportHandler::new()
        .render_report(&mut buf, &error as &dyn Diagnostic)
        .unwrap();
    assert!(buf.contains("autosync_interval_secs"));
}

#[test]
fn serialized_defaults_round_trip() {
    let json = serde_json::to_value(SiteflowConfig::default()).unwrap();
    assert_eq!(json["worker"]["log_format"], "json");
    assert_eq!(json["source"]["page_size"], 10);
}

#[test]
#[serial]
fn env_vars_override_file_values() {
    let dir = std::env::temp_dir().join(format!("siteflow-config-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("siteflow.toml");
    std::fs::write(&path, "[sync]\nautosync_interval_secs = 30\n").unwrap();

    // SAFETY: serialized with other env-mutating tests.
    unsafe {
        std::env::set_var("SITEFLOW_SYNC_AUTOSYNC_INTERVAL_SECS", "90");
        std::env::set_var("SITEFLOW_STORAGE_DATABASE_PATH", "/tmp/from-env.db");
        std::env::set_var("SITEFLOW_WORKFLOW_MAX_ATTEMPTS", "3");
    }
    let result = load_and_validate_path(&path);
    unsafe {
        std::env::remove_var("SITEFLOW_SYNC_AUTOSYNC_INTERVAL_SECS");
        std::env::remove_var("SITEFLOW_STORAGE_DATABASE_PATH");
        std::env::remove_var("SITEFLOW_WORKFLOW_MAX_ATTEMPTS");
    }
    std::fs::remove_dir_all(&dir).ok();

    let config = result.expect("env override should validate");
    assert_eq!(config.sync.autosync_interval_secs, 90);
    assert_eq!(config.storage.database_path, "/tmp/from-env.db");
    assert_eq!(config.workflow.max_attempts, 3);
}
