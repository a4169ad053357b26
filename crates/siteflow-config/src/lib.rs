// SPDX-FileCopyrightText: 2026 Siteflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration system for the Siteflow sync engine.
//!
//! Provides TOML configuration parsing with strict validation (`deny_unknown_fields`),
//! XDG file hierarchy lookup, environment variable overrides, and diagnostic
//! error rendering with typo suggestions.
//!
//! # Usage
//!
//! ```no_run
//! use siteflow_config::load_and_validate;
//!
//! let config = load_and_validate().expect("config errors");
//! println!("database: {}", config.storage.database_path);
//! ```

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

pub use diagnostic::{ConfigError, render_errors};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::SiteflowConfig;

/// Load configuration from the XDG hierarchy and validate it.
///
/// On a Figment error the result is converted to miette diagnostics with
/// typo suggestions; on success post-deserialization validation runs.
pub fn load_and_validate() -> Result<SiteflowConfig, Vec<ConfigError>> {
    match loader::load_config() {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => {
            let toml_sources = collect_toml_sources();
            Err(diagnostic::figment_to_config_errors(err, &toml_sources))
        }
    }
}

/// Load configuration from an explicit file (plus env overrides) and validate it.
pub fn load_and_validate_path(
    path: &std::path::Path,
) -> Result<SiteflowConfig, Vec<ConfigError>> {
    match loader::load_config_from_path(path) {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => {
            let sources = std::fs::read_to_string(path)
                .map(|content| vec![(path.display().to_string(), content)])
                .unwrap_or_default();
            Err(diagnostic::figment_to_config_errors(err, &sources))
        }
    }
}

/// Load configuration from a TOML string and validate it.
pub fn load_and_validate_str(toml_content: &str) -> Result<SiteflowConfig, Vec<ConfigError>> {
    match loader::load_config_from_str(toml_content) {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => {
            let sources = vec![("<inline>".to_string(), toml_content.to_string())];
            Err(diagnostic::figment_to_config_errors(err, &sources))
        }
    }
}

/// Collect TOML source file contents for error span resolution.
fn collect_toml_sources() -> Vec<(String, String)> {
    let mut sources = Vec::new();

    if let Ok(content) = std::fs::read_to_string(loader::LOCAL_CONFIG) {
        let path = std::env::current_dir()
            .map(|d| d.join(loader::LOCAL_CONFIG).display().to_string())
            .unwrap_or_else(|_| loader::LOCAL_CONFIG.to_string());
        sources.push((path, content));
    }

    let user = loader::user_config_path();
    if let Ok(content) = std::fs::read_to_string(&user) {
        sources.push((user.display().to_string(), content));
    }

    if let Ok(content) = std::fs::read_to_string(loader::SYSTEM_CONFIG) {
        sources.push((loader::SYSTEM_CONFIG.to_string(), content));
    }

    sources
}
