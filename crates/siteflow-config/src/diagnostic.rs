// SPDX-FileCopyrightText: 2026 Siteflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Figment-to-miette error bridge with fuzzy match suggestions.

#![allow(unused_assignments)] // miette's Diagnostic derive generates code triggering this lint

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Minimum Jaro-Winkler similarity score to suggest a correction.
const SUGGESTION_THRESHOLD: f64 = 0.75;

/// A configuration error with rich diagnostic information.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    /// An unknown key was found in the configuration.
    #[error("unknown configuration key `{key}`")]
    #[diagnostic(
        code(siteflow::config::unknown_key),
        help("{}", unknown_key_help(suggestion.as_deref(), valid_keys))
    )]
    UnknownKey {
        key: String,
        suggestion: Option<String>,
        valid_keys: String,
        #[label("this key is not recognized")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A configuration value has the wrong type.
    #[error("invalid type for key `{key}`: {detail}")]
    #[diagnostic(code(siteflow::config::invalid_type), help("expected {expected}"))]
    InvalidType {
        key: String,
        detail: String,
        expected: String,
    },

    /// A required configuration key is missing.
    #[error("missing required key `{key}`")]
    #[diagnostic(
        code(siteflow::config::missing_key),
        help("add `{key} = <value>` to your siteflow.toml")
    )]
    MissingKey { key: String },

    /// A value parsed but violates a semantic constraint.
    #[error("validation error: {message}")]
    #[diagnostic(code(siteflow::config::validation))]
    Validation { message: String },

    /// Catch-all for other configuration errors.
    #[error("configuration error: {0}")]
    #[diagnostic(code(siteflow::config::other))]
    Other(String),
}

fn unknown_key_help(suggestion: Option<&str>, valid_keys: &str) -> String {
    match suggestion {
        Some(s) => format!("did you mean `{s}`? Valid keys: {valid_keys}"),
        None => format!("valid keys: {valid_keys}"),
    }
}

/// Convert a `figment::Error` (which may hold several errors) into diagnostics.
pub fn figment_to_config_errors(
    err: figment::Error,
    toml_sources: &[(String, String)],
) -> Vec<ConfigError> {
    use figment::error::Kind;

    err.into_iter()
        .map(|error| match &error.kind {
            Kind::UnknownField(field, expected) => {
                let valid_keys: Vec<&str> = expected.to_vec();
                let (span, src) = find_source_span(&error, field, toml_sources);
                ConfigError::UnknownKey {
                    key: field.clone(),
                    suggestion: suggest_key(field, &valid_keys),
                    valid_keys: valid_keys.join(", "),
                    span,
                    src,
                }
            }
            Kind::MissingField(field) => ConfigError::MissingKey {
                key: field.clone().into_owned(),
            },
            Kind::InvalidType(actual, expected) => ConfigError::InvalidType {
                key: error
                    .path
                    .iter()
                    .map(|s| s.to_string())
                    .collect::<Vec<_>>()
                    .join("."),
                detail: format!("found {actual}, expected {expected}"),
                expected: expected.to_string(),
            },
            _ => ConfigError::Other(format!("{error}")),
        })
        .collect()
}

/// Locate the offending key in whichever TOML file the error came from.
fn find_source_span(
    error: &figment::error::Error,
    field: &str,
    toml_sources: &[(String, String)],
) -> (Option<SourceSpan>, Option<NamedSource<String>>) {
    let origin = error
        .metadata
        .as_ref()
        .and_then(|m| m.source.as_ref())
        .and_then(|s| match s {
            figment::Source::File(path) => Some(path.display().to_string()),
            _ => None,
        });

    // Inline strings carry no file origin; fall back to the single source.
    let source = match origin {
        Some(path) => toml_sources.iter().find(|(p, _)| *p == path),
        None if toml_sources.len() == 1 => toml_sources.first(),
        None => None,
    };

    let Some((path, content)) = source else {
        return (None, None);
    };

    let section: Vec<String> = error.path.iter().map(|s| s.to_string()).collect();
    match find_key_offset(content, &section, field) {
        Some(offset) => (
            Some(SourceSpan::new(offset.into(), field.len())),
            Some(NamedSource::new(path, content.clone())),
        ),
        None => (None, None),
    }
}

/// Byte offset of `field` inside the `[path[0]]` table (or the top level).
pub fn find_key_offset(content: &str, path: &[String], field: &str) -> Option<usize> {
    let search_start = match path.first() {
        None => 0,
        Some(section) => {
            let header = format!("[{section}]");
            content.find(&header).map(|pos| pos + header.len())?
        }
    };

    let mut byte_offset = search_start;
    for line in content[search_start..].split_inclusive('\n') {
        let trimmed = line.trim_start();
        if trimmed.starts_with('[') && byte_offset > search_start {
            // Reached the next table.
            break;
        }
        if let Some(after) = trimmed.strip_prefix(field)
            && (after.starts_with(' ') || after.starts_with('=') || after.starts_with('\t'))
        {
            return Some(byte_offset + (line.len() - trimmed.len()));
        }
        byte_offset += line.len();
    }

    None
}

/// Suggest the closest valid key using Jaro-Winkler similarity.
pub fn suggest_key(unknown: &str, valid_keys: &[&str]) -> Option<String> {
    valid_keys
        .iter()
        .map(|key| (strsim::jaro_winkler(unknown, key), *key))
        .filter(|(score, _)| *score > SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, key)| key.to_string())
}

/// Render diagnostics to stderr using miette's graphical handler.
pub fn render_errors(errors: &[ConfigError]) {
    use miette::GraphicalReportHandler;

    let handler = GraphicalReportHandler::new();
    for error in errors {
        let mut buf = String::new();
        let diagnostic: &dyn Diagnostic = error;
        if handler.render_report(&mut buf, diagnostic).is_ok() {
            eprint!("{buf}");
        } else {
            eprintln!("Error: {error}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suggests_close_key() {
        let valid = &["page_size", "request_timeout_secs", "verify_timeout_secs"];
        assert_eq!(suggest_key("page_sise", valid), Some("page_size".to_string()));
    }

    #[test]
    fn no_suggestion_for_distant_typo() {
        let valid = &["log_level", "log_format"];
        assert_eq!(suggest_key("zzzzzz", valid), None);
    }

    #[test]
    fn finds_key_in_section() {
        let content = "[worker]\nlog_level = \"info\"\n\n[source]\npage_sise = 5\n";
        let path = vec!["source".to_string()];
        let offset = find_key_offset(content, &path, "page_sise").unwrap();
        assert_eq!(&content[offset..offset + 9], "page_sise");
    }

    #[test]
    fn key_lookup_stays_inside_section() {
        let content = "[worker]\nlog_level = \"info\"\n[storage]\nwal_mode = true\n";
        let path = vec!["worker".to_string()];
        assert_eq!(find_key_offset(content, &path, "wal_mode"), None);
    }
}
