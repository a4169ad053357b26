// SPDX-FileCopyrightText: 2026 Siteflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Siteflow sync engine.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;

/// The primary error type used across all Siteflow traits and core operations.
#[derive(Debug, Error)]
pub enum SiteflowError {
    /// Configuration errors (invalid TOML, bad header values, client construction).
    #[error("configuration error: {0}")]
    Config(String),

    /// Malformed caller input (bad time window, empty site id, unknown entity kind).
    #[error("validation error: {0}")]
    Validation(String),

    /// Unknown site or missing credential.
    #[error("not found: {0}")]
    NotFound(String),

    /// The source rejected the site's access key.
    #[error("invalid access key for site {site_id}")]
    InvalidCredential { site_id: String },

    /// Network failure or server error from the paginated source.
    #[error("remote error: {message}")]
    Remote {
        message: String,
        status: Option<u16>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// A cancellation signal fired before the operation could proceed.
    #[error("operation cancelled")]
    Cancelled,

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Coarse classification of a [`SiteflowError`].
///
/// Retry policies declare their non-retryable set in terms of these kinds.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum ErrorKind {
    Config,
    Validation,
    NotFound,
    InvalidCredential,
    Remote,
    Storage,
    Timeout,
    Cancelled,
    Internal,
}

impl SiteflowError {
    /// Returns the classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Config,
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::InvalidCredential { .. } => ErrorKind::InvalidCredential,
            Self::Remote { .. } => ErrorKind::Remote,
            Self::Storage { .. } => ErrorKind::Storage,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Shorthand for a remote error without an HTTP status or source.
    pub fn remote(message: impl Into<String>) -> Self {
        Self::Remote {
            message: message.into(),
            status: None,
            source: None,
        }
    }

    /// Wraps any error as a storage failure.
    pub fn storage<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Storage {
            source: Box::new(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn kind_matches_variant() {
        assert_eq!(SiteflowError::Config("x".into()).kind(), ErrorKind::Config);
        assert_eq!(
            SiteflowError::Validation("x".into()).kind(),
            ErrorKind::Validation
        );
        assert_eq!(SiteflowError::NotFound("x".into()).kind(), ErrorKind::NotFound);
        assert_eq!(
            SiteflowError::InvalidCredential {
                site_id: "s".into()
            }
            .kind(),
            ErrorKind::InvalidCredential
        );
        assert_eq!(SiteflowError::remote("boom").kind(), ErrorKind::Remote);
        assert_eq!(
            SiteflowError::storage(std::io::Error::other("disk")).kind(),
            ErrorKind::Storage
        );
        assert_eq!(
            SiteflowError::Timeout {
                duration: std::time::Duration::from_secs(1)
            }
            .kind(),
            ErrorKind::Timeout
        );
        assert_eq!(SiteflowError::Cancelled.kind(), ErrorKind::Cancelled);
        assert_eq!(SiteflowError::Internal("x".into()).kind(), ErrorKind::Internal);
    }

    #[test]
    fn error_kind_parses_from_display() {
        for kind in [
            ErrorKind::Config,
            ErrorKind::Validation,
            ErrorKind::NotFound,
            ErrorKind::InvalidCredential,
            ErrorKind::Remote,
            ErrorKind::Storage,
            ErrorKind::Timeout,
            ErrorKind::Cancelled,
            ErrorKind::Internal,
        ] {
            assert_eq!(ErrorKind::from_str(&kind.to_string()).unwrap(), kind);
        }
    }

    #[test]
    fn display_includes_context() {
        let err = SiteflowError::InvalidCredential {
            site_id: "shop-1".into(),
        };
        assert_eq!(err.to_string(), "invalid access key for site shop-1");
    }
}
