// SPDX-FileCopyrightText: 2026 Siteflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Siteflow sync engine.
//!
//! This crate provides the error taxonomy, the shared domain types, and the
//! trait seams (storage, source, orchestration) used throughout the
//! workspace.

pub mod error;
pub mod traits;
pub mod types;

pub use error::{ErrorKind, SiteflowError};
pub use types::{AdapterType, HealthStatus};

pub use traits::{
    CredentialStore, CredentialVerifier, EventStore, PageSource, PluginAdapter, RunJournal,
    StorageAdapter, SyncOrchestrator,
};
