// SPDX-FileCopyrightText: 2026 Siteflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait seams between the sync engine and its collaborators.
//!
//! Adapters extend [`PluginAdapter`] and use `#[async_trait]` for dynamic
//! dispatch compatibility.

pub mod adapter;
pub mod orchestrator;
pub mod source;
pub mod storage;

pub use adapter::PluginAdapter;
pub use orchestrator::SyncOrchestrator;
pub use source::{CredentialVerifier, PageSource};
pub use storage::{CredentialStore, EventStore, RunJournal, StorageAdapter};
