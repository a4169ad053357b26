// SPDX-FileCopyrightText: 2026 Siteflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Siteflow integration tests.
//!
//! Provides a scripted page source and throwaway storage so sync, workflow,
//! and scheduler tests run without a network or a shared database.
//!
//! # Components
//!
//! - [`MockSource`] - in-memory paginated source with failure injection
//! - [`FaultyStore`] - storage wrapper that injects persistence failures
//! - [`temp_storage`] - initialized SQLite storage in a temp directory
//! - [`fixtures`] - remote users, orders, and credentials

pub mod faulty_store;
pub mod fixtures;
pub mod mock_source;

use std::sync::Arc;

use siteflow_config::model::StorageConfig;
use siteflow_core::StorageAdapter;
use siteflow_storage::SqliteStorage;
use tempfile::TempDir;

pub use faulty_store::FaultyStore;
pub use mock_source::{Failure, MockSource};

/// Open fresh storage in a temp directory.
///
/// The directory must outlive the storage; keep the returned guard alive for
/// the duration of the test.
///
/// # Panics
///
/// Panics if the temp directory or database cannot be created.
pub async fn temp_storage() -> (Arc<SqliteStorage>, TempDir) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let storage = SqliteStorage::new(StorageConfig {
        database_path: dir.path().join("siteflow.db").to_string_lossy().into_owned(),
        wal_mode: true,
    });
    storage.initialize().await.expect("initialize storage");
    (Arc::new(storage), dir)
}
