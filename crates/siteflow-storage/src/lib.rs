// SPDX-FileCopyrightText: 2026 Siteflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for Siteflow.
//!
//! Provides WAL-mode SQLite storage with embedded migrations and typed
//! operations for the credential registry, the deduplicated event log, and
//! the run journal. Idempotent ingestion rests on the `events.dedupe_key`
//! uniqueness constraint rather than on any application-level lock.

pub mod adapter;
pub mod database;
pub mod migrations;
pub mod queries;

pub use adapter::SqliteStorage;
pub use database::Database;
