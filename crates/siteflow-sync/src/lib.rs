// SPDX-FileCopyrightText: 2026 Siteflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sync engine and the services around it.
//!
//! - [`engine`] walks a paginated remote collection and persists one event per entity
//! - [`transform`] maps remote users and orders to events
//! - [`registry`] verifies and stores site credentials
//! - [`seed`] writes manual and randomly seeded attribution events

pub mod engine;
pub mod registry;
pub mod seed;
pub mod transform;

pub use engine::{SyncEngine, SyncError, SyncJob};
pub use registry::SiteRegistry;
pub use seed::{EventSeeder, IngestOutcome, ManualEvent, SeedRequest};
