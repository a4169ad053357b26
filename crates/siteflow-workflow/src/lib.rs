// SPDX-FileCopyrightText: 2026 Siteflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable sync orchestration.
//!
//! [`LocalOrchestrator`] implements [`siteflow_core::SyncOrchestrator`] on top
//! of the sync engine: each entity kind runs as an activity under a
//! [`RetryPolicy`], the whole run is bounded by a run timeout, and per-kind
//! progress is journaled so interrupted runs resume where they stopped.

pub mod activity;
pub mod orchestrator;
pub mod policy;

pub use activity::{ActivityError, execute_activity};
pub use orchestrator::LocalOrchestrator;
pub use policy::{DEFAULT_NON_RETRYABLE, RetryPolicy};
