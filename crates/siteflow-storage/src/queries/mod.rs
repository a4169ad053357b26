// SPDX-FileCopyrightText: 2026 Siteflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query modules for the registry, the event log, and the run journal.

pub mod credentials;
pub mod events;
pub mod runs;
