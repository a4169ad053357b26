// SPDX-FileCopyrightText: 2026 Siteflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the paginated site source.
//!
//! [`BuilderClient`] implements [`PageSource`](siteflow_core::PageSource)
//! for the user and order collections and
//! [`CredentialVerifier`](siteflow_core::CredentialVerifier) for the
//! registration-time access key check.

pub mod client;
pub mod types;

pub use client::BuilderClient;
