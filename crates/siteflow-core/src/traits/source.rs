// SPDX-FileCopyrightText: 2026 Siteflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Traits for the external paginated source.

use async_trait::async_trait;

use crate::error::SiteflowError;
use crate::types::{Credential, EntityKind, Page, PageRequest, SiteProfile};

/// Fetches one page of a remote collection.
///
/// Implementations map authentication failures to `InvalidCredential`,
/// unknown sites to `NotFound`, and everything else to `Remote`.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch_page(
        &self,
        credential: &Credential,
        kind: EntityKind,
        request: &PageRequest,
    ) -> Result<Page, SiteflowError>;
}

/// Confirms that an access key grants access to a site before registration.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    async fn verify(
        &self,
        site_id: &str,
        access_key: &str,
        base_url: &str,
    ) -> Result<SiteProfile, SiteflowError>;
}
