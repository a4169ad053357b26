// SPDX-FileCopyrightText: 2026 Siteflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Site registration: verify an access key against the source, then persist it.

use std::sync::Arc;

use tracing::{info, warn};

use siteflow_core::types::{Credential, NewCredential};
use siteflow_core::{CredentialStore, CredentialVerifier, SiteflowError};

/// Registers and unregisters sites on top of a [`CredentialStore`].
///
/// A credential is only stored after the source has accepted it.
pub struct SiteRegistry {
    store: Arc<dyn CredentialStore>,
    verifier: Arc<dyn CredentialVerifier>,
}

impl SiteRegistry {
    pub fn new(store: Arc<dyn CredentialStore>, verifier: Arc<dyn CredentialVerifier>) -> Self {
        Self { store, verifier }
    }

    /// Verify and upsert a site credential.
    ///
    /// Inputs are trimmed. Re-registering an existing site replaces its key and
    /// base URL and keeps the original registration time.
    pub async fn register(
        &self,
        site_id: &str,
        access_key: &str,
        base_url: &str,
    ) -> Result<Credential, SiteflowError> {
        let site_id = required(site_id, "site_id")?;
        let access_key = required(access_key, "access_key")?;
        let base_url = required(base_url, "base_url")?.trim_end_matches('/');

        let profile = match self.verifier.verify(site_id, access_key, base_url).await {
            Ok(profile) => profile,
            Err(e) => {
                warn!(site_id, error = %e, "credential verification failed");
                return Err(e);
            }
        };
        if profile.id != site_id {
            warn!(site_id, profile_id = %profile.id, "source returned a different site");
            return Err(SiteflowError::InvalidCredential {
                site_id: site_id.to_string(),
            });
        }

        let credential = self
            .store
            .register_credential(&NewCredential {
                site_id: site_id.to_string(),
                access_key: access_key.to_string(),
                base_url: base_url.to_string(),
                registered_at: None,
            })
            .await?;
        info!(site_id, site_name = %profile.name, "site registered");
        Ok(credential)
    }

    /// Remove a site. Unknown sites are `NotFound`.
    pub async fn unregister(&self, site_id: &str) -> Result<(), SiteflowError> {
        let site_id = required(site_id, "site_id")?;
        self.store.unregister_credential(site_id).await?;
        info!(site_id, "site unregistered");
        Ok(())
    }

    pub async fn get(&self, site_id: &str) -> Result<Option<Credential>, SiteflowError> {
        self.store.get_credential(site_id.trim()).await
    }

    pub async fn list(&self) -> Result<Vec<Credential>, SiteflowError> {
        self.store.list_credentials().await
    }
}

fn required<'a>(value: &'a str, field: &str) -> Result<&'a str, SiteflowError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(SiteflowError::Validation(format!("{field} required")));
    }
    Ok(trimmed)
}
