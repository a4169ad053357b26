// SPDX-FileCopyrightText: 2026 Siteflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scripted in-memory page source for deterministic sync tests.
//!
//! `MockSource` implements both [`PageSource`] and [`CredentialVerifier`]. It
//! paginates fixture users and orders per site, honors time windows, and can
//! inject failures by kind, by page, or on every call.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use siteflow_core::traits::adapter::PluginAdapter;
use siteflow_core::types::{
    AdapterType, Credential, EntityKind, HealthStatus, Page, PageRequest, RemoteEntity,
    RemoteOrder, RemoteUser, SiteProfile, TimeWindow,
};
use siteflow_core::{CredentialVerifier, PageSource, SiteflowError};

/// An injected source failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    /// 503 from the source; retryable.
    Transient,
    /// Per-attempt timeout; retryable.
    Timeout,
    /// Rejected access key.
    InvalidCredential,
    /// Unknown site.
    NotFound,
}

impl Failure {
    fn to_error(self, site_id: &str) -> SiteflowError {
        match self {
            Self::Transient => SiteflowError::Remote {
                message: "source returned 503 Service Unavailable".into(),
                status: Some(503),
                source: None,
            },
            Self::Timeout => SiteflowError::Timeout {
                duration: Duration::from_secs(1),
            },
            Self::InvalidCredential => SiteflowError::InvalidCredential {
                site_id: site_id.to_string(),
            },
            Self::NotFound => SiteflowError::NotFound(format!("site {site_id}")),
        }
    }
}

#[derive(Default)]
struct State {
    users: HashMap<String, Vec<RemoteUser>>,
    orders: HashMap<String, Vec<RemoteOrder>>,
    access_keys: HashMap<String, HashSet<String>>,
    queued_failures: HashMap<EntityKind, VecDeque<Failure>>,
    page_failures: HashMap<(EntityKind, u32), Failure>,
    permanent_failures: HashMap<EntityKind, Failure>,
    reported_totals: HashMap<EntityKind, VecDeque<u64>>,
    next_page_overrides: HashMap<EntityKind, u32>,
    requested_pages: HashMap<EntityKind, Vec<u32>>,
    verify_calls: usize,
}

/// In-memory paginated source.
#[derive(Default)]
pub struct MockSource {
    state: Mutex<State>,
    delay: Option<Duration>,
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn state_mut(&mut self) -> &mut State {
        self.state.get_mut().unwrap_or_else(PoisonError::into_inner)
    }

    /// Serve these users for a site.
    pub fn with_users(mut self, site_id: &str, users: Vec<RemoteUser>) -> Self {
        self.state_mut()
            .users
            .entry(site_id.to_string())
            .or_default()
            .extend(users);
        self
    }

    /// Serve these orders for a site.
    pub fn with_orders(mut self, site_id: &str, orders: Vec<RemoteOrder>) -> Self {
        self.state_mut()
            .orders
            .entry(site_id.to_string())
            .or_default()
            .extend(orders);
        self
    }

    /// Accept an access key for a site. A site may accept several keys.
    pub fn with_access_key(mut self, site_id: &str, key: &str) -> Self {
        self.state_mut()
            .access_keys
            .entry(site_id.to_string())
            .or_default()
            .insert(key.to_string());
        self
    }

    /// Report these totals on successive pages instead of the real count.
    pub fn with_reported_totals(mut self, kind: EntityKind, totals: Vec<u64>) -> Self {
        self.state_mut()
            .reported_totals
            .insert(kind, totals.into());
        self
    }

    /// Name this page as `next_page` on every page that has more.
    pub fn with_next_page_override(mut self, kind: EntityKind, next: u32) -> Self {
        self.state_mut().next_page_overrides.insert(kind, next);
        self
    }

    /// Fail the first fetch of a specific page.
    pub fn fail_on_page(mut self, kind: EntityKind, page: u32, failure: Failure) -> Self {
        self.state_mut().page_failures.insert((kind, page), failure);
        self
    }

    /// Fail the next `times` fetches of a kind.
    pub fn fail_next(mut self, kind: EntityKind, failure: Failure, times: usize) -> Self {
        self.state_mut()
            .queued_failures
            .entry(kind)
            .or_default()
            .extend(std::iter::repeat_n(failure, times));
        self
    }

    /// Fail every fetch of a kind.
    pub fn fail_always(mut self, kind: EntityKind, failure: Failure) -> Self {
        self.state_mut().permanent_failures.insert(kind, failure);
        self
    }

    /// Sleep this long before answering each fetch.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of fetches issued for a kind, failed ones included.
    pub fn fetch_calls(&self, kind: EntityKind) -> usize {
        self.state().requested_pages.get(&kind).map_or(0, Vec::len)
    }

    /// Pages requested for a kind, in call order.
    pub fn requested_pages(&self, kind: EntityKind) -> Vec<u32> {
        self.state()
            .requested_pages
            .get(&kind)
            .cloned()
            .unwrap_or_default()
    }

    pub fn verify_calls(&self) -> usize {
        self.state().verify_calls
    }

    fn injected_failure(state: &mut State, kind: EntityKind, page: u32) -> Option<Failure> {
        if let Some(failure) = state.permanent_failures.get(&kind) {
            return Some(*failure);
        }
        if let Some(failure) = state
            .queued_failures
            .get_mut(&kind)
            .and_then(VecDeque::pop_front)
        {
            return Some(failure);
        }
        state.page_failures.remove(&(kind, page))
    }

    fn check_key(state: &State, credential: &Credential) -> Result<(), SiteflowError> {
        match state.access_keys.get(&credential.site_id) {
            Some(keys) if !keys.contains(&credential.access_key) => {
                Err(Failure::InvalidCredential.to_error(&credential.site_id))
            }
            _ => Ok(()),
        }
    }

    fn build_page(
        state: &mut State,
        site_id: &str,
        kind: EntityKind,
        request: &PageRequest,
    ) -> Page {
        let window = request.window;
        let matching: Vec<RemoteEntity> = match kind {
            EntityKind::Users => state
                .users
                .get(site_id)
                .into_iter()
                .flatten()
                .filter(|u| in_window(&window, u.signup_at))
                .cloned()
                .map(RemoteEntity::User)
                .collect(),
            EntityKind::Orders => state
                .orders
                .get(site_id)
                .into_iter()
                .flatten()
                .filter(|o| in_window(&window, o.placed_at))
                .cloned()
                .map(RemoteEntity::Order)
                .collect(),
        };

        let page_size = request.page_size.max(1);
        let page = request.page.max(1);
        let offset = ((page - 1) * page_size) as usize;
        let items: Vec<RemoteEntity> = matching
            .iter()
            .skip(offset)
            .take(page_size as usize)
            .cloned()
            .collect();
        let has_more = offset + items.len() < matching.len();
        let total = state
            .reported_totals
            .get_mut(&kind)
            .and_then(VecDeque::pop_front)
            .unwrap_or(matching.len() as u64);
        let next_page = has_more.then(|| {
            state
                .next_page_overrides
                .get(&kind)
                .copied()
                .unwrap_or(page + 1)
        });

        Page {
            page,
            page_size,
            total,
            has_more,
            next_page,
            items,
        }
    }
}

fn in_window(window: &TimeWindow, at: chrono::DateTime<chrono::Utc>) -> bool {
    window.start.is_none_or(|start| at >= start) && window.end.is_none_or(|end| at <= end)
}

#[async_trait]
impl PluginAdapter for MockSource {
    fn name(&self) -> &str {
        "mock-source"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Source
    }

    async fn health_check(&self) -> Result<HealthStatus, SiteflowError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), SiteflowError> {
        Ok(())
    }
}

#[async_trait]
impl PageSource for MockSource {
    async fn fetch_page(
        &self,
        credential: &Credential,
        kind: EntityKind,
        request: &PageRequest,
    ) -> Result<Page, SiteflowError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state();
        state
            .requested_pages
            .entry(kind)
            .or_default()
            .push(request.page);
        if let Some(failure) = Self::injected_failure(&mut state, kind, request.page) {
            tracing::debug!(site_id = %credential.site_id, %kind, page = request.page, ?failure, "injected failure");
            return Err(failure.to_error(&credential.site_id));
        }
        Self::check_key(&state, credential)?;
        Ok(Self::build_page(&mut state, &credential.site_id, kind, request))
    }
}

#[async_trait]
impl CredentialVerifier for MockSource {
    async fn verify(
        &self,
        site_id: &str,
        access_key: &str,
        _base_url: &str,
    ) -> Result<SiteProfile, SiteflowError> {
        let mut state = self.state();
        state.verify_calls += 1;
        match state.access_keys.get(site_id) {
            None => Err(Failure::NotFound.to_error(site_id)),
            Some(keys) if !keys.contains(access_key) => {
                Err(Failure::InvalidCredential.to_error(site_id))
            }
            Some(_) => Ok(SiteProfile {
                id: site_id.to_string(),
                name: format!("Mock {site_id}"),
                created_at: None,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{credential, users};

    fn request(page: u32) -> PageRequest {
        PageRequest {
            page,
            page_size: 10,
            window: TimeWindow::default(),
        }
    }

    #[tokio::test]
    async fn paginates_by_page_size() {
        let source = MockSource::new().with_users("site-1", users(12));
        let cred = credential("site-1", "http://mock");

        let first = source.fetch_page(&cred, EntityKind::Users, &request(1)).await.unwrap();
        assert_eq!(first.items.len(), 10);
        assert!(first.has_more);
        assert_eq!(first.next_page, Some(2));
        assert_eq!(first.total, 12);

        let second = source.fetch_page(&cred, EntityKind::Users, &request(2)).await.unwrap();
        assert_eq!(second.items.len(), 2);
        assert!(!second.has_more);
        assert_eq!(second.next_page, None);
    }

    #[tokio::test]
    async fn page_failure_fires_once() {
        let source = MockSource::new()
            .with_users("site-1", users(3))
            .fail_on_page(EntityKind::Users, 1, Failure::Transient);
        let cred = credential("site-1", "http://mock");

        assert!(source.fetch_page(&cred, EntityKind::Users, &request(1)).await.is_err());
        assert!(source.fetch_page(&cred, EntityKind::Users, &request(1)).await.is_ok());
        assert_eq!(source.fetch_calls(EntityKind::Users), 2);
    }

    #[tokio::test]
    async fn window_filters_entities() {
        let source = MockSource::new().with_users("site-1", users(5));
        let cred = credential("site-1", "http://mock");
        let mut req = request(1);
        req.window.start = Some(crate::fixtures::at_minute(4));

        let page = source.fetch_page(&cred, EntityKind::Users, &req).await.unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.total, 2);
    }

    #[tokio::test]
    async fn verifier_checks_accepted_keys() {
        let source = MockSource::new().with_access_key("site-1", "secret");
        assert!(source.verify("site-1", "secret", "http://x").await.is_ok());
        assert!(matches!(
            source.verify("site-1", "nope", "http://x").await,
            Err(SiteflowError::InvalidCredential { .. })
        ));
        assert!(matches!(
            source.verify("site-9", "secret", "http://x").await,
            Err(SiteflowError::NotFound(_))
        ));
        assert_eq!(source.verify_calls(), 3);
    }
}
