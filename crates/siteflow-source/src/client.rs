// SPDX-FileCopyrightText: 2026 Siteflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the source's site, user, and order endpoints.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use siteflow_config::model::{MAX_PAGE_SIZE, SourceConfig};
use siteflow_core::types::{
    AdapterType, Credential, EntityKind, HealthStatus, Page, PageRequest, RemoteEntity,
    RemoteOrder, RemoteUser, SiteProfile,
};
use siteflow_core::{CredentialVerifier, PageSource, PluginAdapter, SiteflowError};

use crate::types::{ErrorBody, PagedResponse};

/// Header carrying the per-site access key.
const ACCESS_KEY_HEADER: &str = "X-Access-Key";

/// HTTP client for the paginated source.
///
/// One instance serves every registered site; the base URL and access key
/// come from each site's [`Credential`].
#[derive(Debug, Clone)]
pub struct BuilderClient {
    client: reqwest::Client,
    request_timeout: Duration,
    verify_timeout: Duration,
}

impl BuilderClient {
    /// Creates a client with the configured timeouts.
    pub fn new(config: &SourceConfig) -> Result<Self, SiteflowError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| SiteflowError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            request_timeout: config.request_timeout(),
            verify_timeout: config.verify_timeout(),
        })
    }

    /// Build `{base}/builder/api/sites/{site}[/{collection}]`, escaping the site id.
    fn site_url(
        base_url: &str,
        site_id: &str,
        collection: Option<EntityKind>,
    ) -> Result<Url, SiteflowError> {
        let mut url = Url::parse(base_url.trim())
            .map_err(|e| SiteflowError::Validation(format!("invalid base URL `{base_url}`: {e}")))?;
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                SiteflowError::Validation(format!("base URL `{base_url}` cannot carry a path"))
            })?;
            segments
                .pop_if_empty()
                .extend(["builder", "api", "sites", site_id]);
            if let Some(kind) = collection {
                segments.push(&kind.to_string());
            }
        }
        Ok(url)
    }

    /// Send a GET with the site's access key and decode a 2xx JSON body.
    async fn get_json<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        site_id: &str,
        timeout: Duration,
    ) -> Result<T, SiteflowError> {
        let response = request.send().await.map_err(|e| transport_error(e, timeout))?;
        let status = response.status();
        debug!(site_id, status = %status, "source response received");

        if status.is_success() {
            return response.json::<T>().await.map_err(|e| SiteflowError::Remote {
                message: format!("failed to decode source response: {e}"),
                status: Some(status.as_u16()),
                source: Some(Box::new(e)),
            });
        }

        let body = response.text().await.unwrap_or_default();
        Err(status_error(status, site_id, &body))
    }
}

fn format_bound(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Map a non-2xx status onto the error taxonomy.
fn status_error(status: StatusCode, site_id: &str, body: &str) -> SiteflowError {
    let detail = serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.error)
        .unwrap_or_else(|_| body.trim().to_string());

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => SiteflowError::InvalidCredential {
            site_id: site_id.to_string(),
        },
        StatusCode::NOT_FOUND => SiteflowError::NotFound(format!("site {site_id} at source")),
        _ => {
            if is_transient_error(status) {
                warn!(site_id, status = %status, "transient source error");
            }
            SiteflowError::Remote {
                message: format!("source returned {status}: {detail}"),
                status: Some(status.as_u16()),
                source: None,
            }
        }
    }
}

fn transport_error(e: reqwest::Error, timeout: Duration) -> SiteflowError {
    if e.is_timeout() {
        return SiteflowError::Timeout { duration: timeout };
    }
    SiteflowError::Remote {
        message: format!("HTTP request failed: {e}"),
        status: None,
        source: Some(Box::new(e)),
    }
}

/// Whether a status code indicates a transient server-side failure.
pub fn is_transient_error(status: StatusCode) -> bool {
    matches!(status.as_u16(), 408 | 429 | 500 | 502 | 503 | 504)
}

#[async_trait]
impl PageSource for BuilderClient {
    async fn fetch_page(
        &self,
        credential: &Credential,
        kind: EntityKind,
        request: &PageRequest,
    ) -> Result<Page, SiteflowError> {
        let url = Self::site_url(&credential.base_url, &credential.site_id, Some(kind))?;
        let page_size = request.page_size.clamp(1, MAX_PAGE_SIZE);

        let mut query = vec![
            ("page", request.page.max(1).to_string()),
            ("page_size", page_size.to_string()),
        ];
        if let Some(start) = &request.window.start {
            query.push(("start", format_bound(start)));
        }
        if let Some(end) = &request.window.end {
            query.push(("end", format_bound(end)));
        }

        debug!(
            site_id = %credential.site_id,
            kind = %kind,
            page = request.page,
            page_size,
            "fetching page"
        );

        let builder = self
            .client
            .get(url)
            .query(&query)
            .header(ACCESS_KEY_HEADER, &credential.access_key);

        let page = match kind {
            EntityKind::Users => self
                .get_json::<PagedResponse<RemoteUser>>(builder, &credential.site_id, self.request_timeout)
                .await?
                .into_page(RemoteEntity::User),
            EntityKind::Orders => self
                .get_json::<PagedResponse<RemoteOrder>>(builder, &credential.site_id, self.request_timeout)
                .await?
                .into_page(RemoteEntity::Order),
        };
        Ok(page)
    }
}

#[async_trait]
impl CredentialVerifier for BuilderClient {
    async fn verify(
        &self,
        site_id: &str,
        access_key: &str,
        base_url: &str,
    ) -> Result<SiteProfile, SiteflowError> {
        let url = Self::site_url(base_url, site_id, None)?;
        let builder = self
            .client
            .get(url)
            .timeout(self.verify_timeout)
            .header(ACCESS_KEY_HEADER, access_key);

        let profile: SiteProfile = self.get_json(builder, site_id, self.verify_timeout).await?;
        if profile.id != site_id {
            warn!(site_id, returned = %profile.id, "source returned a different site");
            return Err(SiteflowError::InvalidCredential {
                site_id: site_id.to_string(),
            });
        }
        Ok(profile)
    }
}

#[async_trait]
impl PluginAdapter for BuilderClient {
    fn name(&self) -> &str {
        "builder-http"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Source
    }

    async fn health_check(&self) -> Result<HealthStatus, SiteflowError> {
        // Sources are per-site; reachability is checked per request.
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), SiteflowError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use siteflow_core::ErrorKind;
    use siteflow_core::types::TimeWindow;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client() -> BuilderClient {
        BuilderClient::new(&SourceConfig::default()).unwrap()
    }

    fn credential(server: &MockServer) -> Credential {
        Credential {
            site_id: "site-1".into(),
            access_key: "secret".into(),
            base_url: server.uri(),
            registered_at: Utc::now(),
        }
    }

    fn page_request(page: u32) -> PageRequest {
        PageRequest {
            page,
            page_size: 10,
            window: TimeWindow::default(),
        }
    }

    #[test]
    fn site_url_escapes_and_joins() {
        let url = BuilderClient::site_url("http://host:8080/", "a b", Some(EntityKind::Orders))
            .unwrap();
        assert_eq!(url.as_str(), "http://host:8080/builder/api/sites/a%20b/orders");

        let err = BuilderClient::site_url("not a url", "s", None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn fetch_users_sends_key_and_window() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/builder/api/sites/site-1/users"))
            .and(header("X-Access-Key", "secret"))
            .and(query_param("page", "2"))
            .and(query_param("page_size", "10"))
            .and(query_param("start", "2026-01-01T00:00:00Z"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "page": 2, "page_size": 10, "total": 12, "has_more": false,
                "users": [{
                    "id": "u11", "site_id": "site-1", "email": "x@y.z",
                    "first_name": "X", "last_name": "Y",
                    "signup_at": "2026-01-02T00:00:00Z"
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut request = page_request(2);
        request.window = TimeWindow::parse(Some("2026-01-01"), None).unwrap();
        let page = client()
            .fetch_page(&credential(&server), EntityKind::Users, &request)
            .await
            .unwrap();
        assert_eq!(page.total, 12);
        assert_eq!(page.items.len(), 1);
        assert!(matches!(&page.items[0], RemoteEntity::User(u) if u.email == "x@y.z"));
    }

    #[tokio::test]
    async fn oversized_page_size_is_clamped() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/builder/api/sites/site-1/orders"))
            .and(query_param("page_size", "10"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "page": 1, "page_size": 10, "total": 0, "has_more": false, "orders": []
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut request = page_request(1);
        request.page_size = 250;
        let page = client()
            .fetch_page(&credential(&server), EntityKind::Orders, &request)
            .await
            .unwrap();
        assert!(page.items.is_empty());
    }

    #[tokio::test]
    async fn statuses_map_to_error_kinds() {
        let server = MockServer::start().await;
        for (site, status) in [("denied", 401), ("gone", 404), ("flaky", 503)] {
            Mock::given(method("GET"))
                .and(path(format!("/builder/api/sites/{site}/users")))
                .respond_with(
                    ResponseTemplate::new(status)
                        .set_body_json(serde_json::json!({"error": "nope"})),
                )
                .mount(&server)
                .await;
        }

        let c = client();
        let mut cred = credential(&server);
        let mut kind_for = |site: &str| {
            cred.site_id = site.to_string();
            let cred = cred.clone();
            let c = c.clone();
            async move {
                c.fetch_page(&cred, EntityKind::Users, &page_request(1))
                    .await
                    .unwrap_err()
                    .kind()
            }
        };
        assert_eq!(kind_for("denied").await, ErrorKind::InvalidCredential);
        assert_eq!(kind_for("gone").await, ErrorKind::NotFound);
        assert_eq!(kind_for("flaky").await, ErrorKind::Remote);
    }

    #[tokio::test]
    async fn unreachable_source_is_remote_error() {
        let cred = Credential {
            site_id: "site-1".into(),
            access_key: "secret".into(),
            base_url: "http://127.0.0.1:1".into(),
            registered_at: Utc::now(),
        };
        let err = client()
            .fetch_page(&cred, EntityKind::Users, &page_request(1))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Remote);
    }

    #[tokio::test]
    async fn verify_checks_profile_identity() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/builder/api/sites/site-1"))
            .and(header("X-Access-Key", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "site-1", "name": "Shop", "access_key": "secret",
                "created_at": "2026-01-01T00:00:00Z"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/builder/api/sites/site-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "site-1", "name": "Shop"
            })))
            .mount(&server)
            .await;

        let c = client();
        let profile = c.verify("site-1", "secret", &server.uri()).await.unwrap();
        assert_eq!(profile.name, "Shop");

        let err = c.verify("site-2", "secret", &server.uri()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidCredential);
    }

    #[test]
    fn transient_statuses() {
        assert!(is_transient_error(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_transient_error(StatusCode::SERVICE_UNAVAILABLE));
        assert!(!is_transient_error(StatusCode::BAD_REQUEST));
    }
}
