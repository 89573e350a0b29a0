//! Mock OpenID Connect identity provider
//!
//! Serves a discovery document at `/.well-known/openid-configuration`
//! pointing at a JWKS at `/keys`, backed by wiremock.

use crate::crypto_fixtures::{jwks_json, TestKeypair};
use crate::token_builders::TEST_ISSUER;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Discovery document path.
pub const DISCOVERY_PATH: &str = "/.well-known/openid-configuration";

/// JWKS path advertised in the discovery document.
pub const JWKS_PATH: &str = "/keys";

/// Wiremock-backed identity provider.
///
/// # Example
/// ```rust,ignore
/// let old = TestKeypair::new(1, "old");
/// let idp = MockIdentityProvider::start(&[&old]).await;
///
/// // Key rollover
/// let new = TestKeypair::new(2, "new");
/// idp.publish_keys(&[&old, &new]).await;
/// assert_eq!(idp.jwks_requests().await, 0);
/// ```
pub struct MockIdentityProvider {
    server: MockServer,
    issuer: String,
}

impl MockIdentityProvider {
    /// Start a provider issuing as [`TEST_ISSUER`] and publishing `keys`.
    pub async fn start(keys: &[&TestKeypair]) -> Self {
        Self::start_with_issuer(TEST_ISSUER, keys).await
    }

    pub async fn start_with_issuer(issuer: &str, keys: &[&TestKeypair]) -> Self {
        let idp = Self {
            server: MockServer::start().await,
            issuer: issuer.to_string(),
        };
        idp.publish_keys(keys).await;
        idp
    }

    /// Replace the published key set. Request history is cleared.
    pub async fn publish_keys(&self, keys: &[&TestKeypair]) {
        self.server.reset().await;

        Mock::given(method("GET"))
            .and(path(DISCOVERY_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "issuer": self.issuer,
                "jwks_uri": self.jwks_url(),
            })))
            .mount(&self.server)
            .await;

        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(jwks_json(keys)))
            .mount(&self.server)
            .await;
    }

    /// Make the discovery endpoint fail with `status`. Request history is cleared.
    pub async fn fail_discovery(&self, status: u16) {
        self.server.reset().await;

        Mock::given(method("GET"))
            .and(path(DISCOVERY_PATH))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.server)
            .await;
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn discovery_url(&self) -> String {
        format!("{}{}", self.server.uri(), DISCOVERY_PATH)
    }

    pub fn jwks_url(&self) -> String {
        format!("{}{}", self.server.uri(), JWKS_PATH)
    }

    /// Underlying wiremock server, for custom mocks and expectations.
    pub fn server(&self) -> &MockServer {
        &self.server
    }

    /// Discovery requests received since the last reset.
    pub async fn discovery_requests(&self) -> usize {
        self.requests_to(DISCOVERY_PATH).await
    }

    /// JWKS requests received since the last reset.
    pub async fn jwks_requests(&self) -> usize {
        self.requests_to(JWKS_PATH).await
    }

    async fn requests_to(&self, request_path: &str) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.url.path() == request_path)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_urls_point_at_server() {
        let idp = MockIdentityProvider::start(&[]).await;

        assert!(idp.discovery_url().ends_with(DISCOVERY_PATH));
        assert!(idp.jwks_url().starts_with(&idp.server().uri()));
        assert_eq!(idp.issuer(), TEST_ISSUER);
        assert_eq!(idp.discovery_requests().await, 0);
    }
}
