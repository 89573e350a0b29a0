//! Test server harness for E2E testing
//!
//! Provides `TestGateServer` for spawning the real demo router in tests.

use crate::crypto_fixtures::{jwks_json, TestKeypair};
use crate::mock_idp::MockIdentityProvider;
use crate::token_builders::{TEST_AUDIENCE, TEST_ISSUER};
use bearer_gate::config::GateConfig;
use bearer_gate::middleware::JwtBearerGate;
use bearer_gate::routes::{self, AppState};
use std::collections::HashMap;
use std::net::SocketAddr;
use tokio::task::JoinHandle;

/// Test harness for spawning the bearer gate demo server in E2E tests.
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_health_flow_e2e() -> anyhow::Result<()> {
///     let server = TestGateServer::spawn(HashMap::new()).await?;
///     let response = reqwest::get(format!("{}/health", server.url())).await?;
///     assert_eq!(response.status(), 200);
///     Ok(())
/// }
/// ```
pub struct TestGateServer {
    addr: SocketAddr,
    state: AppState,
    _handle: JoinHandle<()>,
}

impl TestGateServer {
    /// Spawn a server configured from `vars` (same keys as the environment).
    ///
    /// The server will:
    /// - Bind to a random available port (127.0.0.1:0)
    /// - Start the HTTP server in the background
    pub async fn spawn(mut vars: HashMap<String, String>) -> Result<Self, anyhow::Error> {
        vars.insert("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string());

        let config = GateConfig::from_vars(&vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;

        let state = AppState::new(config);
        let app = routes::build_routes(state.clone());

        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        // Spawn server in background
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            state,
            _handle: handle,
        })
    }

    /// Spawn a server that discovers its keys from `idp` and requires
    /// [`TEST_AUDIENCE`].
    pub async fn with_idp(idp: &MockIdentityProvider) -> Result<Self, anyhow::Error> {
        Self::spawn(HashMap::from([
            ("AUTH_DISCOVERY_URL".to_string(), idp.discovery_url()),
            ("AUTH_VALID_AUDIENCES".to_string(), TEST_AUDIENCE.to_string()),
        ]))
        .await
    }

    /// Spawn a server trusting only statically configured `keys` issued by
    /// [`TEST_ISSUER`].
    pub async fn with_static_keys(keys: &[&TestKeypair]) -> Result<Self, anyhow::Error> {
        Self::spawn(HashMap::from([
            ("AUTH_VALID_ISSUERS".to_string(), TEST_ISSUER.to_string()),
            ("AUTH_VALID_AUDIENCES".to_string(), TEST_AUDIENCE.to_string()),
            (
                "AUTH_SIGNING_KEYS_JWKS".to_string(),
                jwks_json(keys).to_string(),
            ),
        ]))
        .await
    }

    /// Get the base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get the socket address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get reference to the server configuration.
    pub fn config(&self) -> &GateConfig {
        &self.state.config
    }

    /// The running server's gate (shares its metadata cache).
    pub fn gate(&self) -> &JwtBearerGate {
        &self.state.gate
    }
}

impl Drop for TestGateServer {
    fn drop(&mut self) {
        // Abort the server task so the port is released when the test ends
        self._handle.abort();
    }
}
