//! Authentication decision engine.
//!
//! Turns the request headers into an authenticated [`Identity`] or `None`.
//! Steps, strictly in order:
//!
//! 1. Extract the bearer token from a single `Authorization` header
//! 2. Fetch issuer metadata (when a discovery URL is configured)
//! 3. Merge static parameters with the metadata snapshot
//! 4. Dispatch the token to the validator registry
//! 5. On a signing-key-not-found rejection, request a metadata refresh
//!
//! Every expected failure resolves to `Ok(None)`. Only a validator fault is
//! an error.

use crate::auth::identity::Identity;
use crate::auth::metadata::IssuerMetadataCache;
use crate::auth::params::BearerOptions;
use crate::auth::validator::{DispatchError, ValidatorRegistry};
use crate::errors::GateError;
use axum::http::{header::AUTHORIZATION, HeaderMap};
use common::secret::{ExposeSecret, SecretString};
use std::sync::Arc;
use tracing::instrument;

const BEARER_SCHEME: &str = "Bearer";

/// Extract the token from `Authorization: Bearer <token>`.
///
/// Returns `None` when the header is absent, repeated, not visible ASCII,
/// uses another scheme, or carries an empty token. The scheme name is
/// matched case-insensitively.
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<SecretString> {
    let mut values = headers.get_all(AUTHORIZATION).iter();
    let (Some(value), None) = (values.next(), values.next()) else {
        tracing::debug!(target: "gate.auth.engine", "Missing or repeated Authorization header");
        return None;
    };

    let value = value.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case(BEARER_SCHEME) {
        tracing::debug!(target: "gate.auth.engine", "Authorization header is not a bearer token");
        return None;
    }

    let token = token.trim();
    if token.is_empty() {
        return None;
    }

    Some(SecretString::from(token.to_string()))
}

/// Produces identities from bearer tokens.
#[derive(Clone)]
pub struct Authenticator {
    options: Arc<BearerOptions>,
    metadata: Option<Arc<IssuerMetadataCache>>,
    registry: ValidatorRegistry,
}

impl Authenticator {
    /// `metadata` is `None` when only statically configured keys are trusted.
    pub fn new(
        options: Arc<BearerOptions>,
        metadata: Option<Arc<IssuerMetadataCache>>,
        registry: ValidatorRegistry,
    ) -> Self {
        Self {
            options,
            metadata,
            registry,
        }
    }

    pub fn options(&self) -> &BearerOptions {
        &self.options
    }

    pub fn metadata_cache(&self) -> Option<&Arc<IssuerMetadataCache>> {
        self.metadata.as_ref()
    }

    pub fn registry(&self) -> &ValidatorRegistry {
        &self.registry
    }

    /// Authenticate the caller from the request headers.
    ///
    /// # Errors
    ///
    /// Returns `GateError::Internal` only when a validator faults. Missing,
    /// malformed, or rejected tokens and unreachable metadata are `Ok(None)`.
    #[instrument(skip_all)]
    pub async fn authenticate(&self, headers: &HeaderMap) -> Result<Option<Identity>, GateError> {
        let Some(token) = extract_bearer_token(headers) else {
            return Ok(None);
        };

        let metadata = match &self.metadata {
            Some(cache) => match cache.get().await {
                Ok(metadata) => Some(metadata),
                Err(e) => {
                    tracing::warn!(
                        target: "gate.auth.engine",
                        error = %e,
                        "Issuer metadata unavailable, rejecting request"
                    );
                    return Ok(None);
                }
            },
            None => None,
        };

        let params = self.options.parameters.merged_with(metadata.as_deref());

        match self.registry.dispatch(token.expose_secret(), &params) {
            Ok(identity) => {
                tracing::trace!(
                    target: "gate.auth.engine",
                    claim_count = identity.claims().len(),
                    "Bearer token authenticated"
                );
                Ok(Some(identity))
            }
            Err(DispatchError::Rejected(failures)) => {
                if failures.is_unreadable() {
                    tracing::debug!(target: "gate.auth.engine", "No validator can read the bearer token");
                } else {
                    tracing::trace!(target: "gate.auth.engine", failures = %failures, "Bearer token rejected");
                }

                if failures.has_key_not_found() && self.options.refresh_on_key_not_found {
                    if let Some(cache) = &self.metadata {
                        cache.request_refresh();
                    }
                }

                Ok(None)
            }
            Err(DispatchError::Fault { validator, message }) => {
                tracing::error!(
                    target: "gate.auth.engine",
                    validator,
                    error = %message,
                    "Token validator fault"
                );
                Err(GateError::Internal(format!("validator {validator} failed")))
            }
        }
    }
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("discovery_url", &self.options.discovery_url)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}
