//! Token validation parameters.
//!
//! [`BearerOptions`] is the static, shared configuration. For every request
//! the engine derives a fresh [`ValidationParameters`] by cloning the static
//! parameters and appending the current issuer metadata snapshot. The shared
//! options are never mutated.

use crate::auth::identity::DEFAULT_ROLE_CLAIM_TYPES;
use crate::auth::keys::SigningKey;
use crate::auth::metadata::IssuerMetadata;
use common::jwt::DEFAULT_CLOCK_SKEW;
use std::time::Duration;

/// Default interval after which cached issuer metadata is re-fetched (12 hours).
pub const DEFAULT_METADATA_REFRESH_INTERVAL: Duration = Duration::from_secs(12 * 60 * 60);

/// Default timeout for discovery and JWKS requests.
pub const DEFAULT_METADATA_TIMEOUT: Duration = Duration::from_secs(10);

/// Constraints a token must satisfy.
#[derive(Debug, Clone)]
pub struct ValidationParameters {
    /// Accepted `iss` values.
    pub valid_issuers: Vec<String>,

    /// Accepted `aud` values. Empty disables the audience check.
    pub valid_audiences: Vec<String>,

    /// Keys that may have signed the token.
    pub signing_keys: Vec<SigningKey>,

    /// When false the `iss` claim is not checked at all.
    pub validate_issuer: bool,

    /// Leeway for `exp`/`nbf` and bound for future `iat`.
    pub clock_skew: Duration,

    /// Claim types whose values are roles.
    pub role_claim_types: Vec<String>,
}

impl Default for ValidationParameters {
    fn default() -> Self {
        Self {
            valid_issuers: Vec::new(),
            valid_audiences: Vec::new(),
            signing_keys: Vec::new(),
            validate_issuer: true,
            clock_skew: DEFAULT_CLOCK_SKEW,
            role_claim_types: DEFAULT_ROLE_CLAIM_TYPES
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }
}

impl ValidationParameters {
    /// Clone these parameters and union in the issuer and keys from `metadata`.
    pub fn merged_with(&self, metadata: Option<&IssuerMetadata>) -> Self {
        let mut merged = self.clone();
        let Some(metadata) = metadata else {
            return merged;
        };

        if !metadata.issuer.is_empty() && !merged.valid_issuers.contains(&metadata.issuer) {
            merged.valid_issuers.push(metadata.issuer.clone());
        }

        for key in &metadata.signing_keys {
            if !merged.signing_keys.iter().any(|k| k.same_key(key)) {
                merged.signing_keys.push(key.clone());
            }
        }

        merged
    }
}

/// Static bearer authentication options.
#[derive(Debug, Clone)]
pub struct BearerOptions {
    /// Statically configured constraints and keys.
    pub parameters: ValidationParameters,

    /// OpenID Connect discovery document URL. `None` disables metadata fetching.
    pub discovery_url: Option<String>,

    /// Request a metadata refresh when a token's signing key is unknown.
    pub refresh_on_key_not_found: bool,

    /// Age after which cached metadata is re-fetched on next use.
    pub metadata_refresh_interval: Duration,

    /// Minimum snapshot age before a requested refresh is honored. Zero
    /// honors every request on the next use.
    pub min_refresh_interval: Duration,

    /// Timeout for outbound discovery and JWKS requests.
    pub metadata_timeout: Duration,
}

impl Default for BearerOptions {
    fn default() -> Self {
        Self {
            parameters: ValidationParameters::default(),
            discovery_url: None,
            refresh_on_key_not_found: true,
            metadata_refresh_interval: DEFAULT_METADATA_REFRESH_INTERVAL,
            min_refresh_interval: Duration::ZERO,
            metadata_timeout: DEFAULT_METADATA_TIMEOUT,
        }
    }
}
