//! Bearer gate configuration.
//!
//! Configuration is loaded from environment variables. Static signing keys
//! are parsed at load time and never printed in Debug output.

use crate::auth::identity::DEFAULT_ROLE_CLAIM_TYPES;
use crate::auth::keys::{parse_jwks, SigningKey};
use crate::auth::params::{
    BearerOptions, ValidationParameters, DEFAULT_METADATA_REFRESH_INTERVAL,
    DEFAULT_METADATA_TIMEOUT,
};
use common::jwt::{DEFAULT_CLOCK_SKEW, MAX_CLOCK_SKEW};
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Default demo server bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

#[derive(Clone)]
pub struct GateConfig {
    /// Server bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// OpenID Connect discovery document URL. Unset means static keys only.
    pub discovery_url: Option<String>,

    /// Statically accepted issuers.
    pub valid_issuers: Vec<String>,

    /// Accepted audiences. Empty disables the audience check.
    pub valid_audiences: Vec<String>,

    /// Keys from `AUTH_SIGNING_KEYS_JWKS`.
    pub signing_keys: Vec<SigningKey>,

    /// Request a metadata refresh when a token's key is unknown (default: true).
    pub refresh_on_key_not_found: bool,

    /// Automatic metadata re-fetch interval (default: 12 hours).
    pub metadata_refresh_interval: Duration,

    /// Minimum metadata age before a key-miss refresh is honored (default: 0).
    pub min_refresh_interval: Duration,

    /// Discovery and JWKS request timeout (default: 10 seconds).
    pub metadata_timeout: Duration,

    /// JWT clock skew tolerance (default: 300 seconds, max 600).
    pub clock_skew: Duration,

    /// Claim types whose values are roles (default: "roles,role").
    pub role_claim_types: Vec<String>,
}

impl fmt::Debug for GateConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GateConfig")
            .field("bind_address", &self.bind_address)
            .field("discovery_url", &self.discovery_url)
            .field("valid_issuers", &self.valid_issuers)
            .field("valid_audiences", &self.valid_audiences)
            .field("signing_keys", &format!("[{} keys]", self.signing_keys.len()))
            .field("refresh_on_key_not_found", &self.refresh_on_key_not_found)
            .field("metadata_refresh_interval", &self.metadata_refresh_interval)
            .field("min_refresh_interval", &self.min_refresh_interval)
            .field("metadata_timeout", &self.metadata_timeout)
            .field("clock_skew", &self.clock_skew)
            .field("role_claim_types", &self.role_claim_types)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid signing keys: {0}")]
    InvalidSigningKeys(String),

    #[error("Invalid JWT clock skew configuration: {0}")]
    InvalidJwtClockSkew(String),

    #[error("Invalid metadata configuration: {0}")]
    InvalidMetadata(String),

    #[error("Invalid boolean for {name}: '{value}'")]
    InvalidBool { name: String, value: String },
}

impl GateConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let discovery_url = vars
            .get("AUTH_DISCOVERY_URL")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let valid_issuers = comma_list(vars.get("AUTH_VALID_ISSUERS"));
        let valid_audiences = comma_list(vars.get("AUTH_VALID_AUDIENCES"));

        let signing_keys = match vars
            .get("AUTH_SIGNING_KEYS_JWKS")
            .filter(|s| !s.trim().is_empty())
        {
            Some(document) => parse_jwks(document.as_bytes())
                .map_err(|e| ConfigError::InvalidSigningKeys(e.to_string()))?,
            None => Vec::new(),
        };

        let refresh_on_key_not_found = match vars.get("AUTH_REFRESH_ON_KEY_NOT_FOUND") {
            Some(value) => parse_bool("AUTH_REFRESH_ON_KEY_NOT_FOUND", value)?,
            None => true,
        };

        let metadata_refresh_interval = positive_seconds(
            vars,
            "AUTH_METADATA_REFRESH_SECONDS",
            DEFAULT_METADATA_REFRESH_INTERVAL,
        )?;

        let min_refresh_interval =
            seconds(vars, "AUTH_METADATA_MIN_REFRESH_SECONDS", Duration::ZERO)?;

        let metadata_timeout =
            positive_seconds(vars, "AUTH_METADATA_TIMEOUT_SECONDS", DEFAULT_METADATA_TIMEOUT)?;

        // Parse JWT clock skew tolerance with validation
        let clock_skew = if let Some(value_str) = vars.get("JWT_CLOCK_SKEW_SECONDS") {
            let value: i64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must be a valid integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value <= 0 {
                return Err(ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must be positive, got {}",
                    value
                )));
            }

            let value = value.unsigned_abs();
            if value > MAX_CLOCK_SKEW.as_secs() {
                return Err(ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must not exceed {} seconds, got {}",
                    MAX_CLOCK_SKEW.as_secs(),
                    value
                )));
            }

            Duration::from_secs(value)
        } else {
            DEFAULT_CLOCK_SKEW
        };

        let role_claim_types = match vars.get("AUTH_ROLE_CLAIM_TYPES") {
            Some(value) => comma_list(Some(value)),
            None => DEFAULT_ROLE_CLAIM_TYPES
                .iter()
                .map(ToString::to_string)
                .collect(),
        };

        Ok(GateConfig {
            bind_address,
            discovery_url,
            valid_issuers,
            valid_audiences,
            signing_keys,
            refresh_on_key_not_found,
            metadata_refresh_interval,
            min_refresh_interval,
            metadata_timeout,
            clock_skew,
            role_claim_types,
        })
    }

    /// Options for [`JwtBearerGate::builder`](crate::middleware::JwtBearerGate::builder).
    pub fn bearer_options(&self) -> BearerOptions {
        BearerOptions {
            parameters: ValidationParameters {
                valid_issuers: self.valid_issuers.clone(),
                valid_audiences: self.valid_audiences.clone(),
                signing_keys: self.signing_keys.clone(),
                validate_issuer: true,
                clock_skew: self.clock_skew,
                role_claim_types: self.role_claim_types.clone(),
            },
            discovery_url: self.discovery_url.clone(),
            refresh_on_key_not_found: self.refresh_on_key_not_found,
            metadata_refresh_interval: self.metadata_refresh_interval,
            min_refresh_interval: self.min_refresh_interval,
            metadata_timeout: self.metadata_timeout,
        }
    }
}

fn comma_list(value: Option<&String>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(ToString::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn parse_bool(name: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            name: name.to_string(),
            value: value.to_string(),
        }),
    }
}

fn positive_seconds(
    vars: &HashMap<String, String>,
    name: &str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    let value = seconds(vars, name, default)?;

    if value.is_zero() {
        return Err(ConfigError::InvalidMetadata(format!(
            "{} must be greater than 0",
            name
        )));
    }

    Ok(value)
}

fn seconds(
    vars: &HashMap<String, String>,
    name: &str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    let Some(value_str) = vars.get(name) else {
        return Ok(default);
    };

    let value: u64 = value_str.parse().map_err(|e| {
        ConfigError::InvalidMetadata(format!(
            "{} must be a valid non-negative integer, got '{}': {}",
            name, value_str, e
        ))
    })?;

    Ok(Duration::from_secs(value))
}
