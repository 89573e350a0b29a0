//! Token validator registry.
//!
//! Validators are tried in registration order. A validator that cannot read
//! the token is skipped without recording an error. The first successful
//! validation wins; every rejection is kept so the caller can log the whole
//! set and look for key-rollover hints.

use crate::auth::identity::Identity;
use crate::auth::params::ValidationParameters;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Why a validator rejected a token.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token is malformed")]
    Malformed,

    #[error("no signing key matches the token (kid: {kid:?})")]
    SigningKeyNotFound { kid: Option<String> },

    #[error("token signature is invalid")]
    InvalidSignature,

    #[error("token has expired")]
    Expired,

    #[error("token is not yet valid")]
    NotYetValid,

    #[error("token was issued in the future")]
    IssuedInFuture,

    #[error("token issuer is not accepted")]
    InvalidIssuer,

    #[error("token audience is not accepted")]
    InvalidAudience,

    #[error("token algorithm is not supported by any matching key")]
    UnsupportedAlgorithm,

    #[error("token rejected: {0}")]
    Rejected(String),

    /// The validator itself failed; not a statement about the token.
    #[error("validator fault: {0}")]
    Internal(String),
}

impl TokenValidationError {
    /// True when the failure suggests cached signing keys may be stale.
    pub fn is_key_not_found(&self) -> bool {
        matches!(self, TokenValidationError::SigningKeyNotFound { .. })
    }
}

/// A pluggable token format.
///
/// Validators are stateless given their inputs and are shared across
/// concurrent requests.
pub trait TokenValidator: Send + Sync {
    /// Short name used in logs and failure lists.
    fn name(&self) -> &'static str;

    /// Whether this validator understands the token's format at all.
    fn can_read(&self, token: &str) -> bool;

    /// Validate the token and build the caller's identity.
    fn validate(
        &self,
        token: &str,
        params: &ValidationParameters,
    ) -> Result<Identity, TokenValidationError>;
}

/// One validator's rejection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationFailure {
    pub validator: &'static str,
    pub error: TokenValidationError,
}

/// All rejections collected for one token.
///
/// Empty means no registered validator could read the token.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationFailures(Vec<ValidationFailure>);

impl ValidationFailures {
    pub fn is_unreadable(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValidationFailure> {
        self.0.iter()
    }

    /// True when any rejection was caused by an unknown signing key.
    pub fn has_key_not_found(&self) -> bool {
        self.0.iter().any(|f| f.error.is_key_not_found())
    }

    fn push(&mut self, failure: ValidationFailure) {
        self.0.push(failure);
    }
}

impl fmt::Display for ValidationFailures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.as_slice() {
            [] => write!(f, "no validator can read the token"),
            [single] => write!(f, "{}: {}", single.validator, single.error),
            many => {
                write!(f, "{} validators rejected the token: ", many.len())?;
                for (i, failure) in many.iter().enumerate() {
                    if i > 0 {
                        write!(f, "; ")?;
                    }
                    write!(f, "{}: {}", failure.validator, failure.error)?;
                }
                Ok(())
            }
        }
    }
}

/// Why dispatch produced no identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// Every validator that could read the token rejected it.
    Rejected(ValidationFailures),

    /// A validator failed internally; dispatch stopped there.
    Fault {
        validator: &'static str,
        message: String,
    },
}

/// Ordered set of validators.
#[derive(Clone, Default)]
pub struct ValidatorRegistry {
    validators: Vec<Arc<dyn TokenValidator>>,
}

impl ValidatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a validator. Registration order is dispatch order.
    pub fn register(&mut self, validator: Arc<dyn TokenValidator>) {
        self.validators.push(validator);
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    /// Try each validator in order until one accepts the token.
    ///
    /// # Errors
    ///
    /// - `DispatchError::Rejected` with zero entries when no validator can read
    ///   the token, otherwise one entry per rejecting validator
    /// - `DispatchError::Fault` when a validator reports an internal failure
    pub fn dispatch(
        &self,
        token: &str,
        params: &ValidationParameters,
    ) -> Result<Identity, DispatchError> {
        let mut failures = ValidationFailures::default();

        for validator in &self.validators {
            if !validator.can_read(token) {
                tracing::trace!(
                    target: "gate.auth.registry",
                    validator = validator.name(),
                    "Validator cannot read token"
                );
                continue;
            }

            match validator.validate(token, params) {
                Ok(identity) => return Ok(identity),
                Err(TokenValidationError::Internal(message)) => {
                    return Err(DispatchError::Fault {
                        validator: validator.name(),
                        message,
                    });
                }
                Err(error) => {
                    tracing::info!(
                        target: "gate.auth.registry",
                        validator = validator.name(),
                        error = %error,
                        "Token validation failed"
                    );
                    failures.push(ValidationFailure {
                        validator: validator.name(),
                        error,
                    });
                }
            }
        }

        Err(DispatchError::Rejected(failures))
    }
}

impl fmt::Debug for ValidatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.validators.iter().map(|v| v.name()))
            .finish()
    }
}
