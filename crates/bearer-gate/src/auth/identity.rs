//! Authenticated identity built from validated token claims.
//!
//! An [`Identity`] is an ordered list of `(type, value)` claims plus the set
//! of claim types that count as roles. Roles are a view over the claims, not
//! a separate copy. Claim values are redacted in Debug output.

use serde_json::{Map, Value};
use std::fmt;

/// Authentication type recorded on identities produced by bearer validation.
pub const BEARER_AUTHENTICATION_TYPE: &str = "Bearer";

/// Claim types treated as roles when nothing else is configured.
pub const DEFAULT_ROLE_CLAIM_TYPES: &[&str] = &["roles", "role"];

/// A single `(type, value)` claim.
#[derive(Clone, PartialEq, Eq)]
pub struct Claim {
    pub claim_type: String,
    pub value: String,
}

impl Claim {
    pub fn new(claim_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            claim_type: claim_type.into(),
            value: value.into(),
        }
    }
}

impl fmt::Debug for Claim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Claim")
            .field("claim_type", &self.claim_type)
            .field("value", &"[REDACTED]")
            .finish()
    }
}

/// The caller's identity for the remainder of a request.
///
/// `Identity::default()` is the anonymous identity: no claims and no
/// authentication type.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Identity {
    authentication_type: Option<String>,
    claims: Vec<Claim>,
    role_claim_types: Vec<String>,
}

impl Identity {
    /// The anonymous identity.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Build an authenticated identity from explicit claims.
    pub fn new(
        authentication_type: impl Into<String>,
        claims: Vec<Claim>,
        role_claim_types: &[String],
    ) -> Self {
        Self {
            authentication_type: Some(authentication_type.into()),
            claims,
            role_claim_types: role_claim_types.to_vec(),
        }
    }

    /// Build an authenticated identity from a validated JWT payload.
    ///
    /// Arrays expand into one claim per element, strings are taken verbatim,
    /// `null` is dropped, and any other value is kept as its JSON text.
    pub fn from_json_claims(payload: &Map<String, Value>, role_claim_types: &[String]) -> Self {
        let mut claims = Vec::with_capacity(payload.len());
        for (claim_type, value) in payload {
            push_claim_values(&mut claims, claim_type, value);
        }
        Self::new(BEARER_AUTHENTICATION_TYPE, claims, role_claim_types)
    }

    /// Whether this identity came out of a successful authentication.
    pub fn is_authenticated(&self) -> bool {
        self.authentication_type.is_some()
    }

    pub fn authentication_type(&self) -> Option<&str> {
        self.authentication_type.as_deref()
    }

    /// All claims in token order.
    pub fn claims(&self) -> &[Claim] {
        &self.claims
    }

    /// First value of the given claim type.
    pub fn find_first(&self, claim_type: &str) -> Option<&str> {
        self.claims
            .iter()
            .find(|c| c.claim_type == claim_type)
            .map(|c| c.value.as_str())
    }

    /// Subject of the token (`sub`), falling back to `name`.
    pub fn name(&self) -> Option<&str> {
        self.find_first("sub").or_else(|| self.find_first("name"))
    }

    /// Role values, in claim order.
    pub fn roles(&self) -> impl Iterator<Item = &str> {
        self.claims
            .iter()
            .filter(|c| self.role_claim_types.iter().any(|t| *t == c.claim_type))
            .map(|c| c.value.as_str())
    }

    /// Exact, case-sensitive role membership.
    pub fn is_in_role(&self, role: &str) -> bool {
        self.roles().any(|r| r == role)
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("authentication_type", &self.authentication_type)
            .field("claims", &self.claims)
            .field("role_claim_types", &self.role_claim_types)
            .finish()
    }
}

fn push_claim_values(claims: &mut Vec<Claim>, claim_type: &str, value: &Value) {
    match value {
        Value::Null => {}
        Value::String(s) => claims.push(Claim::new(claim_type, s.clone())),
        Value::Array(items) => {
            for item in items {
                // Nested arrays are not flattened further
                match item {
                    Value::Null => {}
                    Value::String(s) => claims.push(Claim::new(claim_type, s.clone())),
                    other => claims.push(Claim::new(claim_type, other.to_string())),
                }
            }
        }
        other => claims.push(Claim::new(claim_type, other.to_string())),
    }
}
