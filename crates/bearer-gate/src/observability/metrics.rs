//! Metrics definitions for the bearer gate.
//!
//! All metrics follow Prometheus naming conventions:
//! - `gate_` prefix
//! - `_total` suffix for counters
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `outcome`: 4 values (authenticated, unauthenticated, forbidden, error)
//! - `status`: 2 values (success, error)
//!
//! The library never installs a recorder; the host process decides where
//! metrics go.

use metrics::counter;

/// Gate decision for one gated request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    Authenticated,
    Unauthenticated,
    Forbidden,
    Error,
}

impl AuthOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            AuthOutcome::Authenticated => "authenticated",
            AuthOutcome::Unauthenticated => "unauthenticated",
            AuthOutcome::Forbidden => "forbidden",
            AuthOutcome::Error => "error",
        }
    }
}

/// Record the gate decision for a gated request.
///
/// Metric: `gate_auth_outcomes_total`
/// Labels: `outcome`
pub fn record_auth_outcome(outcome: AuthOutcome) {
    counter!("gate_auth_outcomes_total", "outcome" => outcome.as_str()).increment(1);
}

/// Record an issuer metadata fetch.
///
/// Metric: `gate_metadata_fetches_total`
/// Labels: `status` (success, error)
pub fn record_metadata_fetch(status: &'static str) {
    counter!("gate_metadata_fetches_total", "status" => status).increment(1);
}

/// Record a key-rollover driven metadata refresh request.
///
/// Metric: `gate_metadata_refresh_requests_total`
pub fn record_metadata_refresh_requested() {
    counter!("gate_metadata_refresh_requests_total").increment(1);
}
