//! Bearer Gate
//!
//! JWT bearer authentication and role authorization in front of axum
//! handlers:
//!
//! - Issuer metadata (issuer + signing keys) fetched lazily from an OpenID
//!   Connect discovery endpoint and cached as an immutable snapshot
//! - Ordered, pluggable token validators with a built-in JWT validator
//! - Key-rollover handling: an unknown signing key triggers a metadata refresh
//! - Per-route role requirements with OR semantics
//!
//! # Modules
//!
//! - `auth` - Metadata cache, validators, decision engine, role policy
//! - `middleware` - Request gate and axum integration
//! - `config` - Configuration from environment
//! - `errors` - Gate error type with HTTP status mapping
//! - `handlers` / `routes` - Demo service
//! - `observability` - Metrics

pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod observability;
pub mod routes;

pub use auth::{BearerOptions, Identity, ValidationParameters};
pub use errors::GateError;
pub use middleware::{bearer_gate, CurrentIdentity, JwtBearerGate, RouteAuth};
