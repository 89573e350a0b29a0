//! Bearer token authentication and role authorization.
//!
//! # Components
//!
//! - `metadata` - Issuer metadata cache (discovery document + JWKS)
//! - `keys` - JWK to verification key conversion
//! - `params` - Static options and per-request validation parameters
//! - `validator` - Validator trait and ordered registry
//! - `jwt` - Signed JWT validator
//! - `engine` - Authentication decision engine
//! - `policy` - Role requirement evaluation
//! - `identity` - Claims-based identity

pub mod engine;
pub mod identity;
pub mod jwt;
pub mod keys;
pub mod metadata;
pub mod params;
pub mod policy;
pub mod validator;

pub use engine::{extract_bearer_token, Authenticator};
pub use identity::{Claim, Identity};
pub use jwt::JwtTokenValidator;
pub use keys::{parse_jwks, KeyError, SigningKey};
pub use metadata::{
    IssuerMetadata, IssuerMetadataCache, MetadataError, MetadataSource, OidcDiscoveryClient,
};
pub use params::{BearerOptions, ValidationParameters};
pub use policy::{is_authorized, RoleRequirement};
pub use validator::{
    DispatchError, TokenValidationError, TokenValidator, ValidationFailure, ValidationFailures,
    ValidatorRegistry,
};
