//! Current caller handler.
//!
//! Echoes the identity the gate attached to the request.

use crate::middleware::CurrentIdentity;
use axum::Json;
use serde::Serialize;
use tracing::instrument;

/// One `(type, value)` claim in a response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClaimEntry {
    #[serde(rename = "type")]
    pub claim_type: String,
    pub value: String,
}

/// Response for `/v1/me` endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct MeResponse {
    /// Subject, if the token carried one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    pub authenticated: bool,

    pub roles: Vec<String>,

    /// All claims in token order.
    pub claims: Vec<ClaimEntry>,
}

/// Handler for GET /v1/me
///
/// ## Response
///
/// ```json
/// {
///   "sub": "alice",
///   "authenticated": true,
///   "roles": ["user"],
///   "claims": [{"type": "sub", "value": "alice"}, {"type": "roles", "value": "user"}]
/// }
/// ```
#[instrument(skip_all, name = "gate.handlers.me")]
pub async fn get_me(CurrentIdentity(identity): CurrentIdentity) -> Json<MeResponse> {
    tracing::debug!(target: "gate.handlers.me", "Returning caller identity");

    Json(MeResponse {
        sub: identity.name().map(ToString::to_string),
        authenticated: identity.is_authenticated(),
        roles: identity.roles().map(ToString::to_string).collect(),
        claims: identity
            .claims()
            .iter()
            .map(|c| ClaimEntry {
                claim_type: c.claim_type.clone(),
                value: c.value.clone(),
            })
            .collect(),
    })
}
