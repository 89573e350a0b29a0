//! Admin-only handler. The gate only lets callers with role `admin` in.

use crate::middleware::CurrentIdentity;
use axum::Json;
use serde::Serialize;
use tracing::instrument;

#[derive(Debug, Clone, Serialize)]
pub struct AdminResponse {
    pub message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
}

/// Handler for GET /v1/admin
#[instrument(skip_all, name = "gate.handlers.admin")]
pub async fn get_admin(CurrentIdentity(identity): CurrentIdentity) -> Json<AdminResponse> {
    Json(AdminResponse {
        message: "admin access granted",
        sub: identity.name().map(ToString::to_string),
    })
}
