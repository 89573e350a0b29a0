//! Gate error types.
//!
//! Expected authentication and authorization failures resolve locally into a
//! terminal 401 or 403 response. Only internal faults surface as 500.
//! Response bodies are intentionally generic: the reason a token was rejected
//! is logged server-side and never echoed to the caller.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// `WWW-Authenticate` challenge attached to every 401 response.
pub const BEARER_CHALLENGE: &str = "Bearer realm=\"bearer-gate\", error=\"invalid_token\"";

/// Outcome of the gate that prevents the handler from running.
///
/// Maps to HTTP status codes:
/// - Unauthenticated: 401 Unauthorized
/// - Forbidden: 403 Forbidden
/// - Internal: 500 Internal Server Error
#[derive(Debug, Error)]
pub enum GateError {
    #[error("Authentication required")]
    Unauthenticated,

    #[error("Insufficient role")]
    Forbidden,

    #[error("Internal gate fault: {0}")]
    Internal(String),
}

impl GateError {
    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            GateError::Unauthenticated => StatusCode::UNAUTHORIZED,
            GateError::Forbidden => StatusCode::FORBIDDEN,
            GateError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: &'static str,
}

impl IntoResponse for GateError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let (code, message) = match &self {
            GateError::Unauthenticated => ("UNAUTHENTICATED", "Authentication required"),
            GateError::Forbidden => ("FORBIDDEN", "Access denied"),
            GateError::Internal(detail) => {
                // Log actual fault server-side, return generic message to client
                tracing::error!(target: "gate.errors", error = %detail, "Gate fault");
                ("INTERNAL_ERROR", "An internal error occurred")
            }
        };

        let mut response = (
            status,
            Json(ErrorResponse {
                error: ErrorDetail { code, message },
            }),
        )
            .into_response();

        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static(BEARER_CHALLENGE),
            );
        }

        response
    }
}
