//! HTTP routes for the demo service.
//!
//! Defines the Axum router and the gate's route table. Each gated route is
//! registered twice: on the router, and in the gate's [`GateRoutes`] under
//! the same method and path template.
//!
//! [`GateRoutes`]: crate::middleware::GateRoutes

use crate::config::GateConfig;
use crate::handlers;
use crate::middleware::{bearer_gate, JwtBearerGate, RouteAuth};
use axum::{http::Method, middleware, routing::get, Router};
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Application state shared across the router.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Service configuration.
    pub config: GateConfig,

    /// Configured bearer gate.
    pub gate: JwtBearerGate,
}

impl AppState {
    /// Build the gate for `config` with the demo route table.
    pub fn new(config: GateConfig) -> Self {
        let gate = JwtBearerGate::builder(config.bearer_options())
            .route(Method::GET, "/v1/me", RouteAuth::require(""))
            .route(Method::GET, "/v1/admin", RouteAuth::require("admin"))
            .build();
        Self { config, gate }
    }
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/health` - Liveness check - public
/// - `/v1/me` - Current caller - any authenticated caller
/// - `/v1/admin` - Admin endpoint - role `admin`
/// - TraceLayer for request logging
/// - 30 second request timeout
pub fn build_routes(state: AppState) -> Router {
    let public_routes = Router::new().route("/health", get(handlers::health_check));

    // route_layer: the gate only runs for matched routes and sees MatchedPath
    let gated_routes = Router::new()
        .route("/v1/me", get(handlers::get_me))
        .route("/v1/admin", get(handlers::get_admin))
        .route_layer(middleware::from_fn_with_state(state.gate.clone(), bearer_gate));

    public_routes
        .merge(gated_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
}
