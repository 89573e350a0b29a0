//! Request gating middleware.
//!
//! # Components
//!
//! - `context` - Request context seam and the `CurrentIdentity` extractor
//! - `gate` - Route table, gate state machine, and the axum middleware

pub mod context;
pub mod gate;

pub use context::{CurrentIdentity, PartsContext, RequestContext};
pub use gate::{
    bearer_gate, GateOutcome, GateRoutes, JwtBearerGate, JwtBearerGateBuilder, RequestGate,
    RouteAuth,
};
