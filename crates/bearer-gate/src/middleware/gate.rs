//! Request gate.
//!
//! Per request: look up whether the matched route is gated, authenticate the
//! caller, attach the identity, then check the route's roles. Expected
//! failures short-circuit with 401 or 403 and the handler never runs.

use crate::auth::engine::Authenticator;
use crate::auth::jwt::JwtTokenValidator;
use crate::auth::metadata::{IssuerMetadataCache, MetadataSource, OidcDiscoveryClient};
use crate::auth::params::BearerOptions;
use crate::auth::policy::{is_authorized, RoleRequirement};
use crate::auth::validator::{TokenValidator, ValidatorRegistry};
use crate::errors::GateError;
use crate::middleware::context::{PartsContext, RequestContext};
use crate::observability::metrics::{record_auth_outcome, AuthOutcome};
use axum::{
    extract::{MatchedPath, Request, State},
    http::{Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;

/// Authentication requirement of one route.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RouteAuth {
    /// Handler runs without authentication.
    #[default]
    NotGated,

    /// Caller must authenticate and hold one of the roles (if any).
    Gated(RoleRequirement),
}

impl RouteAuth {
    /// Gated route with a comma-separated role list; `""` accepts any caller
    /// with a valid token.
    pub fn require(roles: &str) -> Self {
        RouteAuth::Gated(RoleRequirement::parse(roles))
    }

    pub fn is_gated(&self) -> bool {
        matches!(self, RouteAuth::Gated(_))
    }
}

/// Route table consulted by the middleware, keyed by path template and method.
///
/// Paths that were never registered are not gated. A registered path fails
/// closed for methods it does not list: `HEAD` uses the `GET` entry, and any
/// other method takes the first gated entry registered for that path.
#[derive(Debug, Clone, Default)]
pub struct GateRoutes {
    routes: HashMap<String, Vec<(Method, RouteAuth)>>,
}

impl GateRoutes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `method path` (axum path template, e.g. `/v1/items/:id`).
    pub fn insert(&mut self, method: Method, path: impl Into<String>, auth: RouteAuth) {
        let entries = self.routes.entry(path.into()).or_default();
        match entries.iter_mut().find(|(m, _)| *m == method) {
            Some((_, existing)) => *existing = auth,
            None => entries.push((method, auth)),
        }
    }

    pub fn lookup(&self, method: &Method, path: &str) -> &RouteAuth {
        const NOT_GATED: &RouteAuth = &RouteAuth::NotGated;
        let Some(entries) = self.routes.get(path) else {
            return NOT_GATED;
        };

        let for_method = |wanted: &Method| {
            entries
                .iter()
                .find(|(m, _)| m == wanted)
                .map(|(_, auth)| auth)
        };

        for_method(method)
            .or_else(|| {
                if *method == Method::HEAD {
                    for_method(&Method::GET)
                } else {
                    None
                }
            })
            .or_else(|| entries.iter().map(|(_, auth)| auth).find(|a| a.is_gated()))
            .unwrap_or(NOT_GATED)
    }

    pub fn len(&self) -> usize {
        self.routes.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// Terminal state of the gate for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    /// Run the handler.
    Proceed,

    /// Respond with this status; the handler does not run.
    ShortCircuited(StatusCode),
}

/// Authentication and authorization for one request, independent of the
/// HTTP framework.
#[derive(Debug, Clone)]
pub struct RequestGate {
    authenticator: Authenticator,
}

impl RequestGate {
    pub fn new(authenticator: Authenticator) -> Self {
        Self { authenticator }
    }

    pub fn authenticator(&self) -> &Authenticator {
        &self.authenticator
    }

    /// Run the gate against `ctx` for a route with requirement `route`.
    ///
    /// # Errors
    ///
    /// Returns `GateError::Internal` when authentication faults. Nothing is
    /// attached to the context in that case.
    pub async fn evaluate<C: RequestContext>(
        &self,
        ctx: &mut C,
        route: &RouteAuth,
    ) -> Result<GateOutcome, GateError> {
        let RouteAuth::Gated(requirement) = route else {
            return Ok(GateOutcome::Proceed);
        };

        let identity = match self.authenticator.authenticate(ctx.headers()).await {
            Ok(Some(identity)) => identity,
            Ok(None) => {
                record_auth_outcome(AuthOutcome::Unauthenticated);
                ctx.set_response(StatusCode::UNAUTHORIZED);
                return Ok(GateOutcome::ShortCircuited(StatusCode::UNAUTHORIZED));
            }
            Err(e) => {
                record_auth_outcome(AuthOutcome::Error);
                return Err(e);
            }
        };

        let authorized = is_authorized(&identity, requirement);
        ctx.set_identity(identity);

        if !authorized {
            tracing::debug!(
                target: "gate.middleware.gate",
                required_roles = ?requirement.allowed_roles(),
                "Caller lacks a required role"
            );
            record_auth_outcome(AuthOutcome::Forbidden);
            ctx.set_response(StatusCode::FORBIDDEN);
            return Ok(GateOutcome::ShortCircuited(StatusCode::FORBIDDEN));
        }

        record_auth_outcome(AuthOutcome::Authenticated);
        Ok(GateOutcome::Proceed)
    }
}

/// A configured gate: validators, metadata cache, and route table.
///
/// Cheap to clone; clones share the metadata cache.
#[derive(Debug, Clone)]
pub struct JwtBearerGate {
    gate: Arc<RequestGate>,
    routes: Arc<GateRoutes>,
}

impl JwtBearerGate {
    pub fn builder(options: BearerOptions) -> JwtBearerGateBuilder {
        JwtBearerGateBuilder {
            options,
            extra_validators: Vec::new(),
            metadata_source: None,
            routes: GateRoutes::new(),
        }
    }

    pub fn request_gate(&self) -> &RequestGate {
        &self.gate
    }

    pub fn routes(&self) -> &GateRoutes {
        &self.routes
    }

    pub fn metadata_cache(&self) -> Option<&Arc<IssuerMetadataCache>> {
        self.gate.authenticator().metadata_cache()
    }
}

/// Builder for [`JwtBearerGate`].
///
/// The JWT validator is always registered first; validators added with
/// [`validator`](Self::validator) are tried after it, in order.
pub struct JwtBearerGateBuilder {
    options: BearerOptions,
    extra_validators: Vec<Arc<dyn TokenValidator>>,
    metadata_source: Option<Arc<dyn MetadataSource>>,
    routes: GateRoutes,
}

impl JwtBearerGateBuilder {
    pub fn validator(mut self, validator: Arc<dyn TokenValidator>) -> Self {
        self.extra_validators.push(validator);
        self
    }

    /// Use `source` for issuer metadata instead of the discovery URL.
    pub fn metadata_source(mut self, source: Arc<dyn MetadataSource>) -> Self {
        self.metadata_source = Some(source);
        self
    }

    pub fn route(mut self, method: Method, path: impl Into<String>, auth: RouteAuth) -> Self {
        self.routes.insert(method, path, auth);
        self
    }

    pub fn build(self) -> JwtBearerGate {
        let mut registry = ValidatorRegistry::new();
        registry.register(Arc::new(JwtTokenValidator::new()));
        for validator in self.extra_validators {
            registry.register(validator);
        }

        let source = self.metadata_source.or_else(|| {
            self.options.discovery_url.as_ref().map(|url| {
                Arc::new(OidcDiscoveryClient::new(
                    url.clone(),
                    self.options.metadata_timeout,
                )) as Arc<dyn MetadataSource>
            })
        });

        let cache = source.map(|source| {
            Arc::new(
                IssuerMetadataCache::new(source, self.options.metadata_refresh_interval)
                    .with_min_refresh_interval(self.options.min_refresh_interval),
            )
        });

        tracing::debug!(
            target: "gate.middleware.gate",
            validators = registry.len(),
            routes = self.routes.len(),
            metadata = cache.is_some(),
            "Bearer gate configured"
        );

        let authenticator = Authenticator::new(Arc::new(self.options), cache, registry);

        JwtBearerGate {
            gate: Arc::new(RequestGate::new(authenticator)),
            routes: Arc::new(self.routes),
        }
    }
}

/// Axum middleware applying a [`JwtBearerGate`] to the matched route.
///
/// Install with `route_layer` so the matched path template is available.
#[instrument(skip_all, name = "gate.middleware.gate", fields(method = %req.method()))]
pub async fn bearer_gate(State(gate): State<JwtBearerGate>, req: Request, next: Next) -> Response {
    let route = {
        let path = req
            .extensions()
            .get::<MatchedPath>()
            .map_or_else(|| req.uri().path(), MatchedPath::as_str);
        gate.routes().lookup(req.method(), path).clone()
    };

    if !route.is_gated() {
        return next.run(req).await;
    }

    let (mut parts, body) = req.into_parts();
    let outcome = {
        let mut ctx = PartsContext::new(&mut parts);
        gate.request_gate().evaluate(&mut ctx, &route).await
    };

    match outcome {
        Ok(GateOutcome::Proceed) => next.run(Request::from_parts(parts, body)).await,
        Ok(GateOutcome::ShortCircuited(status)) => short_circuit(status),
        Err(e) => e.into_response(),
    }
}

fn short_circuit(status: StatusCode) -> Response {
    match status {
        StatusCode::UNAUTHORIZED => GateError::Unauthenticated.into_response(),
        StatusCode::FORBIDDEN => GateError::Forbidden.into_response(),
        other => other.into_response(),
    }
}
