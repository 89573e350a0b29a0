//! Request-scoped context the gate reads from and writes to.

use crate::auth::identity::Identity;
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, Extensions, HeaderMap, StatusCode},
};
use std::convert::Infallible;

/// What the gate needs from the host's request object.
pub trait RequestContext: Send + Sync {
    /// Inbound request headers.
    fn headers(&self) -> &HeaderMap;

    /// Record a terminal status; the handler will not run.
    fn set_response(&mut self, status: StatusCode);

    /// The identity attached to this request, or the anonymous identity.
    fn current_identity(&self) -> Identity;

    /// Attach an identity for the rest of the request.
    fn set_identity(&mut self, identity: Identity);
}

/// [`RequestContext`] over axum request parts.
///
/// The identity lives in the request extensions, where [`CurrentIdentity`]
/// finds it later.
#[derive(Debug)]
pub struct PartsContext<'a> {
    parts: &'a mut Parts,
    response: Option<StatusCode>,
}

impl<'a> PartsContext<'a> {
    pub fn new(parts: &'a mut Parts) -> Self {
        Self {
            parts,
            response: None,
        }
    }

    /// Status recorded by [`RequestContext::set_response`], if any.
    pub fn response(&self) -> Option<StatusCode> {
        self.response
    }
}

impl RequestContext for PartsContext<'_> {
    fn headers(&self) -> &HeaderMap {
        &self.parts.headers
    }

    fn set_response(&mut self, status: StatusCode) {
        self.response = Some(status);
    }

    fn current_identity(&self) -> Identity {
        identity_from_extensions(&self.parts.extensions)
    }

    fn set_identity(&mut self, identity: Identity) {
        self.parts.extensions.insert(identity);
    }
}

fn identity_from_extensions(extensions: &Extensions) -> Identity {
    extensions.get::<Identity>().cloned().unwrap_or_default()
}

/// Handler extractor for the caller's identity.
///
/// Never rejects: on routes that are not gated, or when nothing was
/// attached, it yields the anonymous identity.
///
/// ```rust,ignore
/// async fn me(CurrentIdentity(identity): CurrentIdentity) -> String {
///     identity.name().unwrap_or("anonymous").to_string()
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CurrentIdentity(pub Identity);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentIdentity
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(CurrentIdentity(identity_from_extensions(&parts.extensions)))
    }
}
