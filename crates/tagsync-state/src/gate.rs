//! Authority gate - local apply vs. forward to the authority
//!
//! All role checks for mutation routing live here. Read-only queries are
//! never gated: they are served from the local copy on every participant,
//! which on an observer may lag until the next snapshot arrives.

use tagsync_core::{MutationRequest, Role};

/// Routing decision for a mutation request
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route {
    /// This participant is the authority; apply now
    ApplyLocally,
    /// Send to the authority; never touch the local mirror
    ForwardToAuthority,
}

/// Stateless routing function
#[derive(Clone, Copy, Debug, Default)]
pub struct AuthorityGate;

impl AuthorityGate {
    /// An authority never forwards to itself. An observer never applies
    /// speculatively, so its mirror cannot diverge while a request is in flight.
    pub fn route(role: Role, request: &MutationRequest) -> Route {
        let route = match role {
            Role::Authority => Route::ApplyLocally,
            Role::Observer => Route::ForwardToAuthority,
        };
        tracing::trace!(%role, op = ?request.op(), ?route, "routed mutation");
        route
    }
}
