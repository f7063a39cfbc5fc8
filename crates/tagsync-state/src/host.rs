//! Host seams
//!
//! Facts and services the surrounding environment provides. tagsync treats
//! ownership answers as ground truth and never computes them itself.

use tagsync_core::{EntityId, MutationRequest, Role};

/// Ownership model of the host
pub trait Ownership: Send + Sync {
    /// Role of this participant for `entity`'s tag state
    fn current_role(&self, entity: EntityId) -> Role;

    /// Whether this participant may mutate `entity` right now. Checked again
    /// at apply time to catch stale or forged calls.
    fn has_authority_on_owner(&self, entity: EntityId) -> bool;
}

/// Outbound replication hooks of the host transport.
///
/// Both calls are fire-and-forget and must not block the caller.
pub trait ReplicationLink: Send + Sync {
    /// Deliver a mutation request to the current authority.
    /// Delivery is assumed reliable and at-least-once.
    fn send_mutation_request(&self, entity: EntityId, request: MutationRequest);

    /// Request that a fresh snapshot of `entity` be scheduled for all observers
    fn mark_dirty(&self, entity: EntityId);
}

/// Ownership that always answers with one role. For standalone components
/// and tests.
#[derive(Clone, Copy, Debug)]
pub struct FixedRole(pub Role);

impl Ownership for FixedRole {
    fn current_role(&self, _entity: EntityId) -> Role {
        self.0
    }

    fn has_authority_on_owner(&self, _entity: EntityId) -> bool {
        self.0.is_authority()
    }
}

/// Link that drops everything. For components with no network.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullLink;

impl ReplicationLink for NullLink {
    fn send_mutation_request(&self, _entity: EntityId, _request: MutationRequest) {}

    fn mark_dirty(&self, _entity: EntityId) {}
}
