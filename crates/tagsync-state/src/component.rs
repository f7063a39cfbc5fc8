//! Tag component - the per-entity public surface
//!
//! Created with its entity and dropped with it. Holds the tag set (canonical
//! on the authority, last received mirror on observers), the mutation engine,
//! the replication bridge and the change listeners.
//!
//! Mutations and snapshot application hold the write lock for their whole
//! duration. Listeners always run after the lock is released.

use std::sync::Arc;

use parking_lot::RwLock;
use tagsync_core::{
    EntityId, MutationOutcome, MutationRequest, RejectReason, Role, SubscriptionId, Tag, TagSet,
};

use crate::{
    AllowAll, AuthorityGate, ChangeNotifier, MutationEngine, Ownership, ReplicationBridge,
    ReplicationLink, Route, TagValidator,
};

/// Replicated tag state of one entity
pub struct TagComponent {
    entity: EntityId,
    tags: RwLock<TagSet>,
    ownership: Arc<dyn Ownership>,
    engine: MutationEngine,
    bridge: ReplicationBridge,
    notifier: Arc<ChangeNotifier>,
}

impl TagComponent {
    /// Create an empty component that accepts every well-formed tag
    pub fn new(
        entity: EntityId,
        ownership: Arc<dyn Ownership>,
        link: Arc<dyn ReplicationLink>,
    ) -> Self {
        Self::with_validator(entity, ownership, link, Arc::new(AllowAll))
    }

    /// Create an empty component with a custom admission policy
    pub fn with_validator(
        entity: EntityId,
        ownership: Arc<dyn Ownership>,
        link: Arc<dyn ReplicationLink>,
        validator: Arc<dyn TagValidator>,
    ) -> Self {
        let notifier = Arc::new(ChangeNotifier::new());
        TagComponent {
            entity,
            tags: RwLock::new(TagSet::new()),
            ownership,
            engine: MutationEngine::new(validator),
            bridge: ReplicationBridge::new(entity, link, Arc::clone(&notifier)),
            notifier,
        }
    }

    pub fn entity(&self) -> EntityId {
        self.entity
    }

    /// Role as currently reported by the host
    pub fn role(&self) -> Role {
        self.ownership.current_role(self.entity)
    }

    // ---------------------------------------------------------------------
    // Mutation requests (role-routed)
    // ---------------------------------------------------------------------

    /// Submit a mutation. Applied here on the authority, forwarded otherwise.
    ///
    /// A request too large to forward in one frame is refused here rather
    /// than lost on the way.
    pub fn request(&self, request: MutationRequest) -> MutationOutcome {
        match AuthorityGate::route(self.role(), &request) {
            Route::ApplyLocally => self.apply(&request),
            Route::ForwardToAuthority => {
                if let Some(reason) = self.engine.check_forwardable(&request) {
                    tracing::debug!(
                        entity = %self.entity,
                        op = ?request.op(),
                        %reason,
                        "request not forwarded"
                    );
                    return MutationOutcome::Rejected(reason);
                }
                self.bridge.forward(request);
                MutationOutcome::Forwarded
            }
        }
    }

    pub fn request_add(&self, tag: Tag) -> MutationOutcome {
        self.request(MutationRequest::Add(tag))
    }

    pub fn request_remove(&self, tag: Tag) -> MutationOutcome {
        self.request(MutationRequest::Remove(tag))
    }

    pub fn request_add_batch(&self, tags: TagSet) -> MutationOutcome {
        self.request(MutationRequest::AddBatch(tags))
    }

    pub fn request_remove_batch(&self, tags: TagSet) -> MutationOutcome {
        self.request(MutationRequest::RemoveBatch(tags))
    }

    /// Apply a request that arrived from another participant.
    ///
    /// Never forwards again: if this participant is not the authority the
    /// request is refused.
    pub fn apply_remote(&self, request: &MutationRequest) -> MutationOutcome {
        self.apply(request)
    }

    fn apply(&self, request: &MutationRequest) -> MutationOutcome {
        let role = if self.ownership.has_authority_on_owner(self.entity) {
            Role::Authority
        } else {
            Role::Observer
        };

        let outcome = {
            let mut tags = self.tags.write();
            self.engine.apply(self.entity, role, &mut tags, request)
        };

        if outcome.changed() {
            self.bridge.on_local_change();
        }
        outcome
    }

    // ---------------------------------------------------------------------
    // Snapshots
    // ---------------------------------------------------------------------

    /// Replace the local mirror with an authoritative snapshot.
    ///
    /// Ignored on the authority, whose copy is canonical. Returns whether the
    /// mirror changed; listeners were notified exactly once if so.
    pub fn receive_snapshot(&self, snapshot: TagSet) -> bool {
        if self.role().is_authority() {
            tracing::warn!(entity = %self.entity, "snapshot received by the authority, ignored");
            return false;
        }
        self.bridge.on_snapshot_received(&self.tags, snapshot)
    }

    /// Copy of the current set for transmission
    pub fn snapshot(&self) -> TagSet {
        self.tags.read().snapshot()
    }

    // ---------------------------------------------------------------------
    // Queries (always local; may be stale on observers)
    // ---------------------------------------------------------------------

    pub fn contains(&self, tag: &Tag) -> bool {
        self.tags.read().contains(tag)
    }

    pub fn contains_all(&self, tags: &TagSet) -> bool {
        self.tags.read().contains_all(tags)
    }

    pub fn contains_any(&self, tags: &TagSet) -> bool {
        self.tags.read().contains_any(tags)
    }

    pub fn all_tags(&self) -> TagSet {
        self.snapshot()
    }

    pub fn len(&self) -> usize {
        self.tags.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.read().is_empty()
    }

    // ---------------------------------------------------------------------
    // Listeners
    // ---------------------------------------------------------------------

    /// Register a change listener, fired after any change to the set
    /// (local apply or inbound snapshot). See [`ChangeNotifier::subscribe`]
    /// for panic behavior.
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.notifier.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.notifier.unsubscribe(id)
    }
}

impl std::fmt::Debug for TagComponent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TagComponent")
            .field("entity", &self.entity)
            .field("tags", &*self.tags.read())
            .finish_non_exhaustive()
    }
}

/// Whether an outcome means the authority refused for lack of authority
pub fn is_stale_authority(outcome: &MutationOutcome) -> bool {
    matches!(outcome, MutationOutcome::Rejected(RejectReason::NotAuthority))
}
