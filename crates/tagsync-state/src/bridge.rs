//! Replication bridge - connects a component to the host transport
//!
//! Authority side: an applied change marks the entity dirty so the host
//! schedules a snapshot push. Observer side: an inbound snapshot replaces
//! the mirror and notifies listeners if membership differs.
//!
//! Snapshots are assumed to arrive in the order the authority issued them.
//! No sequence reconciliation happens here.

use std::sync::Arc;

use parking_lot::RwLock;
use tagsync_core::{EntityId, MutationRequest, TagSet};

use crate::{ChangeNotifier, ReplicationLink};

/// Per-entity bridge to the host transport
pub struct ReplicationBridge {
    entity: EntityId,
    link: Arc<dyn ReplicationLink>,
    notifier: Arc<ChangeNotifier>,
}

impl ReplicationBridge {
    pub fn new(
        entity: EntityId,
        link: Arc<dyn ReplicationLink>,
        notifier: Arc<ChangeNotifier>,
    ) -> Self {
        ReplicationBridge {
            entity,
            link,
            notifier,
        }
    }

    /// Authority side: the set changed. Must be called once per applied
    /// change and never when nothing changed. Call without holding the
    /// tag lock, listeners re-query.
    pub fn on_local_change(&self) {
        self.link.mark_dirty(self.entity);
        self.notifier.notify();
    }

    /// Observer side: hand a request to the transport for the authority
    pub fn forward(&self, request: MutationRequest) {
        tracing::trace!(entity = %self.entity, op = ?request.op(), "forwarding to authority");
        self.link.send_mutation_request(self.entity, request);
    }

    /// Observer side: replace the mirror with `snapshot`.
    ///
    /// Notifies exactly once if membership changed, never otherwise.
    /// Returns whether it changed.
    pub fn on_snapshot_received(&self, mirror: &RwLock<TagSet>, snapshot: TagSet) -> bool {
        let changed = {
            let mut current = mirror.write();
            if *current == snapshot {
                false
            } else {
                if tracing::enabled!(tracing::Level::DEBUG) {
                    let diff = current.diff(&snapshot);
                    tracing::debug!(
                        entity = %self.entity,
                        added = diff.added.len(),
                        removed = diff.removed.len(),
                        "snapshot applied"
                    );
                }
                *current = snapshot;
                true
            }
        };

        if changed {
            self.notifier.notify();
        }
        changed
    }
}

impl std::fmt::Debug for ReplicationBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplicationBridge")
            .field("entity", &self.entity)
            .finish_non_exhaustive()
    }
}
