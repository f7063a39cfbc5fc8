//! Entity ownership table

use std::collections::HashMap;

use parking_lot::RwLock;

use tagsync_core::{EntityId, NodeId, Role};
use tagsync_state::Ownership;

/// Which node owns each entity, as seen by one replica.
///
/// Entities with no recorded owner are treated as observed: nothing mutates
/// them locally until an owner is assigned.
#[derive(Debug)]
pub struct OwnershipTable {
    local: NodeId,
    owners: RwLock<HashMap<EntityId, NodeId>>,
}

impl OwnershipTable {
    pub fn new(local: NodeId) -> Self {
        OwnershipTable {
            local,
            owners: RwLock::new(HashMap::new()),
        }
    }

    pub fn local(&self) -> NodeId {
        self.local
    }

    /// Record `owner` for `entity`, returning the previous owner
    pub fn set_owner(&self, entity: EntityId, owner: NodeId) -> Option<NodeId> {
        self.owners.write().insert(entity, owner)
    }

    pub fn owner_of(&self, entity: EntityId) -> Option<NodeId> {
        self.owners.read().get(&entity).copied()
    }

    pub fn forget(&self, entity: EntityId) -> Option<NodeId> {
        self.owners.write().remove(&entity)
    }

    pub fn is_local_owner(&self, entity: EntityId) -> bool {
        self.owner_of(entity) == Some(self.local)
    }

    /// Entities owned by this replica
    pub fn owned(&self) -> Vec<EntityId> {
        self.owners
            .read()
            .iter()
            .filter(|(_, owner)| **owner == self.local)
            .map(|(entity, _)| *entity)
            .collect()
    }
}

impl Ownership for OwnershipTable {
    fn current_role(&self, entity: EntityId) -> Role {
        if self.is_local_owner(entity) {
            Role::Authority
        } else {
            Role::Observer
        }
    }

    fn has_authority_on_owner(&self, entity: EntityId) -> bool {
        self.is_local_owner(entity)
    }
}
