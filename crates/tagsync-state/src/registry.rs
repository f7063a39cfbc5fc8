//! Component registry - the tag components hosted by one participant

use std::collections::HashMap;
use std::sync::Arc;

use tagsync_core::EntityId;

use crate::TagComponent;

/// Tag components indexed by entity
#[derive(Debug, Default)]
pub struct ComponentRegistry {
    components: HashMap<EntityId, Arc<TagComponent>>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        ComponentRegistry::default()
    }

    /// Insert a component, replacing and returning any previous one for the entity
    pub fn insert(&mut self, component: Arc<TagComponent>) -> Option<Arc<TagComponent>> {
        self.components.insert(component.entity(), component)
    }

    pub fn get(&self, entity: EntityId) -> Option<&Arc<TagComponent>> {
        self.components.get(&entity)
    }

    pub fn remove(&mut self, entity: EntityId) -> Option<Arc<TagComponent>> {
        self.components.remove(&entity)
    }

    pub fn contains(&self, entity: EntityId) -> bool {
        self.components.contains_key(&entity)
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&EntityId, &Arc<TagComponent>)> {
        self.components.iter()
    }

    pub fn entities(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.components.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FixedRole, NullLink};
    use tagsync_core::Role;

    fn component(id: u64) -> Arc<TagComponent> {
        Arc::new(TagComponent::new(
            EntityId::new(id),
            Arc::new(FixedRole(Role::Authority)),
            Arc::new(NullLink),
        ))
    }

    #[test]
    fn test_registry_basic() {
        let mut registry = ComponentRegistry::new();
        assert!(registry.insert(component(1)).is_none());
        assert!(registry.insert(component(2)).is_none());

        assert!(registry.contains(EntityId::new(1)));
        assert_eq!(registry.len(), 2);

        assert!(registry.insert(component(1)).is_some());
        assert_eq!(registry.len(), 2);

        assert!(registry.remove(EntityId::new(2)).is_some());
        assert!(registry.get(EntityId::new(2)).is_none());
        assert_eq!(registry.entities().collect::<Vec<_>>(), vec![EntityId::new(1)]);
    }
}
