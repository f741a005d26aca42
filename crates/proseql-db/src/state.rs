use std::sync::Arc;

use proseql_store::{Entity, EntityMap};

use crate::index::IndexState;

/// One collection's complete state: the id→entity map and every secondary
/// index derived from it. The two always travel together — a snapshot or a
/// pointer swap covers both, so readers can never observe an entity map and
/// an index that disagree.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionData {
    pub entities: EntityMap,
    pub indexes: IndexState,
}

impl CollectionData {
    pub fn new(index_declarations: &[Vec<String>]) -> Self {
        Self {
            entities: EntityMap::new(),
            indexes: IndexState::new(index_declarations),
        }
    }

    /// Build state from an existing entity map, indexing everything.
    pub fn build(index_declarations: &[Vec<String>], entities: EntityMap) -> Self {
        let indexes = IndexState::build(index_declarations, &entities);
        Self { entities, indexes }
    }

    pub fn get(&self, id: &str) -> Option<&Arc<Entity>> {
        self.entities.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entities.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Insert or replace, keeping indexes in step.
    pub fn set(&mut self, entity: Arc<Entity>) {
        match self.entities.get(&entity.id) {
            Some(old) => self.indexes.on_update(old, &entity),
            None => self.indexes.on_create(&entity),
        }
        self.entities.insert(entity.id.clone(), entity);
    }

    /// Remove by id, keeping indexes in step. Returns the removed entity.
    pub fn remove(&mut self, id: &str) -> Option<Arc<Entity>> {
        let removed = self.entities.remove(id)?;
        self.indexes.on_delete(&removed);
        Some(removed)
    }

    /// Replace an entity with a derived one.
    pub fn update(
        &mut self,
        id: &str,
        f: impl FnOnce(&Entity) -> Entity,
    ) -> Option<Arc<Entity>> {
        let current = self.entities.get(id)?.clone();
        let next = Arc::new(f(&current));
        self.set(next.clone());
        Some(next)
    }
}
