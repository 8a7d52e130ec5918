//! Graph store contract consumed by the snapshot and version logic

use crate::model::{
    Entity, EntityId, NewEntity, NewRelation, Relation, RelationId, TypeKind, TypeRecord, UserId,
};
use crate::Result;

/// Read access to one user's graph
///
/// Collections come back in store order, which is creation order.
pub trait GraphRead {
    fn entities(&self) -> Vec<&Entity>;

    fn relations(&self) -> Vec<&Relation>;

    fn types(&self, kind: TypeKind) -> Vec<&TypeRecord>;

    fn entity(&self, id: EntityId) -> Option<&Entity>;

    fn relation(&self, id: RelationId) -> Option<&Relation>;

    fn has_type(&self, kind: TypeKind, name: &str) -> bool {
        self.types(kind).iter().any(|t| t.name == name)
    }

    /// Whether any entity (or relation) currently carries this type label
    fn type_in_use(&self, kind: TypeKind, name: &str) -> bool {
        match kind {
            TypeKind::Entity => self.entities().iter().any(|e| e.entity_type == name),
            TypeKind::Relation => self.relations().iter().any(|r| r.relation_type == name),
        }
    }
}

/// Write access to one user's graph, scoped to a single owner
///
/// Every create returns the row with its store-assigned id. Implementations
/// enforce referential integrity for relations and per-user uniqueness of
/// type names.
pub trait GraphStore: GraphRead {
    fn owner(&self) -> UserId;

    fn insert_entity(&mut self, entity: NewEntity) -> Result<Entity>;

    fn update_entity(&mut self, id: EntityId, entity: NewEntity) -> Result<Entity>;

    /// Delete an entity and every relation where it is source or target.
    /// Returns the removed entity and the number of relations removed with it.
    fn delete_entity(&mut self, id: EntityId) -> Result<(Entity, usize)>;

    fn insert_relation(&mut self, relation: NewRelation) -> Result<Relation>;

    fn update_relation(&mut self, id: RelationId, relation: NewRelation) -> Result<Relation>;

    fn delete_relation(&mut self, id: RelationId) -> Result<Relation>;

    /// Insert a type record; fails with `Conflict` if the name exists
    fn insert_type(&mut self, kind: TypeKind, name: &str) -> Result<TypeRecord>;

    /// Insert a type record unless one with that name exists
    fn ensure_type(&mut self, kind: TypeKind, name: &str) -> Result<Option<TypeRecord>>;

    /// Rename a type record and rewrite every row using the old name.
    /// Returns the number of entities or relations rewritten.
    fn rename_type(&mut self, kind: TypeKind, from: &str, to: &str) -> Result<usize>;

    /// Remove a type record; fails with `Conflict` while rows still use it
    fn delete_type(&mut self, kind: TypeKind, name: &str) -> Result<TypeRecord>;

    fn clear_relations(&mut self) -> usize;

    /// Remove every entity. Relations must be cleared first; the store does
    /// not cascade here and refuses to leave dangling endpoints.
    fn clear_entities(&mut self) -> Result<usize>;

    fn clear_types(&mut self, kind: TypeKind) -> usize;
}
