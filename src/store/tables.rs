//! In-memory tables: id sequences and per-user partitions

use super::traits::{GraphRead, GraphStore};
use crate::model::{
    Entity, EntityId, NewEntity, NewRelation, Relation, RelationId, Snapshot, TypeId, TypeKind,
    TypeRecord, UserId, Version, VersionId,
};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Store-wide id allocators. Ids increase monotonically and are never reused.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Sequences {
    entity: u64,
    relation: u64,
    entity_type: u64,
    relation_type: u64,
    version: u64,
}

impl Sequences {
    fn next_entity(&mut self) -> EntityId {
        self.entity += 1;
        EntityId(self.entity)
    }

    fn next_relation(&mut self) -> RelationId {
        self.relation += 1;
        RelationId(self.relation)
    }

    fn next_type(&mut self, kind: TypeKind) -> TypeId {
        let counter = match kind {
            TypeKind::Entity => &mut self.entity_type,
            TypeKind::Relation => &mut self.relation_type,
        };
        *counter += 1;
        TypeId(*counter)
    }

    fn next_version(&mut self) -> VersionId {
        self.version += 1;
        VersionId(self.version)
    }
}

/// Everything one user owns. Keys are monotonic ids, so map order is
/// creation order.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Partition {
    entities: BTreeMap<EntityId, Entity>,
    relations: BTreeMap<RelationId, Relation>,
    entity_types: BTreeMap<TypeId, TypeRecord>,
    relation_types: BTreeMap<TypeId, TypeRecord>,
    versions: BTreeMap<VersionId, Version>,
}

impl Partition {
    fn type_table(&self, kind: TypeKind) -> &BTreeMap<TypeId, TypeRecord> {
        match kind {
            TypeKind::Entity => &self.entity_types,
            TypeKind::Relation => &self.relation_types,
        }
    }

    fn type_table_mut(&mut self, kind: TypeKind) -> &mut BTreeMap<TypeId, TypeRecord> {
        match kind {
            TypeKind::Entity => &mut self.entity_types,
            TypeKind::Relation => &mut self.relation_types,
        }
    }

    /// Versions newest first
    pub fn versions(&self) -> Vec<&Version> {
        let mut versions: Vec<_> = self.versions.values().collect();
        versions.sort_by(|a, b| b.version_number.cmp(&a.version_number));
        versions
    }

    pub fn version(&self, id: VersionId) -> Option<&Version> {
        self.versions.get(&id)
    }

    /// Highest version number recorded, or 0 when there are none
    pub fn latest_version_number(&self) -> u64 {
        self.versions
            .values()
            .map(|v| v.version_number)
            .max()
            .unwrap_or(0)
    }

    pub fn version_count(&self) -> usize {
        self.versions.len()
    }
}

impl GraphRead for Partition {
    fn entities(&self) -> Vec<&Entity> {
        self.entities.values().collect()
    }

    fn relations(&self) -> Vec<&Relation> {
        self.relations.values().collect()
    }

    fn types(&self, kind: TypeKind) -> Vec<&TypeRecord> {
        self.type_table(kind).values().collect()
    }

    fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    fn relation(&self, id: RelationId) -> Option<&Relation> {
        self.relations.get(&id)
    }
}

/// The whole store image: sequences plus one partition per user
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Tables {
    pub(super) sequences: Sequences,
    pub(super) partitions: BTreeMap<UserId, Partition>,
}

/// A transaction's working copy of one user's partition
///
/// Holds private copies of the sequences and the partition; the store
/// installs them only if the transaction body succeeds.
pub struct UserTx<'a> {
    user: UserId,
    sequences: &'a mut Sequences,
    partition: &'a mut Partition,
}

impl<'a> UserTx<'a> {
    pub(super) fn new(
        user: UserId,
        sequences: &'a mut Sequences,
        partition: &'a mut Partition,
    ) -> Self {
        UserTx {
            user,
            sequences,
            partition,
        }
    }

    /// Read-only view of the partition as modified so far
    pub fn partition(&self) -> &Partition {
        &*self.partition
    }

    /// Persist a new version row with an explicit number
    ///
    /// `(user, version_number)` is unique; a duplicate number is reported as
    /// `VersionConflict` so the caller can recompute and retry.
    pub fn insert_version(
        &mut self,
        version_number: u64,
        description: Option<&str>,
        created_by: &str,
        snapshot: Snapshot,
    ) -> Result<Version> {
        if self
            .partition
            .versions
            .values()
            .any(|v| v.version_number == version_number)
        {
            return Err(Error::VersionConflict {
                user: self.user,
                number: version_number,
            });
        }
        let id = self.sequences.next_version();
        let version = Version::new(
            id,
            self.user,
            version_number,
            description,
            created_by,
            snapshot,
        )?;
        self.partition.versions.insert(id, version.clone());
        Ok(version)
    }

    fn check_endpoints(&self, relation: &NewRelation) -> Result<()> {
        for endpoint in [relation.source_id, relation.target_id] {
            if !self.partition.entities.contains_key(&endpoint) {
                return Err(Error::Validation(format!(
                    "relation endpoint entity {} does not exist",
                    endpoint
                )));
            }
        }
        Ok(())
    }
}

impl GraphRead for UserTx<'_> {
    fn entities(&self) -> Vec<&Entity> {
        self.partition.entities()
    }

    fn relations(&self) -> Vec<&Relation> {
        self.partition.relations()
    }

    fn types(&self, kind: TypeKind) -> Vec<&TypeRecord> {
        self.partition.types(kind)
    }

    fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.partition.entity(id)
    }

    fn relation(&self, id: RelationId) -> Option<&Relation> {
        self.partition.relation(id)
    }
}

impl GraphStore for UserTx<'_> {
    fn owner(&self) -> UserId {
        self.user
    }

    fn insert_entity(&mut self, entity: NewEntity) -> Result<Entity> {
        entity.validate()?;
        let id = self.sequences.next_entity();
        let row = Entity {
            id,
            user_id: self.user,
            name: entity.name,
            entity_type: entity.entity_type,
            description: entity.description,
        };
        self.partition.entities.insert(id, row.clone());
        Ok(row)
    }

    fn update_entity(&mut self, id: EntityId, entity: NewEntity) -> Result<Entity> {
        entity.validate()?;
        let row = self
            .partition
            .entities
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("entity {}", id)))?;
        row.name = entity.name;
        row.entity_type = entity.entity_type;
        row.description = entity.description;
        Ok(row.clone())
    }

    fn delete_entity(&mut self, id: EntityId) -> Result<(Entity, usize)> {
        if !self.partition.entities.contains_key(&id) {
            return Err(Error::NotFound(format!("entity {}", id)));
        }
        // Dependent relations first, then the entity itself
        let before = self.partition.relations.len();
        self.partition
            .relations
            .retain(|_, r| r.source_id != id && r.target_id != id);
        let removed = before - self.partition.relations.len();

        let entity = self
            .partition
            .entities
            .remove(&id)
            .ok_or_else(|| Error::NotFound(format!("entity {}", id)))?;
        Ok((entity, removed))
    }

    fn insert_relation(&mut self, relation: NewRelation) -> Result<Relation> {
        relation.validate()?;
        self.check_endpoints(&relation)?;
        let id = self.sequences.next_relation();
        let row = Relation {
            id,
            user_id: self.user,
            source_id: relation.source_id,
            target_id: relation.target_id,
            relation_type: relation.relation_type,
            description: relation.description,
        };
        self.partition.relations.insert(id, row.clone());
        Ok(row)
    }

    fn update_relation(&mut self, id: RelationId, relation: NewRelation) -> Result<Relation> {
        relation.validate()?;
        if !self.partition.relations.contains_key(&id) {
            return Err(Error::NotFound(format!("relation {}", id)));
        }
        self.check_endpoints(&relation)?;
        let row = self
            .partition
            .relations
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("relation {}", id)))?;
        row.source_id = relation.source_id;
        row.target_id = relation.target_id;
        row.relation_type = relation.relation_type;
        row.description = relation.description;
        Ok(row.clone())
    }

    fn delete_relation(&mut self, id: RelationId) -> Result<Relation> {
        self.partition
            .relations
            .remove(&id)
            .ok_or_else(|| Error::NotFound(format!("relation {}", id)))
    }

    fn insert_type(&mut self, kind: TypeKind, name: &str) -> Result<TypeRecord> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::Validation(format!("{} type name must not be empty", kind)));
        }
        if self.has_type(kind, name) {
            return Err(Error::Conflict(format!(
                "{} type '{}' already exists",
                kind, name
            )));
        }
        let id = self.sequences.next_type(kind);
        let record = TypeRecord {
            id,
            user_id: self.user,
            name: name.to_string(),
        };
        self.partition.type_table_mut(kind).insert(id, record.clone());
        Ok(record)
    }

    fn ensure_type(&mut self, kind: TypeKind, name: &str) -> Result<Option<TypeRecord>> {
        if self.has_type(kind, name.trim()) {
            return Ok(None);
        }
        self.insert_type(kind, name).map(Some)
    }

    fn rename_type(&mut self, kind: TypeKind, from: &str, to: &str) -> Result<usize> {
        let to = to.trim();
        if to.is_empty() {
            return Err(Error::Validation(format!("{} type name must not be empty", kind)));
        }
        if from != to && self.has_type(kind, to) {
            return Err(Error::Conflict(format!("{} type '{}' already exists", kind, to)));
        }
        let record = self
            .partition
            .type_table_mut(kind)
            .values_mut()
            .find(|t| t.name == from)
            .ok_or_else(|| Error::NotFound(format!("{} type '{}'", kind, from)))?;
        record.name = to.to_string();

        let mut rewritten = 0;
        match kind {
            TypeKind::Entity => {
                for entity in self.partition.entities.values_mut() {
                    if entity.entity_type == from {
                        entity.entity_type = to.to_string();
                        rewritten += 1;
                    }
                }
            }
            TypeKind::Relation => {
                for relation in self.partition.relations.values_mut() {
                    if relation.relation_type == from {
                        relation.relation_type = to.to_string();
                        rewritten += 1;
                    }
                }
            }
        }
        Ok(rewritten)
    }

    fn delete_type(&mut self, kind: TypeKind, name: &str) -> Result<TypeRecord> {
        let id = self
            .types(kind)
            .iter()
            .find(|t| t.name == name)
            .map(|t| t.id)
            .ok_or_else(|| Error::NotFound(format!("{} type '{}'", kind, name)))?;
        if self.type_in_use(kind, name) {
            return Err(Error::Conflict("Type is in use".into()));
        }
        self.partition
            .type_table_mut(kind)
            .remove(&id)
            .ok_or_else(|| Error::NotFound(format!("{} type '{}'", kind, name)))
    }

    fn clear_relations(&mut self) -> usize {
        let count = self.partition.relations.len();
        self.partition.relations.clear();
        count
    }

    fn clear_entities(&mut self) -> Result<usize> {
        if !self.partition.relations.is_empty() {
            return Err(Error::Conflict(format!(
                "{} relations still reference entities",
                self.partition.relations.len()
            )));
        }
        let count = self.partition.entities.len();
        self.partition.entities.clear();
        Ok(count)
    }

    fn clear_types(&mut self, kind: TypeKind) -> usize {
        let table = self.partition.type_table_mut(kind);
        let count = table.len();
        table.clear();
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_tx<R>(f: impl FnOnce(&mut UserTx<'_>) -> R) -> (R, Sequences, Partition) {
        let mut sequences = Sequences::default();
        let mut partition = Partition::default();
        let result = {
            let mut tx = UserTx::new(UserId(1), &mut sequences, &mut partition);
            f(&mut tx)
        };
        (result, sequences, partition)
    }

    #[test]
    fn test_entity_crud() {
        let ((), _, partition) = with_tx(|tx| {
            let alice = tx.insert_entity(NewEntity::new("Alice", "person")).unwrap();
            assert_eq!(alice.id, EntityId(1));
            assert_eq!(alice.user_id, UserId(1));

            let updated = tx
                .update_entity(alice.id, NewEntity::new("Alicia", "person"))
                .unwrap();
            assert_eq!(updated.name, "Alicia");

            assert!(tx
                .update_entity(EntityId(99), NewEntity::new("x", "y"))
                .unwrap_err()
                .is_not_found());
        });
        assert_eq!(partition.entities().len(), 1);
    }

    #[test]
    fn test_delete_entity_cascades_relations() {
        let ((), _, partition) = with_tx(|tx| {
            let a = tx.insert_entity(NewEntity::new("Alice", "person")).unwrap();
            let b = tx.insert_entity(NewEntity::new("Bob", "person")).unwrap();
            let c = tx.insert_entity(NewEntity::new("Carol", "person")).unwrap();
            tx.insert_relation(NewRelation::new(a.id, b.id, "friend")).unwrap();
            tx.insert_relation(NewRelation::new(c.id, b.id, "friend")).unwrap();
            tx.insert_relation(NewRelation::new(a.id, c.id, "friend")).unwrap();

            let (removed, cascaded) = tx.delete_entity(b.id).unwrap();
            assert_eq!(removed.name, "Bob");
            assert_eq!(cascaded, 2);
        });
        assert_eq!(partition.entities().len(), 2);
        assert_eq!(partition.relations().len(), 1);
    }

    #[test]
    fn test_relation_requires_existing_endpoints() {
        with_tx(|tx| {
            let a = tx.insert_entity(NewEntity::new("Alice", "person")).unwrap();
            let err = tx
                .insert_relation(NewRelation::new(a.id, EntityId(42), "friend"))
                .unwrap_err();
            assert!(matches!(err, Error::Validation(_)));

            // Self-relations and duplicates are allowed
            tx.insert_relation(NewRelation::new(a.id, a.id, "self")).unwrap();
            tx.insert_relation(NewRelation::new(a.id, a.id, "self")).unwrap();
            assert_eq!(tx.relations().len(), 2);
        });
    }

    #[test]
    fn test_type_names_unique_per_user() {
        with_tx(|tx| {
            tx.insert_type(TypeKind::Entity, "Person").unwrap();
            assert!(tx
                .insert_type(TypeKind::Entity, "Person")
                .unwrap_err()
                .is_conflict());
            // Same name in the other vocabulary is fine
            tx.insert_type(TypeKind::Relation, "Person").unwrap();
            assert!(tx.ensure_type(TypeKind::Entity, "Person").unwrap().is_none());
            assert!(tx.ensure_type(TypeKind::Entity, "Place").unwrap().is_some());
            assert!(matches!(
                tx.insert_type(TypeKind::Entity, "  "),
                Err(Error::Validation(_))
            ));
        });
    }

    #[test]
    fn test_delete_type_in_use_conflicts() {
        with_tx(|tx| {
            tx.insert_type(TypeKind::Entity, "Person").unwrap();
            tx.insert_entity(NewEntity::new("John", "Person")).unwrap();
            let err = tx.delete_type(TypeKind::Entity, "Person").unwrap_err();
            assert_eq!(err.to_string(), "Conflict: Type is in use");
            assert!(tx
                .delete_type(TypeKind::Entity, "Missing")
                .unwrap_err()
                .is_not_found());
        });
    }

    #[test]
    fn test_rename_type_rewrites_rows() {
        with_tx(|tx| {
            let a = tx.insert_entity(NewEntity::new("Alice", "person")).unwrap();
            tx.insert_type(TypeKind::Relation, "friend").unwrap();
            tx.insert_relation(NewRelation::new(a.id, a.id, "friend")).unwrap();

            let n = tx.rename_type(TypeKind::Relation, "friend", "pal").unwrap();
            assert_eq!(n, 1);
            assert_eq!(tx.relations()[0].relation_type, "pal");
            assert!(tx.has_type(TypeKind::Relation, "pal"));
        });
    }

    #[test]
    fn test_clear_entities_refuses_dangling_relations() {
        with_tx(|tx| {
            let a = tx.insert_entity(NewEntity::new("Alice", "person")).unwrap();
            tx.insert_relation(NewRelation::new(a.id, a.id, "self")).unwrap();
            assert!(tx.clear_entities().is_err());
            assert_eq!(tx.clear_relations(), 1);
            assert_eq!(tx.clear_entities().unwrap(), 1);
        });
    }

    #[test]
    fn test_version_numbers_unique() {
        let ((), _, partition) = with_tx(|tx| {
            tx.insert_version(1, None, "system", Snapshot::default()).unwrap();
            let err = tx
                .insert_version(1, None, "system", Snapshot::default())
                .unwrap_err();
            assert!(matches!(err, Error::VersionConflict { number: 1, .. }));
            tx.insert_version(2, None, "system", Snapshot::default()).unwrap();
        });
        assert_eq!(partition.latest_version_number(), 2);
        assert_eq!(partition.versions()[0].version_number, 2);
    }

    #[test]
    fn test_ids_never_reused() {
        let (_, mut sequences, mut partition) = with_tx(|tx| {
            let a = tx.insert_entity(NewEntity::new("Alice", "person")).unwrap();
            tx.delete_entity(a.id).unwrap();
        });
        let mut tx = UserTx::new(UserId(1), &mut sequences, &mut partition);
        let b = tx.insert_entity(NewEntity::new("Bob", "person")).unwrap();
        assert_eq!(b.id, EntityId(2));
    }
}
