//! Snapshot capture, wipe and re-application

use crate::model::{
    EntityId, NewEntity, NewRelation, Snapshot, SnapshotEntity, SnapshotEntityType,
    SnapshotRelation, SnapshotRelationType, TypeKind,
};
use crate::store::{GraphRead, GraphStore};
use crate::{Error, Result};
use std::collections::{BTreeSet, HashMap};

/// Capture one user's graph as plain data
///
/// The entity-type vocabulary is the union of explicit type records and the
/// type labels present on entities, sorted by name. Relation types are taken
/// verbatim from their records. Performs only reads.
pub fn build_snapshot<G: GraphRead + ?Sized>(graph: &G) -> Snapshot {
    let entities = graph.entities();

    let entity_types: BTreeSet<&str> = graph
        .types(TypeKind::Entity)
        .into_iter()
        .map(|t| t.name.as_str())
        .chain(entities.iter().map(|e| e.entity_type.as_str()))
        .collect();

    Snapshot {
        entities: entities
            .iter()
            .map(|e| SnapshotEntity {
                id: e.id,
                name: e.name.clone(),
                entity_type: e.entity_type.clone(),
                description: e.description.clone(),
            })
            .collect(),
        relations: graph
            .relations()
            .into_iter()
            .map(|r| SnapshotRelation {
                id: r.id,
                source_id: r.source_id,
                target_id: r.target_id,
                relation_type: r.relation_type.clone(),
                description: r.description.clone(),
            })
            .collect(),
        entity_types: entity_types
            .into_iter()
            .map(|name| SnapshotEntityType {
                name: name.to_string(),
            })
            .collect(),
        relation_types: graph
            .types(TypeKind::Relation)
            .into_iter()
            .map(|t| SnapshotRelationType {
                id: t.id,
                name: t.name.clone(),
            })
            .collect(),
    }
}

/// Row counts removed by [`wipe_graph`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WipeCounts {
    pub relations: usize,
    pub entities: usize,
    pub entity_types: usize,
    pub relation_types: usize,
}

/// Delete all of a user's relations, entities, entity types and relation
/// types, in that order. Versions are left alone.
pub fn wipe_graph<G: GraphStore + ?Sized>(graph: &mut G) -> Result<WipeCounts> {
    let relations = graph.clear_relations();
    let entities = graph.clear_entities()?;
    let entity_types = graph.clear_types(TypeKind::Entity);
    let relation_types = graph.clear_types(TypeKind::Relation);
    Ok(WipeCounts {
        relations,
        entities,
        entity_types,
        relation_types,
    })
}

/// Old (snapshot) entity id to newly assigned entity id
pub type IdMap = HashMap<EntityId, EntityId>;

/// Recreate a snapshot's contents in the user's graph
///
/// Types go in first, then entities, then relations. Entities receive fresh
/// store-assigned ids and every relation endpoint is rewritten through the
/// old-to-new map, so relations point at the recreated entities no matter
/// what the allocator handed out in between. Existing type records are
/// reused, which lets the same routine merge into a non-empty graph.
pub fn apply_snapshot<G: GraphStore + ?Sized>(graph: &mut G, snapshot: &Snapshot) -> Result<IdMap> {
    for t in &snapshot.entity_types {
        graph.ensure_type(TypeKind::Entity, &t.name)?;
    }
    for t in &snapshot.relation_types {
        graph.ensure_type(TypeKind::Relation, &t.name)?;
    }

    let mut ids = IdMap::with_capacity(snapshot.entities.len());
    for e in &snapshot.entities {
        let created = graph.insert_entity(NewEntity {
            name: e.name.clone(),
            entity_type: e.entity_type.clone(),
            description: e.description.clone(),
        })?;
        ids.insert(e.id, created.id);
    }

    for r in &snapshot.relations {
        let endpoint = |old: EntityId| {
            ids.get(&old).copied().ok_or_else(|| {
                Error::Corruption(format!(
                    "relation {} references entity {} which is not in the snapshot",
                    r.id, old
                ))
            })
        };
        let relation = NewRelation {
            source_id: endpoint(r.source_id)?,
            target_id: endpoint(r.target_id)?,
            relation_type: r.relation_type.clone(),
            description: r.description.clone(),
        };
        graph.insert_relation(relation)?;
    }

    Ok(ids)
}
