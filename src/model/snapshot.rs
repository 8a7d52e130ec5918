//! Snapshot type - a self-contained copy of one user's graph

use super::{EntityId, RelationId, TypeId};
use serde::{Deserialize, Serialize};

/// An entity as captured in a snapshot (ids are the ids at capture time)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEntity {
    pub id: EntityId,
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// A relation as captured in a snapshot
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotRelation {
    pub id: RelationId,
    pub source_id: EntityId,
    pub target_id: EntityId,
    pub relation_type: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SnapshotEntityType {
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotRelationType {
    pub id: TypeId,
    pub name: String,
}

/// An immutable, plain-data copy of a user's entities, relations and
/// type vocabularies. Holds no references to store rows.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub entities: Vec<SnapshotEntity>,
    #[serde(default)]
    pub relations: Vec<SnapshotRelation>,
    #[serde(default)]
    pub entity_types: Vec<SnapshotEntityType>,
    #[serde(default)]
    pub relation_types: Vec<SnapshotRelationType>,
}

/// Id-free view of a snapshot, used to compare graphs across id reassignment
///
/// Relations are described by their endpoint entities' (name, type) pairs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GraphShape {
    pub entities: Vec<(String, String, Option<String>)>,
    pub relations: Vec<(String, String, String, Option<String>)>,
    pub entity_types: Vec<String>,
    pub relation_types: Vec<String>,
}

impl Snapshot {
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
            && self.relations.is_empty()
            && self.entity_types.is_empty()
            && self.relation_types.is_empty()
    }

    pub fn entity(&self, id: EntityId) -> Option<&SnapshotEntity> {
        self.entities.iter().find(|e| e.id == id)
    }

    /// Sorted, id-free structure of this snapshot
    pub fn shape(&self) -> GraphShape {
        let endpoint = |id: EntityId| {
            self.entity(id)
                .map(|e| format!("{}:{}", e.entity_type, e.name))
                .unwrap_or_else(|| format!("#{}", id))
        };

        let mut entities: Vec<_> = self
            .entities
            .iter()
            .map(|e| (e.name.clone(), e.entity_type.clone(), e.description.clone()))
            .collect();
        entities.sort();

        let mut relations: Vec<_> = self
            .relations
            .iter()
            .map(|r| {
                (
                    endpoint(r.source_id),
                    endpoint(r.target_id),
                    r.relation_type.clone(),
                    r.description.clone(),
                )
            })
            .collect();
        relations.sort();

        let mut entity_types: Vec<_> = self.entity_types.iter().map(|t| t.name.clone()).collect();
        entity_types.sort();
        let mut relation_types: Vec<_> =
            self.relation_types.iter().map(|t| t.name.clone()).collect();
        relation_types.sort();

        GraphShape {
            entities,
            relations,
            entity_types,
            relation_types,
        }
    }
}
