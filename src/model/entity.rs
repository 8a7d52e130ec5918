//! Entity (node) and Relation (edge) rows

use super::{EntityId, RelationId, UserId};
use serde::{Deserialize, Serialize};

/// A named, typed node in one user's relation graph
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub user_id: UserId,
    pub name: String,
    /// Type label, e.g. "person" or "organization"
    pub entity_type: String,
    pub description: Option<String>,
}

/// Payload for creating or replacing an entity
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEntity {
    pub name: String,
    pub entity_type: String,
    pub description: Option<String>,
}

impl NewEntity {
    pub fn new(name: impl Into<String>, entity_type: impl Into<String>) -> Self {
        NewEntity {
            name: name.into(),
            entity_type: entity_type.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub(crate) fn validate(&self) -> crate::Result<()> {
        if self.name.trim().is_empty() {
            return Err(crate::Error::Validation("entity name must not be empty".into()));
        }
        if self.entity_type.trim().is_empty() {
            return Err(crate::Error::Validation("entity type must not be empty".into()));
        }
        Ok(())
    }
}

/// A typed, directed edge between two entities of the same owner
///
/// Self-relations and duplicate (source, target, type) tuples are allowed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    pub id: RelationId,
    pub user_id: UserId,
    pub source_id: EntityId,
    pub target_id: EntityId,
    pub relation_type: String,
    pub description: Option<String>,
}

/// Payload for creating or replacing a relation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRelation {
    pub source_id: EntityId,
    pub target_id: EntityId,
    pub relation_type: String,
    pub description: Option<String>,
}

impl NewRelation {
    pub fn new(source: EntityId, target: EntityId, relation_type: impl Into<String>) -> Self {
        NewRelation {
            source_id: source,
            target_id: target,
            relation_type: relation_type.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub(crate) fn validate(&self) -> crate::Result<()> {
        if self.relation_type.trim().is_empty() {
            return Err(crate::Error::Validation("relation type must not be empty".into()));
        }
        Ok(())
    }
}

/// A named label in a user's type vocabulary
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeRecord {
    pub id: super::TypeId,
    pub user_id: UserId,
    pub name: String,
}

/// Which vocabulary a type operation targets
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeKind {
    Entity,
    Relation,
}

impl std::fmt::Display for TypeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TypeKind::Entity => write!(f, "entity"),
            TypeKind::Relation => write!(f, "relation"),
        }
    }
}
