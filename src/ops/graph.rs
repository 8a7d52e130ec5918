//! Entity and relation mutations, each recorded as a version
//!
//! Every function here performs one change and then calls
//! [`create_version`] inside the same transaction, so a mutation and the
//! version describing it commit or roll back together.

use super::versions::create_version;
use crate::model::{
    Entity, EntityId, NewEntity, NewRelation, Relation, RelationId, TypeKind, CREATED_BY_USER,
};
use crate::store::{GraphStore, UserTx};
use crate::Result;
use tracing::debug;

/// Record the current graph as a user-attributed version
fn record(tx: &mut UserTx<'_>, description: String) -> Result<()> {
    create_version(tx, Some(&description), CREATED_BY_USER)?;
    Ok(())
}

pub fn create_entity(tx: &mut UserTx<'_>, entity: NewEntity) -> Result<Entity> {
    let entity = tx.insert_entity(entity)?;
    record(tx, format!("Added entity: {}", entity.name))?;
    Ok(entity)
}

pub fn update_entity(tx: &mut UserTx<'_>, id: EntityId, entity: NewEntity) -> Result<Entity> {
    let entity = tx.update_entity(id, entity)?;
    record(tx, format!("Updated entity: {}", entity.name))?;
    Ok(entity)
}

/// Delete an entity together with every relation touching it
pub fn delete_entity(tx: &mut UserTx<'_>, id: EntityId) -> Result<Entity> {
    let (entity, cascaded) = tx.delete_entity(id)?;
    debug!(entity = %id, relations = cascaded, "deleted entity");
    record(tx, format!("Deleted entity: {}", entity.name))?;
    Ok(entity)
}

/// Create a relation, adding its type to the vocabulary if it is new
pub fn create_relation(tx: &mut UserTx<'_>, relation: NewRelation) -> Result<Relation> {
    let relation = tx.insert_relation(relation)?;
    tx.ensure_type(TypeKind::Relation, &relation.relation_type)?;
    record(tx, format!("Added relation: {}", relation.relation_type))?;
    Ok(relation)
}

pub fn update_relation(
    tx: &mut UserTx<'_>,
    id: RelationId,
    relation: NewRelation,
) -> Result<Relation> {
    let relation = tx.update_relation(id, relation)?;
    tx.ensure_type(TypeKind::Relation, &relation.relation_type)?;
    record(tx, format!("Updated relation: {}", relation.relation_type))?;
    Ok(relation)
}

pub fn delete_relation(tx: &mut UserTx<'_>, id: RelationId) -> Result<Relation> {
    let relation = tx.delete_relation(id)?;
    record(tx, format!("Deleted relation: {}", relation.relation_type))?;
    Ok(relation)
}
