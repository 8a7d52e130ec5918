//! Entity and relation type vocabularies

use super::versions::create_version;
use crate::model::{EntityId, RelationId, TypeKind, TypeRecord, CREATED_BY_USER};
use crate::store::{GraphRead, GraphStore, UserTx};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Rows removed along with a type by [`delete_type_cascade`]
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeCascade {
    pub entities: usize,
    pub relations: usize,
}

/// Backfill type rows from the labels in use
///
/// Only runs when the user has no explicit rows of this kind, so a user who
/// curated their vocabulary is left alone. Returns the number of rows added.
pub fn ensure_types_populated(tx: &mut UserTx<'_>, kind: TypeKind) -> Result<usize> {
    if !tx.types(kind).is_empty() {
        return Ok(0);
    }

    let in_use: BTreeSet<String> = match kind {
        TypeKind::Entity => tx.entities().iter().map(|e| e.entity_type.clone()).collect(),
        TypeKind::Relation => tx
            .relations()
            .iter()
            .map(|r| r.relation_type.clone())
            .collect(),
    };

    let mut added = 0;
    for name in &in_use {
        if tx.ensure_type(kind, name)?.is_some() {
            added += 1;
        }
    }
    if added > 0 {
        debug!(kind = %kind, added, "populated type vocabulary");
    }
    Ok(added)
}

/// Type names sorted alphabetically
pub fn type_names<G: GraphRead + ?Sized>(graph: &G, kind: TypeKind) -> Vec<String> {
    let mut names: Vec<String> = graph.types(kind).iter().map(|t| t.name.clone()).collect();
    names.sort();
    names
}

pub fn create_type(tx: &mut UserTx<'_>, kind: TypeKind, name: &str) -> Result<TypeRecord> {
    let record = tx.insert_type(kind, name)?;
    let description = format!("Added {} type: {}", kind, record.name);
    create_version(tx, Some(&description), CREATED_BY_USER)?;
    Ok(record)
}

/// Rename a type and every row carrying it. Returns the rows rewritten.
pub fn rename_type(tx: &mut UserTx<'_>, kind: TypeKind, from: &str, to: &str) -> Result<usize> {
    let rewritten = tx.rename_type(kind, from, to)?;
    let description = format!("Renamed {} type: {} -> {}", kind, from, to.trim());
    create_version(tx, Some(&description), CREATED_BY_USER)?;
    Ok(rewritten)
}

pub fn delete_type(tx: &mut UserTx<'_>, kind: TypeKind, name: &str) -> Result<TypeRecord> {
    let record = tx.delete_type(kind, name)?;
    let description = format!("Deleted {} type: {}", kind, record.name);
    create_version(tx, Some(&description), CREATED_BY_USER)?;
    Ok(record)
}

/// Delete a type together with every row carrying it
///
/// Deleting an entity type removes its entities and any relation touching
/// them. Deleting a relation type removes its relations. A label that is in
/// use but has no type row can still be deleted this way.
pub fn delete_type_cascade(
    tx: &mut UserTx<'_>,
    kind: TypeKind,
    name: &str,
) -> Result<TypeCascade> {
    let has_row = tx.has_type(kind, name);
    if !has_row && !tx.type_in_use(kind, name) {
        return Err(Error::NotFound(format!("{} type '{}'", kind, name)));
    }

    let mut removed = TypeCascade::default();
    match kind {
        TypeKind::Entity => {
            let ids: Vec<EntityId> = tx
                .entities()
                .iter()
                .filter(|e| e.entity_type == name)
                .map(|e| e.id)
                .collect();
            for id in ids {
                let (_, relations) = tx.delete_entity(id)?;
                removed.entities += 1;
                removed.relations += relations;
            }
        }
        TypeKind::Relation => {
            let ids: Vec<RelationId> = tx
                .relations()
                .iter()
                .filter(|r| r.relation_type == name)
                .map(|r| r.id)
                .collect();
            for id in ids {
                tx.delete_relation(id)?;
                removed.relations += 1;
            }
        }
    }
    if has_row {
        tx.delete_type(kind, name)?;
    }

    let description = format!(
        "Deleted {} type: {} ({} entities, {} relations)",
        kind, name, removed.entities, removed.relations
    );
    create_version(tx, Some(&description), CREATED_BY_USER)?;
    info!(
        kind = %kind,
        entities = removed.entities,
        relations = removed.relations,
        "deleted type with its rows"
    );
    Ok(removed)
}
