//! High-level Database API
//!
//! This module provides the main entry point for interacting with relmap.
//! Every call names the user it acts for; one user's calls never see or
//! touch another user's rows. Each mutating call runs as a single store
//! transaction, so the change and the version it records commit together.

use crate::model::{
    Entity, EntityId, NewEntity, NewRelation, Relation, RelationId, Snapshot, TypeKind,
    TypeRecord, UserId, Version, VersionId, VersionSummary, CREATED_BY_USER,
};
use crate::ops::{self, GraphExport, ImportMode, ImportReport, TypeCascade, WipeCounts};
use crate::store::{GraphRead, Store};
use crate::{Error, Result};
use std::path::Path;

/// The main database interface
///
/// Provides a convenient API for:
/// - Entity and relation CRUD, each change recorded as a version
/// - Entity and relation type vocabularies
/// - Version history and point-in-time restore
/// - JSON export and import
///
/// `Database` is `Send + Sync`; share it behind an `Arc` to serve several
/// users from several threads.
pub struct Database {
    store: Store,
}

impl Database {
    /// Create a new database at the given path
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Database {
            store: Store::create(path)?,
        })
    }

    /// Open an existing database
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Database {
            store: Store::open(path)?,
        })
    }

    /// Open or create a database
    pub fn open_or_create(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Database {
            store: Store::open_or_create(path)?,
        })
    }

    /// A database that is never written to disk
    pub fn in_memory() -> Self {
        Database {
            store: Store::in_memory(),
        }
    }

    // === Entity Operations ===

    pub fn create_entity(&self, user: UserId, entity: NewEntity) -> Result<Entity> {
        self.store
            .transaction(user, |tx| ops::create_entity(tx, entity))
    }

    /// Get an entity by id
    pub fn get_entity(&self, user: UserId, id: EntityId) -> Result<Entity> {
        self.store.read(user, |p| {
            p.entity(id)
                .cloned()
                .ok_or_else(|| Error::NotFound(format!("Entity {} not found", id)))
        })
    }

    /// List entities in creation order, skipping `skip` and returning at
    /// most `limit`
    pub fn list_entities(&self, user: UserId, skip: usize, limit: Option<usize>) -> Vec<Entity> {
        self.store.read(user, |p| page(p.entities(), skip, limit))
    }

    pub fn update_entity(&self, user: UserId, id: EntityId, entity: NewEntity) -> Result<Entity> {
        self.store
            .transaction(user, |tx| ops::update_entity(tx, id, entity))
    }

    /// Delete an entity and every relation attached to it
    pub fn delete_entity(&self, user: UserId, id: EntityId) -> Result<Entity> {
        self.store.transaction(user, |tx| ops::delete_entity(tx, id))
    }

    // === Relation Operations ===

    pub fn create_relation(&self, user: UserId, relation: NewRelation) -> Result<Relation> {
        self.store
            .transaction(user, |tx| ops::create_relation(tx, relation))
    }

    pub fn get_relation(&self, user: UserId, id: RelationId) -> Result<Relation> {
        self.store.read(user, |p| {
            p.relation(id)
                .cloned()
                .ok_or_else(|| Error::NotFound(format!("Relation {} not found", id)))
        })
    }

    pub fn list_relations(
        &self,
        user: UserId,
        skip: usize,
        limit: Option<usize>,
    ) -> Vec<Relation> {
        self.store.read(user, |p| page(p.relations(), skip, limit))
    }

    pub fn update_relation(
        &self,
        user: UserId,
        id: RelationId,
        relation: NewRelation,
    ) -> Result<Relation> {
        self.store
            .transaction(user, |tx| ops::update_relation(tx, id, relation))
    }

    pub fn delete_relation(&self, user: UserId, id: RelationId) -> Result<Relation> {
        self.store
            .transaction(user, |tx| ops::delete_relation(tx, id))
    }

    // === Type Operations ===

    /// Type names sorted alphabetically
    ///
    /// A user with no explicit type rows of this kind gets rows for every
    /// label currently in use, once.
    pub fn list_types(&self, user: UserId, kind: TypeKind) -> Result<Vec<String>> {
        let needs_backfill = self.store.read(user, |p| {
            p.types(kind).is_empty()
                && match kind {
                    TypeKind::Entity => !p.entities().is_empty(),
                    TypeKind::Relation => !p.relations().is_empty(),
                }
        });
        if needs_backfill {
            self.store
                .transaction(user, |tx| ops::ensure_types_populated(tx, kind))?;
        }
        Ok(self.store.read(user, |p| ops::type_names(p, kind)))
    }

    pub fn create_type(&self, user: UserId, kind: TypeKind, name: &str) -> Result<TypeRecord> {
        self.store
            .transaction(user, |tx| ops::create_type(tx, kind, name))
    }

    /// Rename a type and rewrite every row that carries it
    pub fn rename_type(&self, user: UserId, kind: TypeKind, from: &str, to: &str) -> Result<usize> {
        self.store
            .transaction(user, |tx| ops::rename_type(tx, kind, from, to))
    }

    /// Delete a type row. Fails with `Conflict` while anything still uses it.
    pub fn delete_type(&self, user: UserId, kind: TypeKind, name: &str) -> Result<TypeRecord> {
        self.store
            .transaction(user, |tx| ops::delete_type(tx, kind, name))
    }

    /// Delete a type and every entity or relation that carries it
    pub fn delete_type_cascade(
        &self,
        user: UserId,
        kind: TypeKind,
        name: &str,
    ) -> Result<TypeCascade> {
        self.store
            .transaction(user, |tx| ops::delete_type_cascade(tx, kind, name))
    }

    // === Version Operations ===

    /// Record the user's current graph as the next version
    pub fn create_version(
        &self,
        user: UserId,
        description: Option<&str>,
        created_by: &str,
    ) -> Result<Version> {
        self.store
            .transaction(user, |tx| ops::create_version(tx, description, created_by))
    }

    /// A user-requested version of the current graph
    pub fn checkpoint(&self, user: UserId, description: Option<&str>) -> Result<Version> {
        self.create_version(user, description, CREATED_BY_USER)
    }

    /// The user's versions, newest first
    pub fn list_versions(&self, user: UserId) -> Vec<VersionSummary> {
        self.store.read(user, ops::list_versions)
    }

    pub fn get_version(&self, user: UserId, id: VersionId) -> Result<Option<Version>> {
        self.store.read(user, |p| ops::get_version(p, id))
    }

    /// Replace the user's graph with a prior version's contents
    ///
    /// All or nothing: on any error the graph and the version list are as
    /// they were before the call.
    pub fn restore_version(
        &self,
        user: UserId,
        id: VersionId,
        create_backup: bool,
    ) -> Result<Version> {
        self.store
            .transaction(user, |tx| ops::restore_version(tx, id, create_backup))
    }

    // === Data Operations ===

    /// The user's current graph as plain data
    pub fn snapshot(&self, user: UserId) -> Snapshot {
        self.store.read(user, |p| ops::build_snapshot(p))
    }

    pub fn export(&self, user: UserId) -> GraphExport {
        self.store.read(user, |p| ops::export_graph(p))
    }

    pub fn import(&self, user: UserId, data: &GraphExport, mode: ImportMode) -> Result<ImportReport> {
        self.store
            .transaction(user, |tx| ops::import_graph(tx, data, mode))
    }

    /// Remove the user's entities, relations and types. History is kept.
    pub fn reset(&self, user: UserId) -> Result<WipeCounts> {
        self.store.transaction(user, ops::reset_graph)
    }

    /// Users that own at least one row
    pub fn users(&self) -> Vec<UserId> {
        self.store.users()
    }

    /// Flush to disk
    pub fn sync(&self) -> Result<()> {
        self.store.sync()
    }

    pub fn path(&self) -> Option<&Path> {
        self.store.path()
    }
}

fn page<T: Clone>(rows: Vec<&T>, skip: usize, limit: Option<usize>) -> Vec<T> {
    rows.into_iter()
        .skip(skip)
        .take(limit.unwrap_or(usize::MAX))
        .cloned()
        .collect()
}
