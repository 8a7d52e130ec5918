//! # relmap
//!
//! A multi-tenant store for maps of entities and the relations between them,
//! with full version history and point-in-time restore.
//!
//! ## Core Concepts
//!
//! - **Entities**: Named, typed nodes owned by one user
//! - **Relations**: Typed, directed edges between two of that user's entities
//! - **Versions**: Numbered, immutable snapshots of a user's whole graph
//! - **Restore**: Replaces the graph with a version's contents, recreating
//!   entities under fresh ids and remapping relation endpoints onto them
//!
//! Every mutation records a version in the same transaction, so history is
//! complete and a failed operation leaves no trace.
//!
//! ## Example
//!
//! ```ignore
//! use relmap::{Database, NewEntity, UserId};
//!
//! let db = Database::open_or_create("relmap.db")?;
//! let user = UserId(1);
//! db.create_entity(user, NewEntity::new("Alice", "person"))?;
//! let v = db.checkpoint(user, Some("Alice only"))?;
//! db.reset(user)?;
//! db.restore_version(user, v.id, true)?;
//! ```

pub mod model;
pub mod ops;
pub mod store;

mod config;
mod database;
mod error;

pub use config::Config;
pub use database::Database;
pub use error::{Error, Result};
pub use model::{
    Checksum, Entity, EntityId, NewEntity, NewRelation, Relation, RelationId, Snapshot, TypeKind,
    TypeRecord, UserId, Version, VersionId, VersionSummary,
};
pub use ops::{GraphExport, ImportMode, ImportReport, TypeCascade, WipeCounts};
pub use store::Store;

/// On-disk and export format version
pub const FORMAT_VERSION: u32 = 1;

/// Magic bytes for file identification
pub const MAGIC: &[u8; 8] = b"RELMAPDB";
