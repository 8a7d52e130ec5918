//! Core data model types for relmap

mod checksum;
mod entity;
mod ids;
mod snapshot;
mod version;

pub use checksum::Checksum;
pub use entity::{Entity, NewEntity, NewRelation, Relation, TypeKind, TypeRecord};
pub use ids::{EntityId, RelationId, TypeId, UserId, VersionId};
pub use snapshot::{
    GraphShape, Snapshot, SnapshotEntity, SnapshotEntityType, SnapshotRelation,
    SnapshotRelationType,
};
pub use version::{Version, VersionSummary, CREATED_BY_SYSTEM, CREATED_BY_USER};

use std::time::{SystemTime, UNIX_EPOCH};

/// Current time as unix millis
pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
