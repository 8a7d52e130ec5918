//! Graph operations: snapshots, versions, mutations, types and transfer

mod graph;
mod snapshot;
mod transfer;
mod types;
mod versions;

pub use graph::{
    create_entity, create_relation, delete_entity, delete_relation, update_entity,
    update_relation,
};
pub use snapshot::{apply_snapshot, build_snapshot, wipe_graph, IdMap, WipeCounts};
pub use transfer::{export_graph, import_graph, reset_graph, GraphExport, ImportMode, ImportReport};
pub use types::{
    create_type, delete_type, delete_type_cascade, ensure_types_populated, rename_type, type_names,
    TypeCascade,
};
pub use versions::{
    create_version, get_version, list_versions, restore_version, BACKUP_DESCRIPTION,
};
