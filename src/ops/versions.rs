//! Version creation, lookup and point-in-time restore

use super::snapshot::{apply_snapshot, build_snapshot, wipe_graph};
use crate::model::{Version, VersionId, VersionSummary, CREATED_BY_SYSTEM};
use crate::store::{GraphStore, Partition, UserTx};
use crate::{Error, Result};
use tracing::{info, instrument, warn};

/// Description of the version recorded before a destructive restore
pub const BACKUP_DESCRIPTION: &str = "Backup before restore";

/// Record the user's current graph as a new version
///
/// The number is max(existing) + 1, or 1 for a user's first version. The
/// caller's transaction holds the store's write lock, so the read of the
/// current maximum and the insert cannot interleave with another writer; a
/// `VersionConflict` from the insert is still retried once with a freshly
/// computed number.
#[instrument(skip_all, fields(user = %tx.owner(), created_by = %created_by))]
pub fn create_version(
    tx: &mut UserTx<'_>,
    description: Option<&str>,
    created_by: &str,
) -> Result<Version> {
    let snapshot = build_snapshot(&*tx);
    let number = tx.partition().latest_version_number() + 1;

    let version = match tx.insert_version(number, description, created_by, snapshot.clone()) {
        Err(Error::VersionConflict { number, .. }) => {
            warn!(number, "version number already taken, retrying");
            let number = tx.partition().latest_version_number() + 1;
            tx.insert_version(number, description, created_by, snapshot)?
        }
        other => other?,
    };

    info!(
        version = version.version_number,
        entities = version.snapshot.entities.len(),
        relations = version.snapshot.relations.len(),
        "created version"
    );
    Ok(version)
}

/// Replace the user's graph with the contents of a prior version
///
/// Runs inside the caller's transaction, so a missing version or any storage
/// error leaves the graph and the version list untouched. With
/// `create_backup` the current state is recorded first as
/// "Backup before restore". Entities are recreated with new ids and relation
/// endpoints are remapped onto them. The returned version is the
/// "Restored from version N" marker, which becomes the current version.
#[instrument(skip_all, fields(user = %tx.owner(), version = %version_id, create_backup = create_backup))]
pub fn restore_version(
    tx: &mut UserTx<'_>,
    version_id: VersionId,
    create_backup: bool,
) -> Result<Version> {
    let target = tx
        .partition()
        .version(version_id)
        .cloned()
        .ok_or_else(|| Error::NotFound(format!("Version {} not found", version_id)))?;
    target.verify()?;

    if create_backup {
        create_version(tx, Some(BACKUP_DESCRIPTION), CREATED_BY_SYSTEM)?;
    }

    let wiped = wipe_graph(tx)?;
    let ids = apply_snapshot(tx, &target.snapshot)?;
    info!(
        from = target.version_number,
        removed_entities = wiped.entities,
        removed_relations = wiped.relations,
        restored_entities = ids.len(),
        "restored graph"
    );

    let description = format!("Restored from version {}", target.version_number);
    create_version(tx, Some(&description), CREATED_BY_SYSTEM)
}

/// All of a user's versions, newest first, without snapshot payloads
pub fn list_versions(partition: &Partition) -> Vec<VersionSummary> {
    partition.versions().into_iter().map(Version::summary).collect()
}

/// Look up one version owned by the user
///
/// A version owned by someone else is indistinguishable from a missing one.
/// The snapshot checksum is verified before the version is handed out.
pub fn get_version(partition: &Partition, version_id: VersionId) -> Result<Option<Version>> {
    match partition.version(version_id) {
        Some(version) => {
            version.verify()?;
            Ok(Some(version.clone()))
        }
        None => Ok(None),
    }
}
