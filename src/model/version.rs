//! Version type - a numbered snapshot of a user's graph

use super::{now_millis, Checksum, Snapshot, UserId, VersionId};
use serde::{Deserialize, Serialize};

/// Provenance tag for versions recorded by the system itself
pub const CREATED_BY_SYSTEM: &str = "system";
/// Provenance tag for versions recorded on behalf of the user
pub const CREATED_BY_USER: &str = "user";

/// A numbered, timestamped record pairing a snapshot with provenance
///
/// `version_number` is strictly increasing per owner, starting at 1.
/// The snapshot is a full copy, not a diff against the previous version.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    pub id: VersionId,
    pub user_id: UserId,
    pub version_number: u64,
    /// Unix millis
    pub created_at: u64,
    pub description: String,
    pub created_by: String,
    pub snapshot: Snapshot,
    /// BLAKE3 over the bincode encoding of `snapshot`
    pub snapshot_hash: Checksum,
}

/// A version without its snapshot payload, for listings
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionSummary {
    pub id: VersionId,
    pub version_number: u64,
    pub created_at: u64,
    pub description: String,
    pub created_by: String,
    pub entity_count: usize,
    pub relation_count: usize,
}

impl Version {
    /// Build a version record. The description defaults to "Version N".
    pub fn new(
        id: VersionId,
        user_id: UserId,
        version_number: u64,
        description: Option<&str>,
        created_by: impl Into<String>,
        snapshot: Snapshot,
    ) -> crate::Result<Self> {
        let snapshot_hash = Checksum::of_value(&snapshot)?;
        let description = match description {
            Some(d) if !d.trim().is_empty() => d.to_string(),
            _ => format!("Version {}", version_number),
        };
        Ok(Version {
            id,
            user_id,
            version_number,
            created_at: now_millis(),
            description,
            created_by: created_by.into(),
            snapshot,
            snapshot_hash,
        })
    }

    /// Check the snapshot against its recorded checksum
    pub fn verify(&self) -> crate::Result<()> {
        let actual = Checksum::of_value(&self.snapshot)?;
        if actual != self.snapshot_hash {
            return Err(crate::Error::Corruption(format!(
                "snapshot of version {} does not match checksum {} (got {})",
                self.id,
                self.snapshot_hash.short(),
                actual.short()
            )));
        }
        Ok(())
    }

    pub fn summary(&self) -> VersionSummary {
        VersionSummary {
            id: self.id,
            version_number: self.version_number,
            created_at: self.created_at,
            description: self.description.clone(),
            created_by: self.created_by.clone(),
            entity_count: self.snapshot.entities.len(),
            relation_count: self.snapshot.relations.len(),
        }
    }
}
