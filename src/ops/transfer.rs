//! JSON export, import and reset of a user's graph

use super::snapshot::{apply_snapshot, build_snapshot, wipe_graph, WipeCounts};
use super::versions::create_version;
use crate::model::{
    now_millis, EntityId, RelationId, Snapshot, SnapshotEntity, SnapshotEntityType,
    SnapshotRelation, SnapshotRelationType, TypeId, VersionSummary, CREATED_BY_USER,
};
use crate::store::{GraphRead, UserTx};
use crate::{Error, Result, FORMAT_VERSION};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use tracing::info;

/// A portable dump of one user's graph
///
/// Reading also accepts the older dump layout: a `"version": "1.0"` tag
/// instead of `format_version`, entities and relations without ids, and
/// type vocabularies given as bare names.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ExportDocument")]
pub struct GraphExport {
    pub format_version: u32,
    /// Milliseconds since the Unix epoch
    pub exported_at: u64,
    #[serde(flatten)]
    pub snapshot: Snapshot,
}

impl GraphExport {
    pub fn new(snapshot: Snapshot) -> Self {
        GraphExport {
            format_version: FORMAT_VERSION,
            exported_at: now_millis(),
            snapshot,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Every relation must point at entities contained in the export
    pub fn validate(&self) -> Result<()> {
        if self.format_version > FORMAT_VERSION {
            return Err(Error::VersionMismatch {
                expected: FORMAT_VERSION,
                found: self.format_version,
            });
        }
        let mut ids = HashSet::with_capacity(self.snapshot.entities.len());
        for e in &self.snapshot.entities {
            if !ids.insert(e.id) {
                return Err(Error::Validation(format!(
                    "entity id {} appears more than once in the import",
                    e.id
                )));
            }
        }
        for r in &self.snapshot.relations {
            for endpoint in [r.source_id, r.target_id] {
                if !ids.contains(&endpoint) {
                    return Err(Error::Validation(format!(
                        "relation {} references entity {} which is not in the import",
                        r.id, endpoint
                    )));
                }
            }
        }
        Ok(())
    }
}

/// An export as found on disk, before ids are filled in
#[derive(Deserialize)]
struct ExportDocument {
    format_version: Option<u32>,
    version: Option<FormatTag>,
    #[serde(default)]
    exported_at: u64,
    #[serde(default)]
    entities: Vec<ImportedEntity>,
    #[serde(default)]
    relations: Vec<ImportedRelation>,
    #[serde(default)]
    entity_types: Vec<TypeEntry>,
    #[serde(default)]
    relation_types: Vec<TypeEntry>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FormatTag {
    Number(u32),
    Text(String),
}

impl FormatTag {
    /// Major version; "1.0" reads as 1
    fn major(&self) -> std::result::Result<u32, String> {
        match self {
            FormatTag::Number(n) => Ok(*n),
            FormatTag::Text(text) => text
                .split('.')
                .next()
                .and_then(|major| major.trim().parse().ok())
                .ok_or_else(|| format!("unrecognised export version '{}'", text)),
        }
    }
}

#[derive(Deserialize)]
struct ImportedEntity {
    id: Option<EntityId>,
    name: String,
    #[serde(rename = "type", alias = "entity_type")]
    entity_type: String,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Deserialize)]
struct ImportedRelation {
    id: Option<RelationId>,
    source_id: EntityId,
    target_id: EntityId,
    relation_type: String,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TypeEntry {
    Name(String),
    Record { id: Option<TypeId>, name: String },
}

impl TryFrom<ExportDocument> for GraphExport {
    type Error = String;

    /// Rows without an id get one above every id in the document, so they
    /// can never collide with a relation endpoint.
    fn try_from(doc: ExportDocument) -> std::result::Result<Self, String> {
        let format_version = match (doc.format_version, &doc.version) {
            (Some(v), _) => v,
            (None, Some(tag)) => tag.major()?,
            (None, None) => FORMAT_VERSION,
        };

        let mut next_entity = doc
            .entities
            .iter()
            .filter_map(|e| e.id)
            .max()
            .map_or(1, |id| id.get() + 1);
        let entities = doc
            .entities
            .into_iter()
            .map(|e| {
                let id = e.id.unwrap_or_else(|| {
                    next_entity += 1;
                    EntityId(next_entity - 1)
                });
                SnapshotEntity {
                    id,
                    name: e.name,
                    entity_type: e.entity_type,
                    description: e.description,
                }
            })
            .collect();

        let mut next_relation = doc
            .relations
            .iter()
            .filter_map(|r| r.id)
            .max()
            .map_or(1, |id| id.get() + 1);
        let relations = doc
            .relations
            .into_iter()
            .map(|r| {
                let id = r.id.unwrap_or_else(|| {
                    next_relation += 1;
                    RelationId(next_relation - 1)
                });
                SnapshotRelation {
                    id,
                    source_id: r.source_id,
                    target_id: r.target_id,
                    relation_type: r.relation_type,
                    description: r.description,
                }
            })
            .collect();

        let entity_types = doc
            .entity_types
            .into_iter()
            .map(|t| SnapshotEntityType { name: t.into_parts().1 })
            .collect();
        let relation_types = doc
            .relation_types
            .into_iter()
            .enumerate()
            .map(|(i, t)| {
                let (id, name) = t.into_parts();
                SnapshotRelationType {
                    id: id.unwrap_or(TypeId(i as u64 + 1)),
                    name,
                }
            })
            .collect();

        Ok(GraphExport {
            format_version,
            exported_at: doc.exported_at,
            snapshot: Snapshot {
                entities,
                relations,
                entity_types,
                relation_types,
            },
        })
    }
}

impl TypeEntry {
    fn into_parts(self) -> (Option<TypeId>, String) {
        match self {
            TypeEntry::Name(name) => (None, name),
            TypeEntry::Record { id, name } => (id, name),
        }
    }
}

/// How imported data combines with the existing graph
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportMode {
    /// Add the imported rows next to what is there
    #[default]
    Merge,
    /// Wipe the graph first
    Replace,
}

impl fmt::Display for ImportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportMode::Merge => write!(f, "merge"),
            ImportMode::Replace => write!(f, "replace"),
        }
    }
}

/// Outcome of an import
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ImportReport {
    pub mode: ImportMode,
    pub entities: usize,
    pub relations: usize,
    pub version: VersionSummary,
}

pub fn export_graph<G: GraphRead + ?Sized>(graph: &G) -> GraphExport {
    GraphExport::new(build_snapshot(graph))
}

/// Load an export into the user's graph
///
/// The export is validated before anything is touched. Entities get fresh
/// ids and relations are remapped onto them, the same way a restore does.
pub fn import_graph(
    tx: &mut UserTx<'_>,
    data: &GraphExport,
    mode: ImportMode,
) -> Result<ImportReport> {
    data.validate()?;

    if mode == ImportMode::Replace {
        wipe_graph(tx)?;
    }
    let ids = apply_snapshot(tx, &data.snapshot)?;

    let description = format!("Imported data ({})", mode);
    let version = create_version(tx, Some(&description), CREATED_BY_USER)?;
    info!(
        mode = %mode,
        entities = ids.len(),
        relations = data.snapshot.relations.len(),
        "imported graph"
    );

    Ok(ImportReport {
        mode,
        entities: ids.len(),
        relations: data.snapshot.relations.len(),
        version: version.summary(),
    })
}

/// Remove every entity, relation and type row. Versions are kept.
pub fn reset_graph(tx: &mut UserTx<'_>) -> Result<WipeCounts> {
    let counts = wipe_graph(tx)?;
    create_version(tx, Some("Reset all data"), CREATED_BY_USER)?;
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NewEntity, NewRelation, TypeKind, UserId};
    use crate::store::Store;
    use crate::store::GraphStore;

    const U: UserId = UserId(1);

    fn seeded() -> Store {
        let store = Store::in_memory();
        store
            .transaction(U, |tx| {
                let a = tx.insert_entity(NewEntity::new("Alice", "person"))?;
                let b = tx.insert_entity(NewEntity::new("Bob", "person"))?;
                tx.insert_relation(NewRelation::new(a.id, b.id, "friend"))?;
                Ok(())
            })
            .unwrap();
        store
    }

    #[test]
    fn test_export_json_shape() {
        let store = seeded();
        let export = store.read(U, |p| export_graph(p));
        let value: serde_json::Value = serde_json::from_str(&export.to_json().unwrap()).unwrap();
        assert_eq!(value["format_version"], FORMAT_VERSION);
        assert_eq!(value["entities"][0]["type"], "person");
        assert_eq!(value["relations"][0]["relation_type"], "friend");
    }

    #[test]
    fn test_merge_keeps_existing() {
        let store = seeded();
        let export = store.read(U, |p| export_graph(p));
        let json = export.to_json().unwrap();

        let report = store
            .transaction(U, |tx| {
                import_graph(tx, &GraphExport::from_json(&json)?, ImportMode::Merge)
            })
            .unwrap();
        assert_eq!(report.entities, 2);
        assert_eq!(report.version.description, "Imported data (merge)");

        store.read(U, |p| {
            assert_eq!(p.entities().len(), 4);
            assert_eq!(p.relations().len(), 2);
            // The copy links the copies, not the originals
            let copy = p.relations()[1];
            assert!(copy.source_id.get() > 2 && copy.target_id.get() > 2);
        });
    }

    #[test]
    fn test_replace_into_other_user() {
        let store = seeded();
        let export = store.read(U, |p| export_graph(p));
        let other = UserId(2);
        store
            .transaction(other, |tx| tx.insert_entity(NewEntity::new("Zed", "robot")))
            .unwrap();

        store
            .transaction(other, |tx| import_graph(tx, &export, ImportMode::Replace))
            .unwrap();
        store.read(other, |p| {
            let names: Vec<_> = p.entities().iter().map(|e| e.name.clone()).collect();
            assert_eq!(names, vec!["Alice", "Bob"]);
            assert_eq!(p.relations().len(), 1);
        });
    }

    #[test]
    fn test_dangling_import_is_rejected_untouched() {
        let store = seeded();
        let mut export = store.read(U, |p| export_graph(p));
        export.snapshot.relations.push(SnapshotRelation {
            id: RelationId(99),
            source_id: EntityId(1),
            target_id: EntityId(404),
            relation_type: "ghost".into(),
            description: None,
        });

        let err = store
            .transaction(U, |tx| import_graph(tx, &export, ImportMode::Replace))
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(store.read(U, |p| p.entities().len()), 2);
        assert_eq!(store.read(U, |p| p.version_count()), 0);
    }

    #[test]
    fn test_reset_keeps_versions() {
        let store = seeded();
        let counts = store.transaction(U, reset_graph).unwrap();
        assert_eq!(counts.entities, 2);
        assert_eq!(counts.relations, 1);
        store.read(U, |p| {
            assert!(p.entities().is_empty());
            assert_eq!(p.versions()[0].description, "Reset all data");
        });
    }

    #[test]
    fn test_import_older_dump_layout() {
        let json = r#"{
            "version": "1.0",
            "entities": [
                {"name": "Import1", "type": "person", "description": null},
                {"name": "Import2", "type": "organization", "description": null}
            ],
            "relations": [],
            "entity_types": ["person", "organization"],
            "relation_types": []
        }"#;
        let export = GraphExport::from_json(json).unwrap();
        assert_eq!(export.format_version, 1);
        assert_eq!(export.snapshot.entities[0].id, EntityId(1));
        assert_eq!(export.snapshot.entities[1].id, EntityId(2));
        assert_eq!(export.snapshot.entity_types.len(), 2);

        let store = seeded();
        let report = store
            .transaction(U, |tx| import_graph(tx, &export, ImportMode::Replace))
            .unwrap();
        assert_eq!(report.entities, 2);
        assert_eq!(report.version.description, "Imported data (replace)");
        store.read(U, |p| {
            let names: Vec<_> = p.entities().iter().map(|e| e.name.clone()).collect();
            assert_eq!(names, vec!["Import1", "Import2"]);
            assert!(p.relations().is_empty());
            assert!(p.has_type(TypeKind::Entity, "organization"));
        });
    }

    #[test]
    fn test_idless_rows_do_not_collide_with_endpoints() {
        let json = r#"{
            "entities": [
                {"name": "Loose", "type": "thing"},
                {"id": 5, "name": "Alice", "type": "person"},
                {"id": 6, "name": "Bob", "type": "person"}
            ],
            "relations": [
                {"source_id": 5, "target_id": 6, "relation_type": "friend"}
            ],
            "relation_types": [{"id": 3, "name": "friend"}, "mentor"]
        }"#;
        let export = GraphExport::from_json(json).unwrap();
        assert_eq!(export.format_version, FORMAT_VERSION);
        assert_eq!(export.snapshot.entities[0].id, EntityId(7));
        assert_eq!(export.snapshot.relations[0].id, RelationId(1));
        let names: Vec<_> = export
            .snapshot
            .relation_types
            .iter()
            .map(|t| t.name.as_str())
            .collect();
        assert_eq!(names, vec!["friend", "mentor"]);

        let store = Store::in_memory();
        store
            .transaction(U, |tx| import_graph(tx, &export, ImportMode::Merge))
            .unwrap();
        store.read(U, |p| {
            let r = p.relations()[0];
            assert_eq!(p.entity(r.source_id).unwrap().name, "Alice");
            assert_eq!(p.entity(r.target_id).unwrap().name, "Bob");
        });
    }

    #[test]
    fn test_newer_dump_version_is_rejected() {
        let export = GraphExport::from_json(r#"{"version": "2.0", "entities": []}"#).unwrap();
        let err = export.validate().unwrap_err();
        assert!(matches!(err, Error::VersionMismatch { found: 2, .. }));

        let err = GraphExport::from_json(r#"{"version": "beta"}"#).unwrap_err();
        assert!(err.to_string().contains("unrecognised export version"));
    }

    #[test]
    fn test_duplicate_entity_ids_are_rejected() {
        let json = r#"{"entities": [
            {"id": 1, "name": "A", "type": "t"},
            {"id": 1, "name": "B", "type": "t"}
        ]}"#;
        let export = GraphExport::from_json(json).unwrap();
        assert!(matches!(export.validate(), Err(Error::Validation(_))));
    }
}
